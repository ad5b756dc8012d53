/// Configuration default values
///
/// This module contains all the default values for configuration options,
/// making them easily changeable in one central location.
// Web server defaults
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;

// Upstream defaults
pub const DEFAULT_CONNECT_TIMEOUT: &str = "15s";
pub const DEFAULT_IDLE_READ_TIMEOUT: &str = "30s";
pub const DEFAULT_CHUNK_SIZE: usize = 8192;
pub const DEFAULT_ERROR_BODY_PREVIEW_BYTES: usize = 200;
pub const DEFAULT_USER_AGENT: &str = concat!("xc-timeshift/", env!("CARGO_PKG_VERSION"));

// Storage defaults
pub const DEFAULT_CATALOG_PATH: &str = "./data/catalog.json";
pub const DEFAULT_SETTINGS_PATH: &str = "./data/timeshift.toml";

// Plugin settings defaults
pub const DEFAULT_ENABLED: bool = true;
pub const DEFAULT_TIMEZONE: &str = "Europe/Brussels";
pub const DEFAULT_LANGUAGE: &str = "en";
pub const DEFAULT_URL_DIALECT: &str = "auto";

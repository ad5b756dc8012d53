//! Repository layer
//!
//! Traits describing the host collaborators plus the file-backed
//! implementations used by the standalone service.

pub mod memory;
pub mod settings;
pub mod traits;

pub use memory::{CatalogSnapshot, InMemoryCatalog};
pub use settings::{FileSettingsStore, StaticSettingsStore};
pub use traits::{ChannelCatalog, EpgRepository, SettingsStore, UserRepository};

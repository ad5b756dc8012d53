//! URL helpers for logging upstream and client URLs safely

use regex::Regex;
use std::sync::LazyLock;
use url::Url;

static QUERY_CREDENTIALS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)([?&](?:username|password|user|pass|pwd|passwd)=)[^&]*")
        .expect("query credential pattern is valid")
});

static PATH_CREDENTIALS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(/?(?:timeshift|live|movie|series)/)[^/]+/[^/]+/")
        .expect("path credential pattern is valid")
});

/// URL utilities
pub struct UrlUtils;

impl UrlUtils {
    /// Obfuscate credentials in a URL for safe logging
    ///
    /// Handles `user:pass@host` authority credentials, credential query
    /// parameters and the `/{kind}/{username}/{password}/` path segments used
    /// by Xtream Codes URLs.
    ///
    /// ```rust
    /// use xc_timeshift::utils::url::UrlUtils;
    ///
    /// let url = "http://provider.example/timeshift/john/secret/50/2025-01-15:14-30/1.ts";
    /// assert_eq!(
    ///     UrlUtils::obfuscate_credentials(url),
    ///     "http://provider.example/timeshift/****/****/50/2025-01-15:14-30/1.ts"
    /// );
    /// ```
    pub fn obfuscate_credentials(url: &str) -> String {
        let mut obfuscated = url.to_string();

        if let Ok(mut parsed) = Url::parse(url) {
            if !parsed.username().is_empty() || parsed.password().is_some() {
                let _ = parsed.set_username("****");
                let _ = parsed.set_password(Some("****"));
            }
            let path = parsed.path().to_string();
            let masked = Self::obfuscate_path(&path);
            if masked != path {
                parsed.set_path(&masked);
            }
            obfuscated = parsed.to_string();
        } else if url.starts_with('/') {
            obfuscated = Self::obfuscate_path(url);
        }

        obfuscated = QUERY_CREDENTIALS
            .replace_all(&obfuscated, "${1}****")
            .to_string();

        obfuscated
    }

    fn obfuscate_path(path: &str) -> String {
        PATH_CREDENTIALS
            .replace(path, "${1}****/****/")
            .to_string()
    }
}

//! Server configuration from environment variables.

use std::path::PathBuf;

pub const DEFAULT_PORT: u16 = 4860;
pub const DEFAULT_STATIC_DIR: &str = "static";
pub const DEFAULT_MAX_UPLOAD_MB: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub port: u16,
    /// Frontend bundle served for every non-API path
    pub static_dir: PathBuf,
    /// Request body limit for trajectory and JSONL uploads
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }
}

impl ServerConfig {
    /// Build from any key lookup; unset or unparsable values fall back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let port = lookup("PORT")
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_PORT);
        let static_dir = lookup("TRAJVIEW_STATIC_DIR")
            .filter(|dir| !dir.is_empty())
            .unwrap_or_else(|| DEFAULT_STATIC_DIR.to_string());
        let max_upload_mb: usize = lookup("TRAJVIEW_MAX_UPLOAD_MB")
            .and_then(|mb| mb.parse().ok())
            .filter(|mb| *mb > 0)
            .unwrap_or(DEFAULT_MAX_UPLOAD_MB);

        Self {
            port,
            static_dir: PathBuf::from(static_dir),
            max_upload_bytes: max_upload_mb * 1024 * 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> ServerConfig {
        let vars: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        ServerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let cfg = config(&[]);
        assert_eq!(cfg.port, DEFAULT_PORT);
        assert_eq!(cfg.static_dir, PathBuf::from("static"));
        assert_eq!(cfg.max_upload_bytes, 50 * 1024 * 1024);
    }

    #[test]
    fn test_overrides() {
        let cfg = config(&[
            ("PORT", "8080"),
            ("TRAJVIEW_STATIC_DIR", "/srv/viewer"),
            ("TRAJVIEW_MAX_UPLOAD_MB", "5"),
        ]);
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.static_dir, PathBuf::from("/srv/viewer"));
        assert_eq!(cfg.max_upload_bytes, 5 * 1024 * 1024);
    }

    #[test]
    fn test_bad_values_fall_back() {
        let cfg = config(&[("PORT", "not-a-port"), ("TRAJVIEW_MAX_UPLOAD_MB", "0")]);
        assert_eq!(cfg.port, DEFAULT_PORT);
        assert_eq!(cfg.max_upload_bytes, DEFAULT_MAX_UPLOAD_MB * 1024 * 1024);
    }
}

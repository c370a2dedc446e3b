//! JSON configuration for the ingest server.
//!
//! Shape matches the deployed `config.json`: a listen host, one entry
//! per tracker protocol with its port and an enabled flag, and a sink
//! block naming the SQLite database path.

use std::path::Path;

use serde::Deserialize;

use avl_core::Protocol;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub host: String,
    pub protocols: Vec<ProtocolEntry>,
    pub sink: SinkConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProtocolEntry {
    pub name: Protocol,
    pub port: u16,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SinkConfig {
    pub path: String,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("cannot parse config file {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },
}

impl Config {
    /// Load and parse a config file. Any failure is fatal at startup.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Entries the server should actually listen for.
    pub fn enabled_protocols(&self) -> impl Iterator<Item = &ProtocolEntry> {
        self.protocols.iter().filter(|p| p.enabled)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"{
        "host": "0.0.0.0",
        "protocols": [
            {"name": "ruptela", "port": 6600},
            {"name": "teltonika", "port": 6601, "enabled": false}
        ],
        "sink": {"path": "data/records.db"}
    }"#;

    #[test]
    fn test_parse_config() {
        let config: Config = serde_json::from_str(SAMPLE).unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.protocols.len(), 2);
        assert_eq!(config.protocols[0].name, Protocol::Ruptela);
        assert_eq!(config.protocols[0].port, 6600);
        assert!(config.protocols[0].enabled); // defaulted
        assert!(!config.protocols[1].enabled);
        assert_eq!(config.sink.path, "data/records.db");
    }

    #[test]
    fn test_enabled_protocols_filter() {
        let config: Config = serde_json::from_str(SAMPLE).unwrap();
        let enabled: Vec<_> = config.enabled_protocols().collect();
        assert_eq!(enabled.len(), 1);
        assert_eq!(enabled[0].name, Protocol::Ruptela);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(SAMPLE.as_bytes()).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.host, "0.0.0.0");
    }

    #[test]
    fn test_missing_file_is_error() {
        let err = Config::load(Path::new("/nonexistent/config.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_unknown_protocol_name_is_error() {
        let bad = SAMPLE.replace("ruptela", "gl200");
        assert!(serde_json::from_str::<Config>(&bad).is_err());
    }
}

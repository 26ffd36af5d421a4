use std::{fs, path::Path};

use serde::Deserialize;

use crate::{AddressMapping, DirectoryMapping, ParsedAddress};

/// Top-level configuration for the Relaymail forwarder.
#[derive(Debug, Deserialize)]
pub struct Config {
    pub forward: ForwardConfig,

    /// Address translation tables.
    #[serde(default)]
    pub mappings: AddressMapping,

    /// Storage directories per destination mailbox.
    #[serde(default)]
    pub directories: DirectoryMapping,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub transport: TransportConfig,
}

/// Forwarding identity and source bucket.
#[derive(Debug, Deserialize)]
pub struct ForwardConfig {
    /// Sender of every forwarded message, e.g. `"Forwarder <fwd@example.com>"`.
    pub from: String,

    /// Bucket holding the raw inbound messages.
    #[serde(default = "default_bucket")]
    pub bucket: String,
}

/// Object store backend holding the raw inbound messages.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum StorageConfig {
    /// Filesystem store, buckets are directories under `path`.
    #[serde(rename = "file")]
    File {
        #[serde(default = "default_mailbox_path")]
        path: String,
    },
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::File {
            path: default_mailbox_path(),
        }
    }
}

/// Outbound transport for forwarded messages.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum TransportConfig {
    /// SMTP relay.
    #[serde(rename = "smtp")]
    Smtp {
        #[serde(default = "default_host")]
        host: String,
        #[serde(default = "default_port")]
        port: u16,
        #[serde(default)]
        starttls: bool,
        username: Option<String>,
        password: Option<String>,
    },

    /// Outbox directory of `.eml` files.
    #[serde(rename = "file")]
    File {
        #[serde(default = "default_outbox_path")]
        path: String,
    },
}

impl Default for TransportConfig {
    fn default() -> Self {
        TransportConfig::Smtp {
            host: default_host(),
            port: default_port(),
            starttls: false,
            username: None,
            password: None,
        }
    }
}

impl Config {
    /// Checks the values serde cannot check on its own.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if ParsedAddress::parse(&self.forward.from).is_none() {
            return Err(ConfigError::Invalid(format!(
                "forward.from is not an address: {}",
                self.forward.from
            )));
        }
        if self.forward.bucket.trim().is_empty() {
            return Err(ConfigError::Invalid("forward.bucket is empty".to_string()));
        }
        if let TransportConfig::Smtp {
            username, password, ..
        } = &self.transport
        {
            if username.is_some() != password.is_some() {
                return Err(ConfigError::Invalid(
                    "transport.username and transport.password go together".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Loads and validates configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    let config: Config = toml::from_str(&content).map_err(ConfigError::Parse)?;
    config.validate()?;
    Ok(config)
}

/// Errors that can occur while loading configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// An I/O error occurred reading the file.
    Io(std::io::Error),
    /// A parse error occurred deserializing TOML.
    Parse(toml::de::Error),
    /// A value is present but not usable.
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "Config I/O error: {e}"),
            ConfigError::Parse(e) => write!(f, "Config parse error: {e}"),
            ConfigError::Invalid(msg) => write!(f, "Invalid config: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            ConfigError::Parse(e) => Some(e),
            ConfigError::Invalid(_) => None,
        }
    }
}

fn default_bucket() -> String {
    "mails".to_string()
}

fn default_mailbox_path() -> String {
    "mailbox".to_string()
}

fn default_outbox_path() -> String {
    "outbox".to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    25
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_parse_minimal_config() {
        let toml = r#"
[forward]
from = "forward@unit.com"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.forward.from, "forward@unit.com");
        assert_eq!(config.forward.bucket, "mails");
        assert!(config.mappings.exact.is_empty());
        assert!(config.directories.default.is_none());
        assert!(matches!(config.storage, StorageConfig::File { ref path } if path == "mailbox"));
        match &config.transport {
            TransportConfig::Smtp {
                host,
                port,
                starttls,
                username,
                ..
            } => {
                assert_eq!(host, "127.0.0.1");
                assert_eq!(*port, 25);
                assert!(!*starttls);
                assert!(username.is_none());
            }
            _ => panic!("Expected Smtp transport"),
        }
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
[forward]
from = "Forwarder <forward@unit.com>"
bucket = "inbound"

[mappings.exact]
"sint@castle.es" = "santa@north.pole"

[mappings.domain_to_address]
"world.com" = "hello@world.com"

[mappings.domain_to_domain]
"blue.com" = "red.com"

[directories]
default = "unsorted"

[directories.mailboxes]
"castle.es" = "castle"

[storage]
type = "file"
path = "my_mailbox"

[transport]
type = "file"
path = "my_outbox"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.forward.bucket, "inbound");
        assert_eq!(config.mappings.exact["sint@castle.es"], "santa@north.pole");
        assert_eq!(config.mappings.domain_to_address["world.com"], "hello@world.com");
        assert_eq!(config.mappings.domain_to_domain["blue.com"], "red.com");
        assert_eq!(config.directories.default.as_deref(), Some("unsorted"));
        assert_eq!(config.directories.mailboxes["castle.es"], "castle");
        assert!(matches!(config.storage, StorageConfig::File { ref path } if path == "my_mailbox"));
        assert!(matches!(config.transport, TransportConfig::File { ref path } if path == "my_outbox"));
    }

    #[test]
    fn test_parse_rejects_unknown_storage() {
        let toml = "[forward]\nfrom = \"a@b.com\"\n[storage]\ntype = \"memory\"";
        assert!(toml::from_str::<Config>(toml).is_err());
    }

    #[test]
    fn test_parse_example_config() {
        let config: Config = toml::from_str(include_str!("../../../config.example.toml")).unwrap();
        assert!(config.validate().is_ok());
        assert!(!config.mappings.exact.is_empty());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config: Config = toml::from_str("[forward]\nfrom = \"nobody\"").unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let config: Config =
            toml::from_str("[forward]\nfrom = \"a@b.com\"\nbucket = \" \"").unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let config: Config = toml::from_str(
            "[forward]\nfrom = \"a@b.com\"\n[transport]\ntype = \"smtp\"\nusername = \"u\"",
        )
        .unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_load_config() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "[forward]\nfrom = \"forward@unit.com\"\n").unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.forward.from, "forward@unit.com");

        let missing = load_config(&temp_dir.path().join("missing.toml"));
        assert!(matches!(missing, Err(ConfigError::Io(_))));

        std::fs::write(&path, "[forward").unwrap();
        assert!(matches!(load_config(&path), Err(ConfigError::Parse(_))));
    }
}

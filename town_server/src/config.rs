use std::path::Path;

use net::rate_limiter::RateLimitConfig;
use serde::Deserialize;

use crate::error::ConfigError;

pub const MASTER_PASSWORD_ENV: &str = "TOWN_MASTER_PASSWORD";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NetConfig {
    pub ws_addr: String,
    pub web_static_dir: String,
}

impl Default for NetConfig {
    fn default() -> Self {
        Self {
            ws_addr: "0.0.0.0:8081".to_string(),
            web_static_dir: "web_dist".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TownSection {
    pub map_file: String,
    pub default_town_name: String,
    /// Fixed id for the default town; generated when unset.
    pub default_town_id: Option<String>,
    pub default_town_public: bool,
    pub capacity: usize,
}

impl Default for TownSection {
    fn default() -> Self {
        Self {
            map_file: "maps/indoors.json".to_string(),
            default_town_name: "Lobby".to_string(),
            default_town_id: None,
            default_town_public: true,
            capacity: 50,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SecuritySection {
    pub max_connections_total: usize,
    pub max_connections_per_ip: usize,
    pub max_commands_per_second: u32,
    pub max_input_length: usize,
}

impl Default for SecuritySection {
    fn default() -> Self {
        Self {
            max_connections_total: 1000,
            max_connections_per_ip: 5,
            max_commands_per_second: 20,
            max_input_length: 4096,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AdminSection {
    pub master_password: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VideoSection {
    pub enabled: bool,
}

impl Default for VideoSection {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Top-level town server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub net: NetConfig,
    pub town: TownSection,
    pub security: SecuritySection,
    pub admin: AdminSection,
    pub video: VideoSection,
}

impl ServerConfig {
    /// Load configuration from an optional TOML file path. A missing file
    /// yields the defaults.
    pub fn load(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let config = match config_path {
            Some(path) if Path::new(path).exists() => {
                let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                    path: path.to_string(),
                    source,
                })?;
                toml::from_str(&content)?
            }
            _ => Self::default(),
        };
        Ok(config)
    }

    /// Let the environment override secrets that should not live in files.
    pub fn apply_env(&mut self) {
        if let Ok(pw) = std::env::var(MASTER_PASSWORD_ENV) {
            self.admin.master_password = Some(pw);
        }
    }

    pub fn to_rate_limit_config(&self) -> RateLimitConfig {
        RateLimitConfig {
            max_connections_total: self.security.max_connections_total,
            max_connections_per_ip: self.security.max_connections_per_ip,
            max_commands_per_second: self.security.max_commands_per_second,
            max_input_length: self.security.max_input_length,
        }
    }
}

/// Parse CLI arguments and load config.
/// Supports: --config <path>
pub fn parse_cli_args() -> ServerConfig {
    let args: Vec<String> = std::env::args().collect();
    let mut config_path: Option<&str> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" => {
                if let Some(val) = args.get(i + 1) {
                    config_path = Some(val.as_str());
                    i += 2;
                } else {
                    eprintln!("--config requires a path argument");
                    std::process::exit(1);
                }
            }
            other => {
                eprintln!("Unknown argument: {}", other);
                std::process::exit(1);
            }
        }
    }

    match ServerConfig::load(config_path) {
        Ok(mut c) => {
            c.apply_env();
            c
        }
        Err(e) => {
            eprintln!("Failed to load config: {}", e);
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn default_config_matches_hardcoded_values() {
        let config = ServerConfig::default();
        assert_eq!(config.net.ws_addr, "0.0.0.0:8081");
        assert_eq!(config.town.map_file, "maps/indoors.json");
        assert_eq!(config.town.default_town_name, "Lobby");
        assert!(config.town.default_town_public);
        assert_eq!(config.town.capacity, 50);
        assert!(config.admin.master_password.is_none());
        assert!(config.video.enabled);
    }

    #[test]
    fn to_rate_limit_config() {
        let rl = ServerConfig::default().to_rate_limit_config();
        assert_eq!(rl.max_connections_per_ip, 5);
        assert_eq!(rl.max_commands_per_second, 20);
        assert_eq!(rl.max_input_length, 4096);
    }

    #[test]
    fn load_nonexistent_file_returns_defaults() {
        let config = ServerConfig::load(Some("/tmp/nonexistent_town_config_12345.toml")).unwrap();
        assert_eq!(config.town.capacity, 50);
    }

    #[test]
    fn load_partial_toml() {
        let mut f = NamedTempFile::new().unwrap();
        write!(
            f,
            r#"
[town]
capacity = 8
default_town_id = "LOBBY"

[admin]
master_password = "secret"

[video]
enabled = false
"#
        )
        .unwrap();

        let config = ServerConfig::load(Some(f.path().to_str().unwrap())).unwrap();
        assert_eq!(config.town.capacity, 8);
        assert_eq!(config.town.default_town_id.as_deref(), Some("LOBBY"));
        assert_eq!(config.town.default_town_name, "Lobby");
        assert_eq!(config.admin.master_password.as_deref(), Some("secret"));
        assert!(!config.video.enabled);
        assert_eq!(config.net.ws_addr, "0.0.0.0:8081");
    }

    #[test]
    fn invalid_toml_is_an_error() {
        let mut f = NamedTempFile::new().unwrap();
        write!(f, "[town]\ncapacity = \"lots\"\n").unwrap();
        assert!(matches!(
            ServerConfig::load(Some(f.path().to_str().unwrap())),
            Err(ConfigError::Toml(_))
        ));
    }
}

//! Server configuration.
//!
//! Stored as TOML, by default at:
//! - Linux: `~/.config/filedrop/server.toml`
//! - Windows: `%APPDATA%/filedrop/server.toml`
//!
//! A path given on the command line takes precedence.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use filedrop_receiver::SessionConfig;
use serde::{Deserialize, Serialize};

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Address the listener binds to.
    #[serde(default = "default_bind_address")]
    pub bind_address: IpAddr,

    /// Listener port (0 = auto-assign).
    #[serde(default = "default_port")]
    pub port: u16,

    /// Directory received files are written into.
    #[serde(default = "default_storage_dir")]
    pub storage_dir: PathBuf,

    /// Per-connection scratch buffer size in bytes.
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,

    /// Idle read timeout in seconds (0 = wait forever).
    #[serde(default)]
    pub read_timeout_secs: u64,
}

fn default_bind_address() -> IpAddr {
    IpAddr::V4(Ipv4Addr::LOCALHOST)
}

fn default_port() -> u16 {
    8000
}

/// Directory holding the running executable, falling back to the
/// working directory.
fn default_storage_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
}

fn default_buffer_size() -> usize {
    filedrop_receiver::DEFAULT_BUFFER_SIZE
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            storage_dir: default_storage_dir(),
            buffer_size: default_buffer_size(),
            read_timeout_secs: 0,
        }
    }
}

impl Config {
    /// Loads configuration from `path`, writing a default file if none exists.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = toml::from_str(&content)?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save(path)?;
            Ok(config)
        }
    }

    /// Saves the configuration to `path`.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(())
    }

    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            buffer_size: self.buffer_size,
            read_timeout: match self.read_timeout_secs {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
        }
    }
}

/// Returns the platform-specific configuration file path.
pub fn default_config_path() -> PathBuf {
    #[cfg(target_os = "linux")]
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        PathBuf::from(home)
            .join(".config")
            .join("filedrop")
            .join("server.toml")
    }

    #[cfg(target_os = "windows")]
    {
        let appdata =
            std::env::var("APPDATA").unwrap_or_else(|_| "C:\\Users\\Default\\AppData".into());
        PathBuf::from(appdata).join("filedrop").join("server.toml")
    }

    #[cfg(not(any(target_os = "linux", target_os = "windows")))]
    {
        PathBuf::from("/tmp/filedrop/server.toml")
    }
}

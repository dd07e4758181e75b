//! Runtime configuration.
//!
//! Every section has defaults, so an empty YAML document (or no file at all)
//! yields a working configuration:
//!
//! ```yaml
//! server:
//!   listen_addr: "0.0.0.0:8080"
//! scheduler:
//!   workers: 4
//!   idle:
//!     max_sleep_us: 500
//! http:
//!   max_body_bytes: 65536
//! ```

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, bail};
use serde::Deserialize;

/// Environment variable naming a YAML config file.
pub const CONFIG_ENV: &str = "SPINSERVE_CONFIG";
/// Environment variable overriding `server.listen_addr`.
pub const LISTEN_ENV: &str = "LISTEN";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub scheduler: SchedulerConfig,
    pub connection: ConnectionConfig,
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub tcp_nodelay: bool,
    /// Pause after a transient accept failure (e.g. out of file descriptors).
    pub accept_backoff_ms: u64,
    /// Pause between accept attempts while nothing is pending.
    pub accept_poll_us: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8080".to_string(),
            tcp_nodelay: true,
            accept_backoff_ms: 10,
            accept_poll_us: 500,
        }
    }
}

impl ServerConfig {
    pub fn accept_backoff(&self) -> Duration {
        Duration::from_millis(self.accept_backoff_ms)
    }

    pub fn accept_poll(&self) -> Duration {
        Duration::from_micros(self.accept_poll_us)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Number of worker threads. 0 = available parallelism.
    pub workers: usize,
    pub idle: IdleConfig,
}

impl SchedulerConfig {
    pub fn worker_count(&self) -> usize {
        if self.workers > 0 {
            return self.workers;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }
}

/// How a worker waits after passes over its tasks that retired nothing.
///
/// The first `spin_passes` empty passes only issue a spin hint, the next
/// `yield_passes` yield the thread, and after that the worker sleeps,
/// doubling from `min_sleep_us` up to `max_sleep_us`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IdleConfig {
    pub spin_passes: u32,
    pub yield_passes: u32,
    pub min_sleep_us: u64,
    pub max_sleep_us: u64,
}

impl Default for IdleConfig {
    fn default() -> Self {
        Self {
            spin_passes: 64,
            yield_passes: 16,
            min_sleep_us: 50,
            max_sleep_us: 1000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Bytes requested from the transport per read attempt.
    pub read_chunk_size: usize,
    /// Close a connection that sits idle between requests this long. 0 = never.
    pub idle_timeout_ms: u64,
    /// Fail a handler that has not produced a response this long. 0 = never.
    pub handler_timeout_ms: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            read_chunk_size: 4096,
            idle_timeout_ms: 30_000,
            handler_timeout_ms: 0,
        }
    }
}

impl ConnectionConfig {
    pub fn idle_timeout(&self) -> Option<Duration> {
        (self.idle_timeout_ms > 0).then(|| Duration::from_millis(self.idle_timeout_ms))
    }

    pub fn handler_timeout(&self) -> Option<Duration> {
        (self.handler_timeout_ms > 0).then(|| Duration::from_millis(self.handler_timeout_ms))
    }
}

/// Limits enforced while decoding HTTP requests.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Upper bound on the request line plus all header lines, in bytes.
    pub max_header_bytes: usize,
    pub max_headers: usize,
    pub max_body_bytes: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            max_header_bytes: 8192,
            max_headers: 100,
            max_body_bytes: 1024 * 1024,
        }
    }
}

impl Config {
    /// Loads the file named by `SPINSERVE_CONFIG` (or the defaults), then
    /// applies the `LISTEN` override.
    pub fn load() -> anyhow::Result<Self> {
        let mut cfg = match std::env::var(CONFIG_ENV) {
            Ok(path) => Self::from_file(path)?,
            Err(_) => Self::default(),
        };

        if let Ok(addr) = std::env::var(LISTEN_ENV) {
            cfg.server.listen_addr = addr;
        }

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_yaml_str(&text)
            .with_context(|| format!("invalid config file {}", path.display()))
    }

    pub fn from_yaml_str(text: &str) -> anyhow::Result<Self> {
        // serde_yaml maps an empty document to null rather than an empty map.
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        let cfg: Self = serde_yaml::from_str(text).context("failed to parse YAML config")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.server.listen_addr.is_empty() {
            bail!("server.listen_addr must not be empty");
        }
        if self.connection.read_chunk_size == 0 {
            bail!("connection.read_chunk_size must be > 0");
        }
        if self.scheduler.idle.min_sleep_us > self.scheduler.idle.max_sleep_us {
            bail!("scheduler.idle.min_sleep_us must be <= max_sleep_us");
        }
        if self.http.max_header_bytes == 0 || self.http.max_headers == 0 {
            bail!("http header limits must be > 0");
        }
        Ok(())
    }
}

use std::fmt::Display;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};

use wikichat_gateway::ConnectionConfig;
use wikichat_types::DEFAULT_ANONYMOUS_NAME;

/// Server settings, read from `WIKICHAT_*` environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_path: PathBuf,
    pub anonymous_name: String,
    pub io_timeout: Duration,
    pub send_timeout: Duration,
    pub outbound_queue: usize,
    pub heartbeat_interval: Duration,
    pub max_frame_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8080,
            log_path: PathBuf::from("data/chatLog"),
            anonymous_name: DEFAULT_ANONYMOUS_NAME.into(),
            io_timeout: Duration::from_millis(2000),
            send_timeout: Duration::from_millis(5000),
            outbound_queue: 64,
            heartbeat_interval: Duration::from_secs(15),
            max_frame_bytes: 64 * 1024,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from any key/value source. Unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let config = Self {
            host: lookup("WIKICHAT_HOST").unwrap_or(defaults.host),
            port: parse_var(&lookup, "WIKICHAT_PORT", defaults.port)?,
            log_path: lookup("WIKICHAT_LOG_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.log_path),
            anonymous_name: lookup("WIKICHAT_ANONYMOUS_NAME")
                .filter(|name| !name.trim().is_empty())
                .unwrap_or(defaults.anonymous_name),
            io_timeout: Duration::from_millis(parse_var(
                &lookup,
                "WIKICHAT_IO_TIMEOUT_MS",
                defaults.io_timeout.as_millis() as u64,
            )?),
            send_timeout: Duration::from_millis(parse_var(
                &lookup,
                "WIKICHAT_SEND_TIMEOUT_MS",
                defaults.send_timeout.as_millis() as u64,
            )?),
            outbound_queue: parse_var(&lookup, "WIKICHAT_OUTBOUND_QUEUE", defaults.outbound_queue)?,
            heartbeat_interval: Duration::from_secs(parse_var(
                &lookup,
                "WIKICHAT_HEARTBEAT_SECS",
                defaults.heartbeat_interval.as_secs(),
            )?),
            max_frame_bytes: parse_var(&lookup, "WIKICHAT_MAX_FRAME_BYTES", defaults.max_frame_bytes)?,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.io_timeout.is_zero() || self.send_timeout.is_zero() {
            bail!("WIKICHAT_IO_TIMEOUT_MS and WIKICHAT_SEND_TIMEOUT_MS must be greater than zero");
        }
        if self.heartbeat_interval.is_zero() {
            bail!("WIKICHAT_HEARTBEAT_SECS must be greater than zero");
        }
        if self.outbound_queue == 0 {
            bail!("WIKICHAT_OUTBOUND_QUEUE must be greater than zero");
        }
        if self.anonymous_name.contains(['\u{1e}', '\n', '\r']) {
            bail!("WIKICHAT_ANONYMOUS_NAME contains a forbidden character");
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid bind address {}:{}", self.host, self.port))
    }

    pub fn connection_config(&self) -> ConnectionConfig {
        ConnectionConfig {
            outbound_capacity: self.outbound_queue,
            send_timeout: self.send_timeout,
            heartbeat_interval: self.heartbeat_interval,
            anonymous_name: self.anonymous_name.clone(),
        }
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow!("{}={:?} is invalid: {}", key, raw, e)),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn from_pairs(pairs: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = from_pairs(&[]).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.log_path, PathBuf::from("data/chatLog"));
        assert_eq!(config.anonymous_name, DEFAULT_ANONYMOUS_NAME);
        assert_eq!(config.bind_addr().unwrap().port(), 8080);
    }

    #[test]
    fn test_overrides() {
        let config = from_pairs(&[
            ("WIKICHAT_HOST", "127.0.0.1"),
            ("WIKICHAT_PORT", "9000"),
            ("WIKICHAT_LOG_PATH", "/tmp/chat.log"),
            ("WIKICHAT_ANONYMOUS_NAME", "anonymous"),
            ("WIKICHAT_SEND_TIMEOUT_MS", "250"),
            ("WIKICHAT_OUTBOUND_QUEUE", "8"),
        ])
        .unwrap();
        assert_eq!(config.bind_addr().unwrap(), "127.0.0.1:9000".parse().unwrap());
        assert_eq!(config.log_path, PathBuf::from("/tmp/chat.log"));
        assert_eq!(config.anonymous_name, "anonymous");

        let conn = config.connection_config();
        assert_eq!(conn.send_timeout, Duration::from_millis(250));
        assert_eq!(conn.outbound_capacity, 8);
    }

    #[test]
    fn test_malformed_values_are_rejected() {
        assert!(from_pairs(&[("WIKICHAT_PORT", "eighty")]).is_err());
        assert!(from_pairs(&[("WIKICHAT_OUTBOUND_QUEUE", "0")]).is_err());
        assert!(from_pairs(&[("WIKICHAT_HEARTBEAT_SECS", "0")]).is_err());
    }

    #[test]
    fn test_blank_anonymous_name_keeps_default() {
        let config = from_pairs(&[("WIKICHAT_ANONYMOUS_NAME", "  ")]).unwrap();
        assert_eq!(config.anonymous_name, DEFAULT_ANONYMOUS_NAME);
    }
}

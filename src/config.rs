//! Server configuration
//!
//! Listen address from the first command line argument (or `RELAY_ADDR`),
//! everything else from environment variables:
//! - `RELAY_IDLE_TIMEOUT_SECS`: close members silent this long (0 or unset disables)
//! - `RELAY_ECHO`: relay a message back to its sender too (default true)
//! - `RELAY_OUTBOUND_BUFFER`: queued outbound messages per client (default 32)

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::AppError;
use crate::session::SessionOptions;

/// Default server address
pub const DEFAULT_ADDR: &str = "127.0.0.1:8181";

/// Default per-client outbound queue size
pub const DEFAULT_OUTBOUND_BUFFER: usize = 32;

/// Runtime configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address to bind the listener to
    pub addr: String,
    /// Idle timeout for members; None disables it
    pub idle_timeout: Option<Duration>,
    /// Whether senders receive their own messages
    pub echo: bool,
    /// Outbound queue size per client
    pub outbound_buffer: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: DEFAULT_ADDR.to_string(),
            idle_timeout: None,
            echo: true,
            outbound_buffer: DEFAULT_OUTBOUND_BUFFER,
        }
    }
}

impl ServerConfig {
    /// Load from the process arguments and environment
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_sources(env::args().nth(1), |key| env::var(key).ok())
    }

    /// Load from an explicit address argument and variable lookup
    pub fn from_sources<F>(addr_arg: Option<String>, var: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(addr) = addr_arg.or_else(|| var("RELAY_ADDR")) {
            config.addr = addr;
        }

        if let Some(secs) = parse_var::<u64, _>(&var, "RELAY_IDLE_TIMEOUT_SECS")? {
            config.idle_timeout = (secs > 0).then_some(Duration::from_secs(secs));
        }

        if let Some(echo) = parse_var::<bool, _>(&var, "RELAY_ECHO")? {
            config.echo = echo;
        }

        if let Some(buffer) = parse_var::<usize, _>(&var, "RELAY_OUTBOUND_BUFFER")? {
            if buffer == 0 {
                return Err(AppError::Config(
                    "RELAY_OUTBOUND_BUFFER must be greater than 0".to_string(),
                ));
            }
            config.outbound_buffer = buffer;
        }

        Ok(config)
    }

    /// Per-connection options derived from this configuration
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            idle_timeout: self.idle_timeout,
            echo: self.echo,
        }
    }
}

fn parse_var<T, F>(var: &F, key: &str) -> Result<Option<T>, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = var(key) else {
        return Ok(None);
    };
    raw.trim()
        .parse()
        .map(Some)
        .map_err(|e| AppError::Config(format!("{}={:?}: {}", key, raw, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::from_sources(None, lookup(&[])).unwrap();
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.addr, "127.0.0.1:8181");
        assert!(config.echo);
        assert!(config.idle_timeout.is_none());
    }

    #[test]
    fn test_argument_wins_over_env() {
        let config = ServerConfig::from_sources(
            Some("0.0.0.0:9000".to_string()),
            lookup(&[("RELAY_ADDR", "127.0.0.1:1")]),
        )
        .unwrap();
        assert_eq!(config.addr, "0.0.0.0:9000");

        let config =
            ServerConfig::from_sources(None, lookup(&[("RELAY_ADDR", "127.0.0.1:1")])).unwrap();
        assert_eq!(config.addr, "127.0.0.1:1");
    }

    #[test]
    fn test_env_overrides() {
        let config = ServerConfig::from_sources(
            None,
            lookup(&[
                ("RELAY_IDLE_TIMEOUT_SECS", "30"),
                ("RELAY_ECHO", "false"),
                ("RELAY_OUTBOUND_BUFFER", "64"),
            ]),
        )
        .unwrap();

        assert_eq!(config.idle_timeout, Some(Duration::from_secs(30)));
        assert!(!config.echo);
        assert_eq!(config.outbound_buffer, 64);

        let options = config.session_options();
        assert_eq!(options.idle_timeout, Some(Duration::from_secs(30)));
        assert!(!options.echo);
    }

    #[test]
    fn test_zero_idle_timeout_disables() {
        let config =
            ServerConfig::from_sources(None, lookup(&[("RELAY_IDLE_TIMEOUT_SECS", "0")])).unwrap();
        assert!(config.idle_timeout.is_none());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = ServerConfig::from_sources(None, lookup(&[("RELAY_ECHO", "maybe")])).unwrap_err();
        assert!(matches!(err, AppError::Config(ref msg) if msg.contains("RELAY_ECHO")));

        let err =
            ServerConfig::from_sources(None, lookup(&[("RELAY_OUTBOUND_BUFFER", "0")])).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }
}

//! Process-visible configuration (§6). Every field has a documented
//! default except the listener port, which callers must supply.

use std::time::Duration;

use crate::{error::FacadeError, native::SrtOptions};

/// Top-level knobs a host process can set before bringing up a
/// [`crate::server::Server`]. Everything here is optional except the
/// port.
#[derive(Debug, Clone)]
pub struct Config {
    /// Listener port. Positive, `<= 65535`. Required.
    pub port: u16,
    /// Local interface to bind. Defaults to `0.0.0.0`.
    pub address: String,
    /// Delay between epoll polls, in milliseconds. Defaults to 0
    /// (poll again as soon as possible).
    pub epoll_poll_period_ms: u64,
    /// Native timeout passed to each `epoll_uwait` call, in
    /// milliseconds. Defaults to 0.
    pub epoll_uwait_timeout_ms: i64,
    /// Backlog passed to `listen`. Defaults to 65535.
    pub listen_backlog: u32,
    /// Default future-timeout applied to facade calls when enabled.
    /// `None` disables the default; 3000 ms is the conventional value
    /// when a caller wants one.
    pub call_timeout: Option<Duration>,
    /// Native logging level, 0-7, forwarded to `set_log_level`.
    pub log_level: i32,
    /// Baseline socket options applied on `create()`.
    pub options: SrtOptions,
}

impl Config {
    pub fn new(port: u16) -> Result<Self, FacadeError> {
        if port == 0 {
            return Err(FacadeError::Config(
                "server port must be a positive integer <= 65535".to_string(),
            ));
        }

        Ok(Self {
            port,
            address: "0.0.0.0".to_string(),
            epoll_poll_period_ms: 0,
            epoll_uwait_timeout_ms: 0,
            listen_backlog: 65535,
            call_timeout: None,
            log_level: 0,
            options: SrtOptions::default(),
        })
    }

    pub fn with_default_call_timeout(mut self) -> Self {
        self.call_timeout = Some(Duration::from_millis(3000));
        self
    }

    pub(crate) fn socket_addr(&self) -> Result<std::net::SocketAddr, FacadeError> {
        let ip: std::net::IpAddr = self
            .address
            .parse()
            .map_err(|_| FacadeError::Config(format!("invalid bind address: {}", self.address)))?;
        Ok(std::net::SocketAddr::new(ip, self.port))
    }

    pub(crate) fn into_server_config(self) -> Result<crate::server::ServerConfig, FacadeError> {
        let addr = self.socket_addr()?;
        Ok(crate::server::ServerConfig {
            addr,
            backlog: self.listen_backlog,
            epoll_poll_period_ms: self.epoll_poll_period_ms,
            epoll_uwait_timeout_ms: self.epoll_uwait_timeout_ms,
            call_timeout: self.call_timeout,
            options: self.options,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_port_is_rejected() {
        assert!(Config::new(0).is_err());
    }

    #[test]
    fn defaults_match_spec_table() {
        let cfg = Config::new(9000).unwrap();
        assert_eq!(cfg.address, "0.0.0.0");
        assert_eq!(cfg.epoll_poll_period_ms, 0);
        assert_eq!(cfg.epoll_uwait_timeout_ms, 0);
        assert_eq!(cfg.listen_backlog, 65535);
        assert!(cfg.call_timeout.is_none());
    }

    #[test]
    fn invalid_address_is_rejected() {
        let mut cfg = Config::new(9000).unwrap();
        cfg.address = "not-an-ip".to_string();
        assert!(cfg.socket_addr().is_err());
    }

    #[test]
    fn default_call_timeout_survives_conversion_into_server_config() {
        let cfg = Config::new(9000).unwrap().with_default_call_timeout();
        assert_eq!(cfg.call_timeout, Some(Duration::from_millis(3000)));

        let server_config = cfg.into_server_config().unwrap();
        assert_eq!(server_config.call_timeout, Some(Duration::from_millis(3000)));
    }
}

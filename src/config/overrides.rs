//! Command-line overrides layered on top of file configuration.

use std::net::SocketAddr;

use crate::config::loader::ConfigError;
use crate::config::schema::ProxyConfig;
use crate::config::validation::validate_config;

/// Values given on the command line that win over the config file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    /// Replaces the port of `listener.bind_address`.
    pub port: Option<u16>,
    /// Replaces `upstream.base_url`.
    pub upstream: Option<String>,
}

impl Overrides {
    /// Apply the overrides and re-validate the result.
    pub fn apply(&self, mut config: ProxyConfig) -> Result<ProxyConfig, ConfigError> {
        // An unparseable address is left as-is so validation reports it.
        if let Some(port) = self.port {
            if let Ok(mut addr) = config.listener.bind_address.parse::<SocketAddr>() {
                addr.set_port(port);
                config.listener.bind_address = addr.to_string();
            }
        }
        if let Some(upstream) = &self.upstream {
            config.upstream.base_url = upstream.clone();
        }

        validate_config(&config).map_err(ConfigError::Validation)?;
        Ok(config)
    }
}

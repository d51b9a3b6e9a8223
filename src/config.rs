use serde::Deserialize;

use crate::error::Error;

/// Queue pair the router moves messages between.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouterConfig {
    pub incoming_queue_url: String,
    pub outgoing_queue_url: String,
}

/// Process configuration, read from `SQDELAY_*` environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub incoming_queue_url: String,
    pub outgoing_queue_url: String,
    pub max_messages: Option<i32>,
    pub wait_time_seconds: Option<i32>,
    pub endpoint_url: Option<String>,
}

impl Config {
    pub fn load() -> eyre::Result<Self> {
        let config = envy::prefixed("SQDELAY_").from_env::<Self>()?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects empty queue URLs and out of range polling settings.
    pub fn validate(&self) -> Result<(), Error> {
        if self.incoming_queue_url.trim().is_empty() {
            return Err(Error::invalid_config("incoming queue URL is required"));
        }
        if self.outgoing_queue_url.trim().is_empty() {
            return Err(Error::invalid_config("outgoing queue URL is required"));
        }
        if !(1..=10).contains(&self.max_messages()) {
            return Err(Error::invalid_config(format!(
                "max messages must be between 1 and 10, got {}",
                self.max_messages()
            )));
        }
        if !(0..=20).contains(&self.wait_time_seconds()) {
            return Err(Error::invalid_config(format!(
                "wait time must be between 0 and 20 seconds, got {}",
                self.wait_time_seconds()
            )));
        }
        Ok(())
    }

    pub fn max_messages(&self) -> i32 {
        self.max_messages.unwrap_or(1)
    }

    pub fn wait_time_seconds(&self) -> i32 {
        self.wait_time_seconds.unwrap_or(20)
    }

    pub fn endpoint_url(&self) -> Option<&str> {
        self.endpoint_url.as_deref()
    }

    pub fn router_config(&self) -> RouterConfig {
        RouterConfig {
            incoming_queue_url: self.incoming_queue_url.clone(),
            outgoing_queue_url: self.outgoing_queue_url.clone(),
        }
    }
}

//! Purpose: Load and merge coordinator link settings for the CLI and embedders.
//! Exports: `LinkConfig`, `LinkOverrides`, `DEFAULT_CONNECT_TIMEOUT_MS`.
//! Role: One place that turns a JSON file plus flags into a ready-to-connect link.
//! Invariants: Flag overrides win over file values; file values win over defaults.
//! Invariants: Unknown JSON keys are rejected so typos surface as usage errors.
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::core::error::{Error, ErrorKind};
use crate::core::link::{CoordinatorLink, DEFAULT_SERVICE};
use crate::transport::TcpTransport;

pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5_000;

#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct LinkConfig {
    #[serde(default)]
    pub coordinator: Option<String>,
    #[serde(default = "default_service")]
    pub service: String,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

#[derive(Clone, Debug, Default)]
pub struct LinkOverrides {
    pub coordinator: Option<String>,
    pub service: Option<String>,
    pub connect_timeout_ms: Option<u64>,
}

fn default_service() -> String {
    DEFAULT_SERVICE.to_string()
}

fn default_connect_timeout_ms() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_MS
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            coordinator: None,
            service: default_service(),
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
        }
    }
}

impl LinkConfig {
    pub fn load(path: &Path) -> Result<Self, Error> {
        let text = std::fs::read_to_string(path).map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message(format!("failed to read link config {}", path.display()))
                .with_source(err)
        })?;
        serde_json::from_str(&text).map_err(|err| {
            Error::new(ErrorKind::Usage)
                .with_message(format!("invalid link config {}", path.display()))
                .with_hint("Expected JSON like {\"coordinator\": \"127.0.0.1:1982\"}.")
                .with_source(err)
        })
    }

    pub fn apply(mut self, overrides: LinkOverrides) -> Self {
        if let Some(coordinator) = overrides.coordinator {
            self.coordinator = Some(coordinator);
        }
        if let Some(service) = overrides.service {
            self.service = service;
        }
        if let Some(timeout) = overrides.connect_timeout_ms {
            self.connect_timeout_ms = timeout;
        }
        self
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn coordinator(&self) -> Result<&str, Error> {
        self.coordinator.as_deref().ok_or_else(|| {
            Error::new(ErrorKind::Usage)
                .with_message("no coordinator address configured")
                .with_hint("Pass --coordinator HOST:PORT or set \"coordinator\" in --config.")
        })
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.service.is_empty() {
            return Err(Error::new(ErrorKind::Usage).with_message("service name must not be empty"));
        }
        if self.connect_timeout_ms == 0 {
            return Err(Error::new(ErrorKind::Usage)
                .with_message("connect timeout must be greater than zero"));
        }
        self.coordinator().map(|_| ())
    }

    pub fn connect(&self) -> Result<CoordinatorLink<TcpTransport>, Error> {
        self.validate()?;
        let transport = TcpTransport::connect(self.coordinator()?, self.connect_timeout())?;
        Ok(CoordinatorLink::new(transport).with_service(self.service.clone()))
    }
}

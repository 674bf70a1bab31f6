//! Purpose: Keep a local configuration cache in step with the coordination service.
//! Exports: `CoordinatorLink`, `PollOutcome`, `DEFAULT_SERVICE`, `GET_CONFIG`.
//! Role: Owns one transport; multiplexes the get-config request with blocking admin RPCs.
//! Invariants: At most one get-config request is outstanding at any time.
//! Invariants: Cached versions never decrease; a config replaces the cache only if it decodes exactly.
//! Invariants: Every drained output buffer is released once on every path, including errors.
//! Invariants: Dropping the link kills an outstanding get-config request.
//! Notes: Not internally synchronized; drive one link from one thread at a time.
use std::os::fd::RawFd;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::core::cache::{Accept, ConfigCache};
use crate::core::config::Configuration;
use crate::core::error::{Error, ErrorKind};
use crate::core::readiness::{PollReadiness, Readiness, ReadyOutcome};
use crate::core::status::{Disposition, StatusContext, TransportStatus, classify};
use crate::core::transport::{Completion, RequestId, Timeout, Transport};

pub const DEFAULT_SERVICE: &str = "coordinator";
pub const GET_CONFIG: &str = "get-config";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PollOutcome {
    /// Nothing has completed yet.
    Idle,
    /// A configuration with a higher version was installed.
    Updated { version: u64 },
    /// A configuration arrived with the version already cached.
    Unchanged { version: u64 },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum WaitState {
    Draining,
    AwaitingReady,
}

pub struct CoordinatorLink<T: Transport, R: Readiness = PollReadiness> {
    transport: T,
    readiness: R,
    service: String,
    cache: ConfigCache,
    get_config: Option<RequestId>,
}

impl<T: Transport> CoordinatorLink<T> {
    pub fn new(transport: T) -> Self {
        Self::with_readiness(transport, PollReadiness)
    }
}

impl<T: Transport, R: Readiness> CoordinatorLink<T, R> {
    pub fn with_readiness(transport: T, readiness: R) -> Self {
        Self {
            transport,
            readiness,
            service: DEFAULT_SERVICE.to_string(),
            cache: ConfigCache::new(),
            get_config: None,
        }
    }

    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.service = service.into();
        self
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn config(&self) -> &Configuration {
        self.cache.current()
    }

    pub fn version(&self) -> u64 {
        self.cache.version()
    }

    pub fn poll_fd(&self) -> RawFd {
        self.transport.poll_fd()
    }

    pub fn pending_request(&self) -> Option<RequestId> {
        self.get_config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Advance the get-config exchange by one step without blocking.
    pub fn poll_for_config(&mut self) -> Result<PollOutcome, Error> {
        let id = match self.get_config {
            Some(id) => id,
            None => {
                let id = self
                    .transport
                    .send(&self.service, GET_CONFIG, &[])
                    .map_err(|status| {
                        status_error(status, StatusContext::Submit, "get-config submission failed")
                    })?;
                debug!(request = %id, service = %self.service, "submitted get-config");
                self.get_config = Some(id);
                id
            }
        };

        let completed = match self.transport.drain(Timeout::Immediate) {
            Ok(completed) => completed,
            Err(status) => {
                return match classify(status, StatusContext::PollDrain) {
                    Disposition::Idle => Ok(PollOutcome::Idle),
                    Disposition::Proceed | Disposition::Fail(_) => Err(status_error(
                        status,
                        StatusContext::PollDrain,
                        "draining coordinator events failed",
                    )),
                };
            }
        };

        if completed != id {
            if let Some(stray) = self.transport.take_completion(completed) {
                self.release(stray);
            }
            self.transport.kill(id);
            self.get_config = None;
            warn!(expected = %id, completed = %completed, "coordinator response for unexpected request");
            return Err(Error::new(ErrorKind::Internal)
                .with_message("completion for a request other than get-config")
                .with_request_id(completed.0));
        }

        self.get_config = None;
        let Some(completion) = self.transport.take_completion(id) else {
            return Err(Error::new(ErrorKind::Internal)
                .with_message("drained get-config has no completion record")
                .with_request_id(id.0));
        };

        match classify(completion.status, StatusContext::Completion) {
            Disposition::Proceed => {}
            Disposition::Idle | Disposition::Fail(_) => {
                let status = completion.status;
                self.release(completion);
                return Err(status_error(
                    status,
                    StatusContext::Completion,
                    "get-config failed at coordinator",
                )
                .with_request_id(id.0));
            }
        }

        let decoded = match completion.output {
            Some(output) => {
                debug!(request = %id, bytes = output.as_ref().len(), "received configuration");
                let decoded = Configuration::decode(output.as_ref());
                self.transport.release_output(output);
                decoded
            }
            None => Configuration::decode(&[]),
        };
        let config = decoded.map_err(|err| {
            warn!(request = %id, error = %err, "configuration failed to decode");
            Error::new(ErrorKind::BadConfig)
                .with_message("configuration did not decode exactly")
                .with_request_id(id.0)
                .with_source(err)
        })?;

        match self.cache.offer(config) {
            Accept::Advanced { from, to } => {
                debug!(from, to, "configuration advanced");
                Ok(PollOutcome::Updated { version: to })
            }
            Accept::Unchanged => Ok(PollOutcome::Unchanged {
                version: self.cache.version(),
            }),
            Accept::Regressed { cached, offered } => {
                warn!(cached, offered, "coordinator sent an older configuration");
                Err(Error::new(ErrorKind::BadConfig)
                    .with_message(format!(
                        "configuration version went backwards (cached {cached})"
                    ))
                    .with_version(offered))
            }
        }
    }

    /// Block until the cached version is strictly newer than on entry; returns that version.
    pub fn wait_for_config(&mut self) -> Result<u64, Error> {
        self.wait_newer(None)
    }

    /// Like `wait_for_config`, but gives up with `PollFailed` after `limit`.
    /// An outstanding request stays in flight for the next call.
    pub fn wait_for_config_timeout(&mut self, limit: Duration) -> Result<u64, Error> {
        self.wait_newer(Some(Instant::now() + limit))
    }

    fn wait_newer(&mut self, deadline: Option<Instant>) -> Result<u64, Error> {
        let start = self.cache.version();
        let mut state = WaitState::Draining;

        loop {
            state = match state {
                WaitState::Draining => match self.poll_for_config()? {
                    PollOutcome::Updated { version } if version > start => return Ok(version),
                    // A consumed reply leaves nothing in flight; resubmit before waiting.
                    PollOutcome::Updated { .. } | PollOutcome::Unchanged { .. } => {
                        if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                            return Err(wait_timed_out(start));
                        }
                        WaitState::Draining
                    }
                    PollOutcome::Idle => WaitState::AwaitingReady,
                },
                WaitState::AwaitingReady => {
                    let timeout = match deadline {
                        Some(deadline) => {
                            Timeout::After(deadline.saturating_duration_since(Instant::now()))
                        }
                        None => Timeout::Indefinite,
                    };
                    let fd = self.transport.poll_fd();
                    match self.readiness.wait_readable(fd, timeout) {
                        Ok(ReadyOutcome::Ready) => WaitState::Draining,
                        Ok(ReadyOutcome::TimedOut) => return Err(wait_timed_out(start)),
                        Err(err) => {
                            return Err(Error::new(ErrorKind::PollFailed)
                                .with_message("waiting on coordinator descriptor failed")
                                .with_source(err));
                        }
                    }
                }
            };
        }
    }

    /// Run one request/response exchange with `function` and return its output.
    pub fn make_rpc(&mut self, function: &str, input: &[u8]) -> Result<Vec<u8>, Error> {
        let id = self
            .transport
            .send(&self.service, function, input)
            .map_err(|status| {
                status_error(status, StatusContext::Submit, "rpc submission failed")
                    .with_hint(format!("function: {function}"))
            })?;
        debug!(request = %id, function, "submitted rpc");

        let completed = self
            .transport
            .drain_for(id, Timeout::Indefinite)
            .map_err(|status| {
                status_error(status, StatusContext::BlockingDrain, "waiting for rpc failed")
                    .with_request_id(id.0)
            })?;
        if completed != id {
            if let Some(stray) = self.transport.take_completion(completed) {
                self.release(stray);
            }
            self.transport.kill(id);
            warn!(expected = %id, completed = %completed, "rpc drain returned another request");
            return Err(Error::new(ErrorKind::Internal)
                .with_message("rpc drain returned a different request")
                .with_request_id(completed.0));
        }

        let Some(mut completion) = self.transport.take_completion(id) else {
            return Err(Error::new(ErrorKind::Internal)
                .with_message("drained rpc has no completion record")
                .with_request_id(id.0));
        };

        match classify(completion.status, StatusContext::Completion) {
            Disposition::Proceed => {
                let output = match completion.output.take() {
                    Some(output) => {
                        let bytes = output.as_ref().to_vec();
                        self.transport.release_output(output);
                        bytes
                    }
                    None => Vec::new(),
                };
                debug!(request = %id, function, bytes = output.len(), "rpc complete");
                Ok(output)
            }
            Disposition::Idle | Disposition::Fail(_) => {
                let status = completion.status;
                self.release(completion);
                Err(status_error(status, StatusContext::Completion, "rpc failed at coordinator")
                    .with_request_id(id.0)
                    .with_hint(format!("function: {function}")))
            }
        }
    }

    fn release(&mut self, completion: Completion<T::Output>) {
        if let Some(output) = completion.output {
            self.transport.release_output(output);
        }
    }
}

impl<T: Transport, R: Readiness> Drop for CoordinatorLink<T, R> {
    fn drop(&mut self) {
        if let Some(id) = self.get_config.take() {
            debug!(request = %id, "cancelling outstanding get-config");
            self.transport.kill(id);
            if let Some(completion) = self.transport.take_completion(id) {
                self.release(completion);
            }
        }
    }
}

fn wait_timed_out(start: u64) -> Error {
    Error::new(ErrorKind::PollFailed)
        .with_message("timed out waiting for a newer configuration")
        .with_version(start)
}

fn status_error(status: TransportStatus, context: StatusContext, message: &str) -> Error {
    let kind = match classify(status, context) {
        Disposition::Fail(kind) => kind,
        Disposition::Proceed | Disposition::Idle => ErrorKind::Internal,
    };
    Error::new(kind).with_message(format!("{message}: {}", status.as_str()))
}

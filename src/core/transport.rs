//! Purpose: Capability set the coordinator link needs from a coordination transport.
//! Exports: `Transport`, `RequestId`, `Timeout`, `Completion`.
//! Role: Seam between the link state machine and a concrete connection (TCP, test doubles).
//! Invariants: Output buffers move into `release_output`; each one is released at most once.
//! Invariants: `drain_for` leaves completions of other requests queued for `drain`.
use std::fmt;
use std::os::fd::RawFd;
use std::time::Duration;

use crate::core::status::TransportStatus;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Timeout {
    /// Return at once if nothing has completed.
    Immediate,
    After(Duration),
    Indefinite,
}

impl Timeout {
    /// Millisecond value for `poll(2)`: 0 = immediate, -1 = forever.
    pub fn as_poll_millis(self) -> libc::c_int {
        match self {
            Timeout::Immediate => 0,
            Timeout::After(duration) => duration.as_millis().min(libc::c_int::MAX as u128) as libc::c_int,
            Timeout::Indefinite => -1,
        }
    }
}

/// Recorded result of a finished request.
#[derive(Debug)]
pub struct Completion<O> {
    pub status: TransportStatus,
    pub output: Option<O>,
}

pub trait Transport {
    type Output: AsRef<[u8]>;

    /// Submit `input` to `function` of `service`; failure codes describe why it was refused.
    fn send(
        &mut self,
        service: &str,
        function: &str,
        input: &[u8],
    ) -> Result<RequestId, TransportStatus>;

    /// Id of any request that has completed; `Err(Timeout)` when nothing is ready in time.
    fn drain(&mut self, timeout: Timeout) -> Result<RequestId, TransportStatus>;

    /// Block until `id` completes.
    fn drain_for(&mut self, id: RequestId, timeout: Timeout) -> Result<RequestId, TransportStatus>;

    /// Completion record for a drained request; `None` if it was never drained or already taken.
    fn take_completion(&mut self, id: RequestId) -> Option<Completion<Self::Output>>;

    /// Best-effort cancellation; a later reply for `id` is discarded.
    fn kill(&mut self, id: RequestId);

    fn release_output(&mut self, output: Self::Output);

    /// Descriptor that turns read-ready when there are events to drain.
    fn poll_fd(&self) -> RawFd;
}

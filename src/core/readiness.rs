//! Purpose: Block until a transport descriptor has events to drain.
//! Exports: `Readiness`, `PollReadiness`, `ReadyOutcome`.
//! Role: Wait primitive behind the link's AWAITING_READY state; swappable for tests.
//! Invariants: Error and hang-up conditions count as "ready" so the next drain surfaces them.
//! Invariants: `EINTR` is returned to the caller, never retried silently.
use std::io;
use std::os::fd::RawFd;

use crate::core::transport::Timeout;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ReadyOutcome {
    Ready,
    TimedOut,
}

pub trait Readiness {
    fn wait_readable(&mut self, fd: RawFd, timeout: Timeout) -> io::Result<ReadyOutcome>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct PollReadiness;

impl Readiness for PollReadiness {
    fn wait_readable(&mut self, fd: RawFd, timeout: Timeout) -> io::Result<ReadyOutcome> {
        let mut pfd = libc::pollfd {
            fd,
            events: libc::POLLIN,
            revents: 0,
        };
        let rc = unsafe { libc::poll(&mut pfd, 1, timeout.as_poll_millis()) };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }
        if rc == 0 {
            if timeout == Timeout::Indefinite {
                return Err(io::Error::other("poll returned without ready descriptors"));
            }
            return Ok(ReadyOutcome::TimedOut);
        }
        if pfd.revents & libc::POLLNVAL != 0 {
            return Err(io::Error::from_raw_os_error(libc::EBADF));
        }
        Ok(ReadyOutcome::Ready)
    }
}

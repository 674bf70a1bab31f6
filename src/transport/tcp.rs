//! Purpose: Non-blocking TCP implementation of the coordination transport.
//! Exports: `TcpTransport`.
//! Role: Default transport behind the CLI; one connection per link.
//! Invariants: A request is fully written before `send` returns its id.
//! Invariants: Connection loss is sticky: every later send/drain reports `ServerError`.
//! Invariants: Replies for killed or unknown ids are dropped, never surfaced.
//! Invariants: Completed ids are reported by `drain` in arrival order.
use std::collections::{HashMap, HashSet, VecDeque};
use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::os::fd::{AsRawFd, RawFd};
use std::time::{Duration, Instant};

use bytes::{Buf, Bytes, BytesMut};
use tracing::{debug, warn};

use crate::core::error::{Error, ErrorKind};
use crate::core::status::TransportStatus;
use crate::core::transport::{Completion, RequestId, Timeout, Transport};
use crate::transport::wire;

const MAX_NAME_LEN: usize = 1024;
const READ_CHUNK: usize = 16 * 1024;

pub struct TcpTransport {
    stream: TcpStream,
    peer: SocketAddr,
    next_id: u64,
    outbound: BytesMut,
    inbound: BytesMut,
    outstanding: HashSet<RequestId>,
    ready: VecDeque<RequestId>,
    completions: HashMap<RequestId, Completion<Bytes>>,
    failed: Option<TransportStatus>,
}

impl TcpTransport {
    pub fn connect(address: &str, connect_timeout: Duration) -> Result<Self, Error> {
        let candidates: Vec<SocketAddr> = address
            .to_socket_addrs()
            .map_err(|err| {
                Error::new(ErrorKind::Usage)
                    .with_message(format!("invalid coordinator address '{address}'"))
                    .with_hint("Use a host:port value like 127.0.0.1:1982.")
                    .with_source(err)
            })?
            .collect();

        let mut last_err = None;
        for candidate in candidates {
            match TcpStream::connect_timeout(&candidate, connect_timeout) {
                Ok(stream) => return Self::from_stream(stream),
                Err(err) => {
                    debug!(address = %candidate, error = %err, "coordinator connect attempt failed");
                    last_err = Some(err);
                }
            }
        }

        let err = Error::new(ErrorKind::CoordFail)
            .with_message(format!("failed to connect to coordinator at {address}"));
        Err(match last_err {
            Some(source) => err.with_source(source),
            None => err.with_hint("The address did not resolve to any socket address."),
        })
    }

    pub fn from_stream(stream: TcpStream) -> Result<Self, Error> {
        let setup = |err: io::Error| {
            Error::new(ErrorKind::Io)
                .with_message("failed to configure coordinator socket")
                .with_source(err)
        };
        let peer = stream.peer_addr().map_err(setup)?;
        stream.set_nodelay(true).map_err(setup)?;
        stream.set_nonblocking(true).map_err(setup)?;
        debug!(peer = %peer, "connected to coordinator");
        Ok(Self {
            stream,
            peer,
            next_id: 1,
            outbound: BytesMut::new(),
            inbound: BytesMut::with_capacity(READ_CHUNK),
            outstanding: HashSet::new(),
            ready: VecDeque::new(),
            completions: HashMap::new(),
            failed: None,
        })
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    pub fn outstanding(&self) -> usize {
        self.outstanding.len()
    }

    fn fail(&mut self, status: TransportStatus, why: &str) {
        if self.failed.is_none() {
            warn!(peer = %self.peer, reason = why, "coordinator connection failed");
            self.failed = Some(status);
        }
    }

    fn flush(&mut self) {
        while !self.outbound.is_empty() && self.failed.is_none() {
            match self.stream.write(&self.outbound) {
                Ok(0) => self.fail(TransportStatus::ServerError, "connection closed on write"),
                Ok(written) => self.outbound.advance(written),
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => return,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(_) => self.fail(TransportStatus::ServerError, "write error"),
            }
        }
    }

    fn fill(&mut self) {
        let mut chunk = [0u8; READ_CHUNK];
        while self.failed.is_none() {
            match self.stream.read(&mut chunk) {
                Ok(0) => self.fail(TransportStatus::ServerError, "connection closed by coordinator"),
                Ok(read) => self.inbound.extend_from_slice(&chunk[..read]),
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => break,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(_) => self.fail(TransportStatus::ServerError, "read error"),
            }
        }
        self.parse_frames();
    }

    fn parse_frames(&mut self) {
        loop {
            let total = match wire::frame_len(&self.inbound) {
                Ok(Some(total)) if self.inbound.len() >= total => total,
                Ok(_) => return,
                Err(_) => {
                    self.fail(TransportStatus::MisbehavingServer, "oversized frame");
                    return;
                }
            };
            let mut frame = self.inbound.split_to(total).freeze();
            frame.advance(wire::FRAME_PREFIX_LEN);
            let response = match wire::decode_response(frame) {
                Ok(response) => response,
                Err(_) => {
                    self.fail(TransportStatus::MisbehavingServer, "malformed response frame");
                    return;
                }
            };
            let id = RequestId(response.id);
            if !self.outstanding.remove(&id) {
                debug!(request = %id, "dropping reply for unknown request");
                continue;
            }
            self.completions.insert(
                id,
                Completion {
                    status: response.status,
                    output: Some(response.output),
                },
            );
            self.ready.push_back(id);
        }
    }

    fn pump(&mut self) {
        self.flush();
        self.fill();
    }

    fn wait_io(&mut self, timeout: Timeout) {
        let mut events = libc::POLLIN;
        if !self.outbound.is_empty() {
            events |= libc::POLLOUT;
        }
        let mut pfd = libc::pollfd {
            fd: self.stream.as_raw_fd(),
            events,
            revents: 0,
        };
        loop {
            let rc = unsafe { libc::poll(&mut pfd, 1, timeout.as_poll_millis()) };
            if rc >= 0 {
                return;
            }
            if io::Error::last_os_error().kind() != io::ErrorKind::Interrupted {
                self.fail(TransportStatus::InternalError, "poll on coordinator socket failed");
                return;
            }
        }
    }

    fn wait_until(
        &mut self,
        timeout: Timeout,
        mut done: impl FnMut(&mut Self) -> Option<RequestId>,
    ) -> Result<RequestId, TransportStatus> {
        let deadline = match timeout {
            Timeout::After(limit) => Some(Instant::now() + limit),
            Timeout::Immediate | Timeout::Indefinite => None,
        };
        loop {
            self.pump();
            if let Some(id) = done(self) {
                return Ok(id);
            }
            if let Some(status) = self.failed {
                return Err(status);
            }
            if self.outstanding.is_empty() {
                return Err(TransportStatus::NonePending);
            }
            let wait = match (timeout, deadline) {
                (Timeout::Immediate, _) => return Err(TransportStatus::Timeout),
                (_, Some(deadline)) => {
                    let left = deadline.saturating_duration_since(Instant::now());
                    if left.is_zero() {
                        return Err(TransportStatus::Timeout);
                    }
                    Timeout::After(left)
                }
                (_, None) => Timeout::Indefinite,
            };
            self.wait_io(wait);
        }
    }
}

impl Transport for TcpTransport {
    type Output = Bytes;

    fn send(
        &mut self,
        service: &str,
        function: &str,
        input: &[u8],
    ) -> Result<RequestId, TransportStatus> {
        if let Some(status) = self.failed {
            return Err(status);
        }
        if service.len() > MAX_NAME_LEN || function.len() > MAX_NAME_LEN {
            return Err(TransportStatus::NameTooLong);
        }

        let id = RequestId(self.next_id);
        let frame = wire::encode_request(id.0, service, function, input).map_err(|err| {
            warn!(error = %err, function, "request does not fit in a frame");
            TransportStatus::InternalError
        })?;
        self.next_id += 1;
        self.outbound.extend_from_slice(&frame);
        self.outstanding.insert(id);

        while !self.outbound.is_empty() {
            self.flush();
            if let Some(status) = self.failed {
                self.outstanding.remove(&id);
                return Err(status);
            }
            if !self.outbound.is_empty() {
                self.wait_io(Timeout::Indefinite);
            }
        }
        debug!(request = %id, function, bytes = input.len(), "sent request");
        Ok(id)
    }

    fn drain(&mut self, timeout: Timeout) -> Result<RequestId, TransportStatus> {
        self.wait_until(timeout, |transport| transport.ready.pop_front())
    }

    fn drain_for(&mut self, id: RequestId, timeout: Timeout) -> Result<RequestId, TransportStatus> {
        if !self.outstanding.contains(&id) && !self.completions.contains_key(&id) {
            return Err(TransportStatus::NonePending);
        }
        self.wait_until(timeout, |transport| {
            let position = transport.ready.iter().position(|ready| *ready == id)?;
            transport.ready.remove(position)
        })
    }

    fn take_completion(&mut self, id: RequestId) -> Option<Completion<Bytes>> {
        self.completions.remove(&id)
    }

    fn kill(&mut self, id: RequestId) {
        self.outstanding.remove(&id);
        self.completions.remove(&id);
        self.ready.retain(|ready| *ready != id);
    }

    fn release_output(&mut self, output: Bytes) {
        drop(output);
    }

    fn poll_fd(&self) -> RawFd {
        self.stream.as_raw_fd()
    }
}

//! Purpose: Define the caller-visible failure taxonomy for the coordinator link.
//! Exports: `Error`, `ErrorKind`, `to_exit_code`.
//! Role: Single error type shared by the link, the bundled transport, and the CLI.
//! Invariants: The link state machine only ever produces the four protocol kinds.
//! Invariants: `Usage`/`Io` belong to the outer surfaces (config files, CLI args).
use std::error::Error as StdError;
use std::fmt;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    /// Coordination service unreachable, needs re-bootstrap, or broke protocol.
    CoordFail,
    /// Unclassified transport or protocol condition; a defect signal.
    Internal,
    /// A configuration payload arrived but did not decode exactly.
    BadConfig,
    /// The readiness-wait primitive failed.
    PollFailed,
    Usage,
    Io,
}

impl ErrorKind {
    /// Protocol outcomes the link reports; callers may retry these out-of-band.
    pub fn is_protocol(self) -> bool {
        matches!(
            self,
            ErrorKind::CoordFail | ErrorKind::Internal | ErrorKind::BadConfig | ErrorKind::PollFailed
        )
    }
}

#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    message: Option<String>,
    hint: Option<String>,
    request_id: Option<u64>,
    version: Option<u64>,
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl Error {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
            hint: None,
            request_id: None,
            version: None,
            source: None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn hint(&self) -> Option<&str> {
        self.hint.as_deref()
    }

    pub fn request_id(&self) -> Option<u64> {
        self.request_id
    }

    pub fn version(&self) -> Option<u64> {
        self.version
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn with_request_id(mut self, request_id: u64) -> Self {
        self.request_id = Some(request_id);
        self
    }

    pub fn with_version(mut self, version: u64) -> Self {
        self.version = Some(version);
        self
    }

    pub fn with_source(mut self, source: impl StdError + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.kind)?;
        if let Some(message) = &self.message {
            write!(f, ": {message}")?;
        }
        if let Some(request_id) = self.request_id {
            write!(f, " (request: {request_id})")?;
        }
        if let Some(version) = self.version {
            write!(f, " (version: {version})")?;
        }
        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|source| source.as_ref() as &(dyn StdError + 'static))
    }
}

pub fn to_exit_code(kind: ErrorKind) -> i32 {
    match kind {
        ErrorKind::Internal => 1,
        ErrorKind::Usage => 2,
        ErrorKind::CoordFail => 3,
        ErrorKind::BadConfig => 4,
        ErrorKind::PollFailed => 5,
        ErrorKind::Io => 6,
    }
}

//! Purpose: Map low-level transport status codes onto the link's outcome set.
//! Exports: `TransportStatus`, `StatusContext`, `Disposition`, `classify`.
//! Role: The only place transport codes are interpreted; every call site goes through it.
//! Invariants: `TransportStatus` is closed and every match over it is exhaustive.
//! Invariants: A timeout is "nothing ready" only on the zero-timeout poll drain.
use crate::core::error::ErrorKind;

/// Every status the coordination transport can report for a send, a drain, or a
/// completed request.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum TransportStatus {
    Success,
    NameTooLong,
    FuncNotFound,
    ObjExist,
    ObjNotFound,
    CondNotFound,
    ServerError,
    BadLibrary,
    Timeout,
    NeedBootstrap,
    MisbehavingServer,
    InternalError,
    NonePending,
    Garbage,
}

impl TransportStatus {
    pub const ALL: [TransportStatus; 14] = [
        TransportStatus::Success,
        TransportStatus::NameTooLong,
        TransportStatus::FuncNotFound,
        TransportStatus::ObjExist,
        TransportStatus::ObjNotFound,
        TransportStatus::CondNotFound,
        TransportStatus::ServerError,
        TransportStatus::BadLibrary,
        TransportStatus::Timeout,
        TransportStatus::NeedBootstrap,
        TransportStatus::MisbehavingServer,
        TransportStatus::InternalError,
        TransportStatus::NonePending,
        TransportStatus::Garbage,
    ];

    /// Stable one-byte wire code.
    pub fn code(self) -> u8 {
        match self {
            TransportStatus::Success => 0x00,
            TransportStatus::NameTooLong => 0x01,
            TransportStatus::FuncNotFound => 0x02,
            TransportStatus::ObjExist => 0x03,
            TransportStatus::ObjNotFound => 0x04,
            TransportStatus::CondNotFound => 0x05,
            TransportStatus::ServerError => 0x06,
            TransportStatus::BadLibrary => 0x07,
            TransportStatus::Timeout => 0x08,
            TransportStatus::NeedBootstrap => 0x09,
            TransportStatus::MisbehavingServer => 0x0a,
            TransportStatus::InternalError => 0x0b,
            TransportStatus::NonePending => 0x0c,
            TransportStatus::Garbage => 0x0d,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.code() == code)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TransportStatus::Success => "success",
            TransportStatus::NameTooLong => "name too long",
            TransportStatus::FuncNotFound => "function not found",
            TransportStatus::ObjExist => "object already exists",
            TransportStatus::ObjNotFound => "object not found",
            TransportStatus::CondNotFound => "condition not found",
            TransportStatus::ServerError => "coordinator unreachable",
            TransportStatus::BadLibrary => "bad library",
            TransportStatus::Timeout => "timeout",
            TransportStatus::NeedBootstrap => "coordinator needs bootstrap",
            TransportStatus::MisbehavingServer => "coordinator misbehaving",
            TransportStatus::InternalError => "transport internal error",
            TransportStatus::NonePending => "no requests pending",
            TransportStatus::Garbage => "garbage status",
        }
    }
}

/// Where a status was observed.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StatusContext {
    /// `send` refused the request.
    Submit,
    /// Zero-timeout drain inside a poll cycle.
    PollDrain,
    /// Indefinite drain waiting for one RPC.
    BlockingDrain,
    /// Per-request completion status of a drained request.
    Completion,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Disposition {
    /// Keep going with the request.
    Proceed,
    /// Nothing ready yet; not an error.
    Idle,
    Fail(ErrorKind),
}

pub fn classify(status: TransportStatus, context: StatusContext) -> Disposition {
    use TransportStatus as S;

    match context {
        StatusContext::Submit | StatusContext::BlockingDrain => match status {
            S::ServerError | S::NeedBootstrap | S::MisbehavingServer => {
                Disposition::Fail(ErrorKind::CoordFail)
            }
            S::Success
            | S::NameTooLong
            | S::FuncNotFound
            | S::ObjExist
            | S::ObjNotFound
            | S::CondNotFound
            | S::BadLibrary
            | S::Timeout
            | S::InternalError
            | S::NonePending
            | S::Garbage => Disposition::Fail(ErrorKind::Internal),
        },
        StatusContext::PollDrain => match status {
            S::ServerError | S::NeedBootstrap | S::MisbehavingServer => {
                Disposition::Fail(ErrorKind::CoordFail)
            }
            S::Timeout => Disposition::Idle,
            S::Success
            | S::NameTooLong
            | S::FuncNotFound
            | S::ObjExist
            | S::ObjNotFound
            | S::CondNotFound
            | S::BadLibrary
            | S::InternalError
            | S::NonePending
            | S::Garbage => Disposition::Fail(ErrorKind::Internal),
        },
        StatusContext::Completion => match status {
            S::Success => Disposition::Proceed,
            S::FuncNotFound
            | S::ObjNotFound
            | S::CondNotFound
            | S::ServerError
            | S::NeedBootstrap
            | S::MisbehavingServer => Disposition::Fail(ErrorKind::CoordFail),
            S::NameTooLong
            | S::ObjExist
            | S::BadLibrary
            | S::Timeout
            | S::InternalError
            | S::NonePending
            | S::Garbage => Disposition::Fail(ErrorKind::Internal),
        },
    }
}

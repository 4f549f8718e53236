//! Error taxonomy shared across the workspace.
//!
//! Every public cube operation either succeeds with a typed value or fails
//! with exactly one [`CubeError`] variant. Malformed notifications never
//! surface here: decoders report [`DecodeError`] and the owning handler
//! drops the frame.

use std::fmt;

use crate::channel::Domain;
use crate::version::ProtocolVersion;

/// Opaque error produced by the transport collaborator.
///
/// Carried unchanged inside [`CubeError::Transport`] so callers can
/// downcast to the concrete adapter error.
pub type TransportError = Box<dyn std::error::Error + Send + Sync>;

/// Top-level error returned by cube operations.
#[derive(Debug, thiserror::Error)]
pub enum CubeError {
    /// The sub-channel needed by the operation was never discovered on
    /// this cube.
    #[error("capability unavailable on this cube")]
    CapabilityUnavailable,

    /// Connect, discover, read, write or subscribe failed in the transport.
    #[error("transport error")]
    Transport(#[source] TransportError),

    /// A command parameter lies outside its documented range.
    #[error("parameter out of range")]
    OutOfRange(#[from] ParameterError),

    /// A correlated command did not receive its reply in time.
    #[error("no reply on the {domain} channel before the deadline")]
    ReplyTimeout {
        /// Domain whose reply never arrived.
        domain: Domain,
    },

    /// The connection was torn down while the operation was pending.
    #[error("connection closed")]
    ConnectionClosed,

    /// The negotiated firmware has no layout for this command.
    #[error("{feature} is not supported by protocol version {version}")]
    Unsupported {
        /// Name of the command or setting.
        feature: &'static str,
        /// Version negotiated at connect time.
        version: ProtocolVersion,
    },
}

/// Coarse classification of a [`CubeError`], for callers that only branch
/// on the kind of failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    CapabilityUnavailable,
    Transport,
    OutOfRange,
    ReplyTimeout,
    ConnectionClosed,
    Unsupported,
}

impl CubeError {
    /// Wrap any transport-level error.
    pub fn transport(err: impl Into<TransportError>) -> Self {
        Self::Transport(err.into())
    }

    /// Classify this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::CapabilityUnavailable => ErrorKind::CapabilityUnavailable,
            Self::Transport(_) => ErrorKind::Transport,
            Self::OutOfRange(_) => ErrorKind::OutOfRange,
            Self::ReplyTimeout { .. } => ErrorKind::ReplyTimeout,
            Self::ConnectionClosed => ErrorKind::ConnectionClosed,
            Self::Unsupported { .. } => ErrorKind::Unsupported,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::CapabilityUnavailable => "capability_unavailable",
            Self::Transport => "transport",
            Self::OutOfRange => "out_of_range",
            Self::ReplyTimeout => "reply_timeout",
            Self::ConnectionClosed => "connection_closed",
            Self::Unsupported => "unsupported",
        };
        f.write_str(name)
    }
}

/// A command parameter failed validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParameterError {
    /// A numeric parameter lies outside `[min, max]`.
    #[error("{name} must be within [{min}, {max}], got {value}")]
    OutOfRange {
        /// Parameter name.
        name: &'static str,
        /// Rejected value.
        value: i64,
        /// Inclusive lower bound.
        min: i64,
        /// Inclusive upper bound.
        max: i64,
    },

    /// A list parameter has too few or too many items.
    #[error("{name} must contain between {min} and {max} items, got {len}")]
    Count {
        /// Parameter name.
        name: &'static str,
        /// Number of items given.
        len: usize,
        /// Minimum item count.
        min: usize,
        /// Maximum item count.
        max: usize,
    },
}

/// Why a notification frame could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// Zero-length frame.
    #[error("empty frame")]
    Empty,

    /// The frame is shorter than its opcode requires.
    #[error("{frame} frame must be at least {expected} bytes, got {actual}")]
    Truncated {
        /// Frame name (e.g. "position id").
        frame: &'static str,
        /// Minimum byte count.
        expected: usize,
        /// Actual byte count.
        actual: usize,
    },

    /// The opcode byte is not known for this channel.
    #[error("unknown opcode 0x{0:02x}")]
    UnknownOpcode(u8),

    /// A field holds a value outside its enumeration.
    #[error("invalid {field} value {value}")]
    InvalidValue {
        /// Field name.
        field: &'static str,
        /// Raw value.
        value: u32,
    },
}

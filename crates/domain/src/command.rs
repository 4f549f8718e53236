//! Command: an encoded frame ready to be written to one sub-channel.

use crate::channel::Domain;

/// An immutable, fully encoded command.
///
/// Codecs are the only producers; handlers write [`bytes`](Self::bytes)
/// verbatim to the sub-channel of [`domain`](Self::domain).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    domain: Domain,
    bytes: Vec<u8>,
}

impl Command {
    pub(crate) fn new(domain: Domain, bytes: Vec<u8>) -> Self {
        Self { domain, bytes }
    }

    /// Domain whose sub-channel receives this command.
    #[must_use]
    pub fn domain(&self) -> Domain {
        self.domain
    }

    /// Opcode (first byte) of the frame.
    #[must_use]
    pub fn opcode(&self) -> u8 {
        self.bytes.first().copied().unwrap_or_default()
    }

    /// Encoded frame.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

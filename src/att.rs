//! Attribute and connection handles, and the protocol status codes the dispatch layer reports.

use crate::Error;
use core::fmt;

/// A 16-bit handle uniquely identifying an attribute on the server.
///
/// Handles are assigned by the deployment's service table and stay stable for the process
/// lifetime; this layer never derives or reassigns them. The `0x0000` handle (`NULL`) is invalid
/// and must not be used for actual attributes.
#[derive(Copy, Clone, PartialEq, Eq)]
pub struct Handle(u16);

impl Handle {
    /// The `0x0000` handle is not used for actual attributes, but as a special placeholder when
    /// no attribute handle is valid.
    pub const NULL: Self = Handle(0x0000);

    /// Create an attribute handle from a raw u16.
    pub const fn from_raw(raw: u16) -> Self {
        Handle(raw)
    }

    /// Returns the raw 16-bit integer representing this handle.
    pub fn as_u16(&self) -> u16 {
        self.0
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06X}", self.0)
    }
}

/// Identifies one active link, as issued by the BLE stack.
///
/// The handle is opaque to this layer and stable for the link's lifetime; it keys all
/// per-connection subscription state. [`ConnHandle::INVALID`] doubles as the unused-slot
/// sentinel in the notification registry.
#[derive(Copy, Clone, PartialEq, Eq)]
pub struct ConnHandle(u16);

impl ConnHandle {
    /// Marker for "no connection"; never issued for a live link.
    pub const INVALID: Self = ConnHandle(0xFFFF);

    /// Create a connection handle from the stack's raw u16.
    pub const fn from_raw(raw: u16) -> Self {
        ConnHandle(raw)
    }

    /// Returns the raw 16-bit integer representing this handle.
    pub fn as_u16(&self) -> u16 {
        self.0
    }

    /// Returns whether `self` refers to a connection at all (ie. is not the sentinel).
    pub fn is_valid(&self) -> bool {
        *self != Self::INVALID
    }
}

impl fmt::Debug for ConnHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06X}", self.0)
    }
}

enum_with_unknown! {
    /// Status codes reported to the remote peer when an attribute operation fails.
    ///
    /// The values are the Attribute Protocol's standard error codes; only a subset can actually
    /// originate from this layer, but peers may surface any of them.
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub enum ErrorCode(u8) {
        /// The handle is not valid on this server.
        InvalidHandle = 0x01,
        /// Attribute isn't readable.
        ReadNotPermitted = 0x02,
        /// Attribute isn't writable.
        WriteNotPermitted = 0x03,
        /// The request PDU itself was malformed.
        InvalidPdu = 0x04,
        /// Server doesn't support this operation.
        RequestNotSupported = 0x06,
        /// The requested offset lies past the end of the value.
        InvalidOffset = 0x07,
        /// No attribute found within the requested range.
        AttributeNotFound = 0x0A,
        /// The written value has the wrong length for the target attribute.
        InvalidAttributeValueLength = 0x0D,
        /// Request failed for a reason that has no better code.
        UnlikelyError = 0x0E,
        /// Server didn't have enough resources to complete the request.
        InsufficientResources = 0x11,
    }
}

/// Decode failures abort the write they occurred in and are reported with the matching
/// protocol status.
impl From<Error> for ErrorCode {
    fn from(e: Error) -> Self {
        match e {
            Error::InvalidLength => ErrorCode::InvalidAttributeValueLength,
            Error::Eof => ErrorCode::UnlikelyError,
        }
    }
}

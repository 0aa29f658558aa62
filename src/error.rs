use core::fmt;

/// Errors returned by the serving layer.
#[derive(Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// A write payload was too short or too long for the target value.
    ///
    /// Decoding stops at the first length mismatch, so the characteristic state
    /// the payload was meant for is left untouched.
    InvalidLength,

    /// Unexpectedly reached the end of a buffer.
    ///
    /// Kept distinct from [`Error::InvalidLength`] for callers that need to tell
    /// "the peer sent a malformed payload" apart from "a local buffer ran out".
    Eof,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Error::InvalidLength => "invalid payload length",
            Error::Eof => "end of buffer",
        })
    }
}

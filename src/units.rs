//! Wire representations of the scalar values served by the fan characteristics.
//!
//! Each type is a transparent newtype over its raw little-endian encoding, so decoding a write
//! payload and serializing a read are both plain byte copies (`zerocopy`). Types that can be
//! "value not known" reserve the all-ones raw pattern for that state.

use crate::time::Duration;
use core::fmt;
use zerocopy::byteorder::{LittleEndian, U16};
use zerocopy::{AsBytes, FromBytes, Unaligned};

/// A percentage with 1% resolution and a "value not known" state.
///
/// Known values are meant to lie in `0..=100`; raw values above that are passed through
/// unchanged and clamped where they meet hardware (see [`FanPwm`]).
///
/// [`FanPwm`]: crate::hw::FanPwm
#[derive(Copy, Clone, PartialEq, Eq, FromBytes, AsBytes, Unaligned)]
#[repr(transparent)]
pub struct Percent8(u8);

impl Percent8 {
    /// The "value not known" encoding.
    pub const NOT_KNOWN: Self = Percent8(0xFF);

    /// Creates a known percentage.
    pub const fn new(percent: u8) -> Self {
        Percent8(percent)
    }

    /// Returns the percentage, or `None` when the value is not known.
    pub fn value(&self) -> Option<u8> {
        if self.is_known() {
            Some(self.0)
        } else {
            None
        }
    }

    /// Returns the percentage, or `default` when the value is not known.
    pub fn value_or(&self, default: u8) -> u8 {
        self.value().unwrap_or(default)
    }

    /// Returns whether a value is present.
    pub fn is_known(&self) -> bool {
        self.0 != Self::NOT_KNOWN.0
    }
}

impl Default for Percent8 {
    fn default() -> Self {
        Self::NOT_KNOWN
    }
}

impl fmt::Debug for Percent8 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.value() {
            Some(v) => write!(f, "{}%", v),
            None => f.write_str("(not known)"),
        }
    }
}

/// A fan speed in revolutions per minute.
#[derive(Copy, Clone, PartialEq, Eq, FromBytes, AsBytes, Unaligned)]
#[repr(transparent)]
pub struct Rpm16(U16<LittleEndian>);

impl Rpm16 {
    pub fn new(rpm: u16) -> Self {
        Rpm16(U16::new(rpm))
    }

    pub fn get(&self) -> u16 {
        self.0.get()
    }
}

impl fmt::Debug for Rpm16 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}rpm", self.get())
    }
}

/// A duration in whole seconds, as carried on the wire by the policy's cooldown attribute.
#[derive(Copy, Clone, PartialEq, Eq, FromBytes, AsBytes, Unaligned)]
#[repr(transparent)]
pub struct Seconds16(U16<LittleEndian>);

impl Seconds16 {
    pub fn new(secs: u16) -> Self {
        Seconds16(U16::new(secs))
    }

    pub fn get(&self) -> u16 {
        self.0.get()
    }

    /// The equivalent [`Duration`].
    pub fn as_duration(&self) -> Duration {
        Duration::from_secs(self.get())
    }
}

impl fmt::Debug for Seconds16 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s", self.get())
    }
}

/// A VOC index reading or threshold, with a "value not known" state.
///
/// The index is dimensionless; higher means worse air. Sensors report the all-ones pattern
/// while they have no valid sample, and thresholds set to it disable the rule they feed.
#[derive(Copy, Clone, PartialEq, Eq, FromBytes, AsBytes, Unaligned)]
#[repr(transparent)]
pub struct VocIndex(U16<LittleEndian>);

impl VocIndex {
    const RAW_NOT_KNOWN: u16 = 0xFFFF;

    /// Creates a known index value.
    pub fn new(index: u16) -> Self {
        VocIndex(U16::new(index))
    }

    /// The "value not known" encoding.
    pub fn not_known() -> Self {
        VocIndex(U16::new(Self::RAW_NOT_KNOWN))
    }

    /// Returns the index, or `None` when the value is not known.
    pub fn value(&self) -> Option<u16> {
        if self.is_known() {
            Some(self.0.get())
        } else {
            None
        }
    }

    /// Returns whether a value is present.
    pub fn is_known(&self) -> bool {
        self.0.get() != Self::RAW_NOT_KNOWN
    }
}

impl Default for VocIndex {
    fn default() -> Self {
        Self::not_known()
    }
}

impl fmt::Debug for VocIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.value() {
            Some(v) => write!(f, "{}", v),
            None => f.write_str("(not known)"),
        }
    }
}

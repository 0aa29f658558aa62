//! Attribute serving layer for a BLE fan-control peripheral.
//!
//! This crate hosts the GATT-facing surface of a filtration controller: it decodes
//! incoming attribute writes, tracks which connections subscribed to notifications,
//! dispatches reads and writes for the fan service's characteristics, and runs the
//! control loop that decides the commanded fan power (manual override vs. the
//! environmental policy).
//!
//! The crate is runtime and hardware-agnostic. The pieces that touch a platform are
//! expressed as traits the integration layer implements once:
//!
//! * A [`NotificationSender`] wrapping the BLE stack's request-to-send-notification
//!   and cancel primitives.
//! * A [`FanPwm`] that programs the fan's duty cycle.
//! * A [`Tachometer`] exposing a tear-free read of the latest measured speed.
//! * A [`Timer`] with millisecond resolution driving the periodic ticks.
//!
//! The stack's attribute read/write events are forwarded to [`gatt::Service`]
//! implementations; its disconnect event must be wired to
//! [`gatt::Service::disconnected`] so no pending notification request can outlive
//! the link it was queued for.
//!
//! [`NotificationSender`]: notify::NotificationSender
//! [`FanPwm`]: hw::FanPwm
//! [`Tachometer`]: hw::Tachometer
//! [`Timer`]: time::Timer

// We're `#[no_std]`, except when we're testing
#![cfg_attr(not(test), no_std)]
// Deny a few warnings in doctests, since rustdoc `allow`s many warnings by default
#![doc(test(attr(deny(unused_imports, unused_must_use))))]
#![warn(rust_2018_idioms)]

#[macro_use]
mod log;
#[macro_use]
mod utils;
pub mod att;
pub mod bytes;
mod error;
pub mod gatt;
pub mod hw;
pub mod notify;
pub mod policy;
pub mod time;
pub mod units;

pub use self::error::Error;

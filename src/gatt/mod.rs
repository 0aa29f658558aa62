//! Service-side plumbing shared by every characteristic handler.

pub mod fan;

use crate::att::{ConnHandle, ErrorCode, Handle};
use crate::notify::NotificationSender;
use bitflags::bitflags;
use core::cmp;

bitflags! {
    /// Bits of the 16-bit client characteristic configuration descriptor.
    pub struct ClientConfig: u16 {
        const NOTIFY = 0x0001;
        const INDICATE = 0x0002;
    }
}

/// Value served for a server characteristic configuration descriptor: broadcasts are always
/// enabled and the descriptor is read-only.
pub const SERVER_CONFIG_BROADCAST: u16 = 0x0001;

/// Copies the sub-range of `blob` starting at `offset` into `buffer`.
///
/// The protocol lets a read request any sub-range of a value, not just byte 0 onward, so every
/// read case funnels through this one primitive: serialize the value, then slice. Returns the
/// number of bytes copied, which is `0` when `offset` lies at or past the end of the value and
/// is truncated to the buffer's capacity otherwise.
pub fn read_blob(blob: &[u8], offset: u16, buffer: &mut [u8]) -> usize {
    let offset = usize::from(offset);
    if offset >= blob.len() {
        return 0;
    }

    let n = cmp::min(blob.len() - offset, buffer.len());
    buffer[..n].copy_from_slice(&blob[offset..offset + n]);
    n
}

/// One GATT service's protocol entry points.
///
/// Both dispatch methods return `None` when the attribute is not recognized by the service, so
/// a composed dispatcher can try each service in turn until one claims the handle.
pub trait Service<S: NotificationSender> {
    /// Handles an attribute read event.
    ///
    /// Returns the number of bytes written to `buffer`. Reads only serialize already-valid
    /// in-memory state and therefore cannot fail.
    fn attr_read(
        &mut self,
        conn: ConnHandle,
        handle: Handle,
        offset: u16,
        buffer: &mut [u8],
    ) -> Option<usize>;

    /// Handles an attribute write event.
    ///
    /// A malformed payload aborts the whole write with the status to report to the peer; the
    /// service's state is only updated after the payload decoded completely.
    fn attr_write(
        &mut self,
        stack: &mut S,
        conn: ConnHandle,
        handle: Handle,
        offset: u16,
        payload: &[u8],
    ) -> Option<Result<(), ErrorCode>>;

    /// Tears down all per-connection state for `conn`.
    ///
    /// The integration layer must call this from the stack's disconnect hook, before the
    /// link's resources are reclaimed.
    fn disconnected(&mut self, stack: &mut S, conn: ConnHandle);
}

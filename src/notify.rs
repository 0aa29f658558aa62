//! Per-characteristic tracking of which connections subscribed to notifications.
//!
//! Each notifiable characteristic owns one [`NotificationRegistry`]: a fixed-capacity table
//! with one slot per possible concurrent connection. Subscribing claims a slot, unsubscribing
//! releases it (cancelling any notification request still queued against it), and
//! [`notify_all`] asks the stack to push the characteristic's current value to every bound
//! connection. The table never allocates and never grows.
//!
//! [`notify_all`]: NotificationRegistry::notify_all

use crate::att::ConnHandle;
use crate::bytes::WriteCursor;
use crate::gatt::ClientConfig;
use crate::Error;
use zerocopy::byteorder::{LittleEndian, U16};

/// Number of concurrent connections the device is provisioned for.
///
/// Registry capacity defaults to this, so a subscribe can only fail if the stack accepts more
/// links than the build was sized for.
pub const MAX_CONNECTIONS: usize = 4;

/// The BLE stack's asynchronous notification machinery.
///
/// Sending a notification is a two-step affair: the serving layer *requests* a send here and
/// returns immediately; once the stack can transmit, it invokes the callback it was handed,
/// which serializes the characteristic's current value and performs the actual send.
pub trait NotificationSender {
    /// Opaque per-slot registration record.
    ///
    /// The stack owns this record's meaning — typically it is threaded into an intrusive list
    /// of pending send requests. The registry keeps one per slot and guarantees it stays in
    /// place for as long as the slot is bound.
    type Registration: Default;

    /// Enqueues an asynchronous request to notify `conn`.
    ///
    /// Must not block. A request for a registration that is already queued must coalesce into
    /// the existing one: the peer receives the value current at send time, not one delivery
    /// per request.
    fn request_to_send(
        &mut self,
        registration: &mut Self::Registration,
        conn: ConnHandle,
        on_ready: fn(ConnHandle),
    );

    /// Removes any queued send request for `registration`.
    ///
    /// Must be a no-op when nothing is queued.
    fn cancel_request(&mut self, registration: &mut Self::Registration, conn: ConnHandle);
}

struct Slot<R> {
    /// Bound connection; `ConnHandle::INVALID` marks the slot as empty.
    conn: ConnHandle,
    registration: R,
}

/// Fixed-capacity subscription table for one notifiable characteristic.
///
/// At most one slot is ever bound per connection, which also bounds the number of outstanding
/// send requests to one per connection: a second [`notify_all`] before the first request was
/// serviced re-requests through the same registration and coalesces in the stack.
///
/// [`notify_all`]: NotificationRegistry::notify_all
pub struct NotificationRegistry<S: NotificationSender, const N: usize = MAX_CONNECTIONS> {
    slots: [Slot<S::Registration>; N],
    on_ready: fn(ConnHandle),
}

impl<S: NotificationSender, const N: usize> NotificationRegistry<S, N> {
    /// Creates an empty registry.
    ///
    /// `on_ready` is the characteristic's serialize-and-send path; it is captured once here
    /// and handed to the stack with every send request.
    pub fn new(on_ready: fn(ConnHandle)) -> Self {
        NotificationRegistry {
            slots: core::array::from_fn(|_| Slot {
                conn: ConnHandle::INVALID,
                registration: S::Registration::default(),
            }),
            on_ready,
        }
    }

    /// Returns whether `conn` currently has notifications enabled.
    pub fn is_subscribed(&self, conn: ConnHandle) -> bool {
        self.slots.iter().any(|slot| slot.conn == conn)
    }

    /// Binds `conn` to a free slot.
    ///
    /// Returns `false` without touching the table when `conn` is already subscribed, or when
    /// every slot is taken. The latter cannot happen while capacity matches the connection
    /// limit, but a mis-sized build degrades to dropped subscriptions rather than corrupted
    /// state.
    pub fn subscribe(&mut self, conn: ConnHandle) -> bool {
        if self.is_subscribed(conn) {
            return false;
        }

        match self.slots.iter_mut().find(|slot| !slot.conn.is_valid()) {
            Some(slot) => {
                debug!("notify subscribe {:?}", conn);
                slot.conn = conn;
                true
            }
            None => {
                warn!("subscription table full; dropping subscribe from {:?}", conn);
                false
            }
        }
    }

    /// Releases the slot bound to `conn`, if any.
    ///
    /// Any notification request still queued against the slot is cancelled first, so the stack
    /// is never left holding a request for a slot that has been reused or freed. Returns
    /// `false` when `conn` was not subscribed; calling this repeatedly is harmless.
    pub fn unsubscribe(&mut self, stack: &mut S, conn: ConnHandle) -> bool {
        match self.slots.iter_mut().find(|slot| slot.conn == conn) {
            Some(slot) => {
                debug!("notify unsubscribe {:?}", conn);
                stack.cancel_request(&mut slot.registration, conn);
                slot.conn = ConnHandle::INVALID;
                true
            }
            None => false,
        }
    }

    /// Requests a notification send to every subscribed connection.
    ///
    /// Only enqueues; transmission happens on a later turn of the event loop, per connection,
    /// in no particular order. Safe to call with no subscribers.
    pub fn notify_all(&mut self, stack: &mut S) {
        let on_ready = self.on_ready;
        for slot in self.slots.iter_mut().filter(|slot| slot.conn.is_valid()) {
            stack.request_to_send(&mut slot.registration, slot.conn, on_ready);
        }
    }

    /// Serves a read of the client characteristic configuration descriptor.
    pub fn client_configuration(&self, conn: ConnHandle) -> u16 {
        if self.is_subscribed(conn) {
            ClientConfig::NOTIFY.bits()
        } else {
            0
        }
    }

    /// Serves a write of the client characteristic configuration descriptor.
    ///
    /// The payload must be exactly the 16-bit descriptor value; the notify bit decides between
    /// subscribe and unsubscribe. Indications are not offered, so their bit is ignored.
    pub fn write_client_configuration(
        &mut self,
        stack: &mut S,
        conn: ConnHandle,
        cursor: &mut WriteCursor<'_>,
    ) -> Result<(), Error> {
        let raw: U16<LittleEndian> = cursor.consume()?;
        if cursor.remaining() != 0 {
            return Err(Error::InvalidLength);
        }

        if ClientConfig::from_bits_truncate(raw.get()).contains(ClientConfig::NOTIFY) {
            self.subscribe(conn);
        } else {
            self.unsubscribe(stack, conn);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Mirrors the stack's pending-request bookkeeping: a registration is "queued" until the
    /// stack would service it, and re-requesting a queued registration coalesces.
    #[derive(Default)]
    struct MockStack {
        enqueued: Vec<ConnHandle>,
        cancelled: Vec<ConnHandle>,
    }

    impl NotificationSender for MockStack {
        type Registration = bool;

        fn request_to_send(
            &mut self,
            registration: &mut bool,
            conn: ConnHandle,
            _on_ready: fn(ConnHandle),
        ) {
            if !*registration {
                *registration = true;
                self.enqueued.push(conn);
            }
        }

        fn cancel_request(&mut self, registration: &mut bool, conn: ConnHandle) {
            if *registration {
                *registration = false;
                self.cancelled.push(conn);
            }
        }
    }

    fn ignore(_: ConnHandle) {}

    const A: ConnHandle = ConnHandle::from_raw(0x0040);
    const B: ConnHandle = ConnHandle::from_raw(0x0041);
    const C: ConnHandle = ConnHandle::from_raw(0x0042);

    #[test]
    fn subscribe_is_deduplicated() {
        let mut reg = NotificationRegistry::<MockStack, 2>::new(ignore);
        assert!(reg.subscribe(A));
        assert!(!reg.subscribe(A));
        assert!(reg.is_subscribed(A));

        // Still exactly one slot bound to A: the second slot remains free for B.
        assert!(reg.subscribe(B));
        assert!(reg.is_subscribed(B));
    }

    #[test]
    fn subscribe_beyond_capacity_fails_closed() {
        let mut reg = NotificationRegistry::<MockStack, 2>::new(ignore);
        assert!(reg.subscribe(A));
        assert!(reg.subscribe(B));
        assert!(!reg.subscribe(C));
        assert!(reg.is_subscribed(A));
        assert!(reg.is_subscribed(B));
        assert!(!reg.is_subscribed(C));
    }

    #[test]
    fn unsubscribe_is_idempotent() {
        let mut stack = MockStack::default();
        let mut reg = NotificationRegistry::<MockStack, 2>::new(ignore);
        reg.subscribe(A);
        assert!(reg.unsubscribe(&mut stack, A));
        assert!(!reg.unsubscribe(&mut stack, A));
        assert!(!reg.is_subscribed(A));
    }

    #[test]
    fn unsubscribe_cancels_pending_request() {
        let mut stack = MockStack::default();
        let mut reg = NotificationRegistry::<MockStack, 2>::new(ignore);
        reg.subscribe(A);
        reg.notify_all(&mut stack);
        assert_eq!(stack.enqueued, [A]);

        reg.unsubscribe(&mut stack, A);
        assert_eq!(stack.cancelled, [A]);
    }

    #[test]
    fn notify_all_reaches_every_subscriber_once() {
        let mut stack = MockStack::default();
        let mut reg = NotificationRegistry::<MockStack, 4>::new(ignore);

        // No subscribers: nothing to enqueue.
        reg.notify_all(&mut stack);
        assert!(stack.enqueued.is_empty());

        reg.subscribe(A);
        reg.subscribe(B);
        reg.notify_all(&mut stack);
        assert_eq!(stack.enqueued, [A, B]);

        // A second round before the first was serviced coalesces per connection.
        reg.notify_all(&mut stack);
        assert_eq!(stack.enqueued, [A, B]);
    }

    #[test]
    fn client_configuration_roundtrip() {
        let mut stack = MockStack::default();
        let mut reg = NotificationRegistry::<MockStack, 2>::new(ignore);
        assert_eq!(reg.client_configuration(A), 0);

        let payload = 0x0001u16.to_le_bytes();
        let mut cursor = WriteCursor::new(&payload, 0);
        assert_eq!(reg.write_client_configuration(&mut stack, A, &mut cursor), Ok(()));
        assert!(reg.is_subscribed(A));
        assert_eq!(reg.client_configuration(A), 1);

        let payload = 0x0000u16.to_le_bytes();
        let mut cursor = WriteCursor::new(&payload, 0);
        assert_eq!(reg.write_client_configuration(&mut stack, A, &mut cursor), Ok(()));
        assert!(!reg.is_subscribed(A));
    }

    #[test]
    fn client_configuration_write_must_be_exact() {
        let mut stack = MockStack::default();
        let mut reg = NotificationRegistry::<MockStack, 2>::new(ignore);

        let mut cursor = WriteCursor::new(&[0x01], 0);
        assert_eq!(
            reg.write_client_configuration(&mut stack, A, &mut cursor),
            Err(Error::InvalidLength)
        );
        assert!(!reg.is_subscribed(A));

        let mut cursor = WriteCursor::new(&[0x01, 0x00, 0x00], 0);
        assert_eq!(
            reg.write_client_configuration(&mut stack, A, &mut cursor),
            Err(Error::InvalidLength)
        );
        assert!(!reg.is_subscribed(A));
    }
}

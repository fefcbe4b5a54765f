//! Sign-out handler slot and its registration guard.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

/// Callback invoked when the session cannot be recovered.
///
/// Called synchronously at the decision point; anything slow should be
/// spawned by the handler itself.
pub type SignOutHandler = Arc<dyn Fn() + Send + Sync>;

type Slot = Mutex<Option<(u64, SignOutHandler)>>;

/// Holds at most one active handler. Installing a new one replaces the old.
#[derive(Default)]
pub(crate) struct SignOutSlot {
    active: Arc<Slot>,
    next_id: AtomicU64,
}

impl SignOutSlot {
    pub(crate) fn install(&self, handler: SignOutHandler) -> SignOutRegistration {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        *self.active.lock() = Some((id, handler));
        SignOutRegistration {
            slot: Arc::downgrade(&self.active),
            id,
        }
    }

    pub(crate) fn current(&self) -> Option<SignOutHandler> {
        self.active.lock().as_ref().map(|(_, handler)| Arc::clone(handler))
    }

    /// Runs the handler, if any, outside the slot lock so it may call back
    /// into the client.
    pub(crate) fn invoke(&self) -> bool {
        self.current().is_some_and(|handler| {
            handler();
            true
        })
    }
}

impl std::fmt::Debug for SignOutSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignOutSlot")
            .field("installed", &self.active.lock().is_some())
            .finish()
    }
}

/// Keeps a sign-out handler (and with it, refresh-on-401) installed.
///
/// Dropping the registration removes the handler, unless a newer one has
/// replaced it in the meantime.
#[must_use = "dropping the registration removes the sign-out handler"]
#[derive(Debug)]
pub struct SignOutRegistration {
    slot: Weak<Slot>,
    id: u64,
}

impl SignOutRegistration {
    /// Removes the handler now.
    pub fn unregister(self) {}
}

impl Drop for SignOutRegistration {
    fn drop(&mut self) {
        if let Some(slot) = self.slot.upgrade() {
            let mut active = slot.lock();
            if active.as_ref().is_some_and(|(id, _)| *id == self.id) {
                *active = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counting(counter: &Arc<AtomicUsize>) -> SignOutHandler {
        let counter = Arc::clone(counter);
        Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_unregister_removes_handler() {
        let slot = SignOutSlot::default();
        let calls = Arc::new(AtomicUsize::new(0));

        let registration = slot.install(counting(&calls));
        assert!(slot.invoke());
        registration.unregister();
        assert!(!slot.invoke());

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_stale_registration_keeps_newer_handler() {
        let slot = SignOutSlot::default();
        let first_calls = Arc::new(AtomicUsize::new(0));
        let second_calls = Arc::new(AtomicUsize::new(0));

        let first = slot.install(counting(&first_calls));
        let _second = slot.install(counting(&second_calls));
        drop(first);

        assert!(slot.invoke());
        assert_eq!(first_calls.load(Ordering::SeqCst), 0);
        assert_eq!(second_calls.load(Ordering::SeqCst), 1);
    }
}

//! Listener registry for field and form status changes.
//!
//! A listener is identified by its `Rc` pointer, so registering the same listener twice for a
//! target keeps a single entry and one `unsubscribe` removes it. Notification iterates over a
//! snapshot: a listener removed during a round still runs in that round, one added during a
//! round waits for the next.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};

use tracing::warn;

use super::controller::FieldKey;

pub type Listener = Rc<dyn Fn()>;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub(super) enum ListenTarget {
    Field(FieldKey),
    Status,
}

#[derive(Default)]
pub(super) struct ListenerRegistry {
    entries: BTreeMap<ListenTarget, Vec<Listener>>,
}

impl ListenerRegistry {
    pub(super) fn add(&mut self, targets: &[ListenTarget], listener: &Listener) {
        for target in targets {
            let listeners = self.entries.entry(*target).or_default();
            if !listeners.iter().any(|known| Rc::ptr_eq(known, listener)) {
                listeners.push(listener.clone());
            }
        }
    }

    pub(super) fn remove(&mut self, targets: &[ListenTarget], listener: &Listener) {
        for target in targets {
            if let Some(listeners) = self.entries.get_mut(target) {
                listeners.retain(|known| !Rc::ptr_eq(known, listener));
                if listeners.is_empty() {
                    self.entries.remove(target);
                }
            }
        }
    }

    pub(super) fn snapshot(&self, target: ListenTarget) -> Vec<Listener> {
        self.entries.get(&target).cloned().unwrap_or_default()
    }

    #[cfg(test)]
    pub(super) fn len(&self, target: ListenTarget) -> usize {
        self.entries.get(&target).map_or(0, Vec::len)
    }
}

/// Registration returned by `listen_fields` / `listen_form_status`.
///
/// Dropping it keeps the listener registered; call [`Subscription::unsubscribe`].
#[must_use = "keep the subscription to be able to unsubscribe"]
pub struct Subscription {
    registry: Weak<RefCell<ListenerRegistry>>,
    listener: Listener,
    targets: Vec<ListenTarget>,
}

impl Subscription {
    pub(super) fn new(
        registry: Weak<RefCell<ListenerRegistry>>,
        listener: Listener,
        targets: Vec<ListenTarget>,
    ) -> Self {
        Self {
            registry,
            listener,
            targets,
        }
    }

    /// Safe to call repeatedly and from inside a listener.
    pub fn unsubscribe(&self) {
        let Some(registry) = self.registry.upgrade() else {
            return;
        };
        if let Ok(mut registry) = registry.try_borrow_mut() {
            registry.remove(&self.targets, &self.listener);
        } else {
            warn!("listener registry busy; unsubscribe skipped");
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("targets", &self.targets)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn same_listener_registers_once() {
        let registry = Rc::new(RefCell::new(ListenerRegistry::default()));
        let target = ListenTarget::Field(FieldKey::new("email"));
        let listener: Listener = Rc::new(|| {});

        registry.borrow_mut().add(&[target], &listener);
        registry.borrow_mut().add(&[target], &listener);
        assert_eq!(registry.borrow().len(target), 1);

        let subscription = Subscription::new(Rc::downgrade(&registry), listener, vec![target]);
        subscription.unsubscribe();
        subscription.unsubscribe();
        assert_eq!(registry.borrow().len(target), 0);
    }

    #[test]
    fn snapshot_survives_removal_mid_round() {
        let registry = Rc::new(RefCell::new(ListenerRegistry::default()));
        let target = ListenTarget::Status;
        let calls = Rc::new(Cell::new(0));

        let first: Listener = {
            let calls = calls.clone();
            Rc::new(move || calls.set(calls.get() + 1))
        };
        let second = first.clone();
        let other: Listener = {
            let calls = calls.clone();
            Rc::new(move || calls.set(calls.get() + 10))
        };
        registry.borrow_mut().add(&[target], &first);
        registry.borrow_mut().add(&[target], &other);

        let snapshot = registry.borrow().snapshot(target);
        registry.borrow_mut().remove(&[target], &second);
        for listener in snapshot {
            listener();
        }
        assert_eq!(calls.get(), 11);
        assert_eq!(registry.borrow().len(target), 1);
    }
}

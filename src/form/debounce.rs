use std::collections::BTreeMap;
use std::time::Duration;

use futures::future::{AbortHandle, Abortable};
use futures_timer::Delay;
use tracing::{debug, warn};

use super::controller::{FieldKey, FormController, FormResult, read_cell, write_cell};
use super::validation::ValidationError;

/// One pending delayed validation per field.
#[derive(Default)]
pub(super) struct DebounceSlots {
    slots: BTreeMap<FieldKey, AbortHandle>,
}

impl DebounceSlots {
    /// Aborts the pending call for `key`. Returns whether one was pending.
    pub(super) fn cancel(&mut self, key: FieldKey) -> bool {
        match self.slots.remove(&key) {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    pub(super) fn replace(&mut self, key: FieldKey, handle: AbortHandle) {
        if let Some(previous) = self.slots.insert(key, handle) {
            previous.abort();
        }
    }

    pub(super) fn is_pending(&self, key: FieldKey) -> bool {
        self.slots.contains_key(&key)
    }
}

impl<T, E> FormController<T, E>
where
    T: Clone + 'static,
    E: ValidationError,
{
    pub(super) fn schedule_validation(&self, key: FieldKey, delay: Duration) -> FormResult<()> {
        let (handle, registration) = AbortHandle::new_pair();
        let form = self.clone();
        let task = Abortable::new(
            async move {
                Delay::new(delay).await;
                form.fire_debounced(key);
            },
            registration,
        );
        write_cell(&self.debounce, "scheduling debounced validation")?.replace(key, handle);
        self.spawn(async move {
            let _ = task.await;
        })
    }

    fn fire_debounced(&self, key: FieldKey) {
        let mounted = match self.is_mounted(key) {
            Ok(mounted) => mounted,
            Err(error) => {
                warn!(form = self.id.0, field = %key, %error, "debounced validation dropped");
                return;
            }
        };
        if !mounted {
            debug!(form = self.id.0, field = %key, "debounce fired for unmounted field");
            if let Ok(mut slots) = write_cell(&self.debounce, "clearing debounce slot") {
                slots.cancel(key);
            }
            return;
        }

        debug!(form = self.id.0, field = %key, "debounce fired");
        if let Err(error) = self.run_validation(key) {
            warn!(form = self.id.0, field = %key, %error, "debounced validation failed to run");
        }
    }

    /// Whether a debounced validation is waiting for its timer.
    pub fn is_debounce_pending(&self, key: FieldKey) -> FormResult<bool> {
        Ok(read_cell(&self.debounce, "reading debounce slots")?.is_pending(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_is_idempotent() {
        let key = FieldKey::new("code");
        let mut slots = DebounceSlots::default();
        let (handle, registration) = AbortHandle::new_pair();
        slots.replace(key, handle);

        assert!(slots.cancel(key));
        assert!(!slots.cancel(key));
        assert!(!slots.is_pending(key));

        let aborted = Abortable::new(async {}, registration);
        assert!(aborted.is_aborted());
    }

    #[test]
    fn replacing_a_slot_aborts_the_previous_call() {
        let key = FieldKey::new("code");
        let mut slots = DebounceSlots::default();
        let (first, first_registration) = AbortHandle::new_pair();
        let (second, second_registration) = AbortHandle::new_pair();
        slots.replace(key, first);
        slots.replace(key, second);

        assert!(Abortable::new(async {}, first_registration).is_aborted());
        assert!(!Abortable::new(async {}, second_registration).is_aborted());
        assert!(slots.is_pending(key));
    }
}

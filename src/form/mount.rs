use std::collections::BTreeMap;
use std::rc::Rc;

use tracing::warn;

use super::controller::{FieldKey, FormController, FormResult, write_cell};
use super::validation::ValidationError;

pub type FocusHandler = Rc<dyn Fn()>;

struct MountEntry {
    id: u64,
    focus: FocusHandler,
}

#[derive(Default)]
pub(super) struct MountMap {
    next_id: u64,
    entries: BTreeMap<FieldKey, MountEntry>,
}

impl MountMap {
    /// Returns the new mount id and whether another consumer was already active.
    pub(super) fn mount(&mut self, key: FieldKey, focus: FocusHandler) -> (u64, bool) {
        self.next_id += 1;
        let id = self.next_id;
        let replaced = self
            .entries
            .insert(key, MountEntry { id, focus })
            .is_some();
        (id, replaced)
    }

    /// Only the consumer that currently owns `key` can unmount it.
    pub(super) fn unmount(&mut self, key: FieldKey, id: u64) -> bool {
        if self.entries.get(&key).is_some_and(|entry| entry.id == id) {
            self.entries.remove(&key);
            true
        } else {
            false
        }
    }

    pub(super) fn is_mounted(&self, key: FieldKey) -> bool {
        self.entries.contains_key(&key)
    }

    pub(super) fn focus_handler(&self, key: FieldKey) -> Option<FocusHandler> {
        self.entries.get(&key).map(|entry| entry.focus.clone())
    }
}

/// Keeps a field mounted for as long as it lives.
#[must_use = "dropping the guard unmounts the field"]
pub struct FieldMount<T, E>
where
    T: Clone + 'static,
    E: ValidationError,
{
    form: FormController<T, E>,
    key: FieldKey,
    id: u64,
}

impl<T, E> FieldMount<T, E>
where
    T: Clone + 'static,
    E: ValidationError,
{
    pub fn key(&self) -> FieldKey {
        self.key
    }

    pub fn unmount(self) {
        drop(self);
    }
}

impl<T, E> Drop for FieldMount<T, E>
where
    T: Clone + 'static,
    E: ValidationError,
{
    fn drop(&mut self) {
        match write_cell(&self.form.mounts, "unmounting field") {
            Ok(mut mounts) => {
                mounts.unmount(self.key, self.id);
            }
            Err(error) => warn!(
                form = self.form.id.0,
                field = %self.key,
                %error,
                "field left mounted"
            ),
        }
    }
}

impl<T, E> FormController<T, E>
where
    T: Clone + 'static,
    E: ValidationError,
{
    /// Marks `key` as presented and registers its focus handle.
    pub fn mount_field(
        &self,
        key: FieldKey,
        focus: impl Fn() + 'static,
    ) -> FormResult<FieldMount<T, E>> {
        self.field_entry(key)?;
        let (id, replaced) =
            write_cell(&self.mounts, "mounting field")?.mount(key, Rc::new(focus));
        if replaced {
            warn!(
                form = self.id.0,
                field = %key,
                "field mounted by more than one consumer; the latest one takes over"
            );
        }
        Ok(FieldMount {
            form: self.clone(),
            key,
            id,
        })
    }

    /// Mounted keys in declaration order.
    pub fn mounted_field_keys(&self) -> FormResult<Vec<FieldKey>> {
        let keys = self.field_keys()?;
        let mut mounted = Vec::with_capacity(keys.len());
        for key in keys {
            if self.is_mounted(key)? {
                mounted.push(key);
            }
        }
        Ok(mounted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stale_mount_cannot_unmount_newer_consumer() {
        let key = FieldKey::new("email");
        let mut mounts = MountMap::default();
        let (first, replaced) = mounts.mount(key, Rc::new(|| {}));
        assert!(!replaced);
        let (second, replaced) = mounts.mount(key, Rc::new(|| {}));
        assert!(replaced);

        assert!(!mounts.unmount(key, first));
        assert!(mounts.is_mounted(key));
        assert!(mounts.unmount(key, second));
        assert!(!mounts.is_mounted(key));
        assert!(mounts.focus_handler(key).is_none());
    }
}

use tracing::debug;

use super::controller::{FieldKey, FormController, FormResult, FormStatus, Validity, write_cell};
use super::listeners::Subscription;
use super::mount::FieldMount;
use super::strategy::{FeedbackTrigger, FieldState};
use super::validation::{FieldLens, ValidationError};

/// What a presentation consumer of one field talks to.
pub struct FieldBinding<T, L, E>
where
    T: Clone + 'static,
    L: FieldLens<T>,
    E: ValidationError,
{
    form: FormController<T, E>,
    lens: L,
}

impl<T, L, E> Clone for FieldBinding<T, L, E>
where
    T: Clone + 'static,
    L: FieldLens<T>,
    E: ValidationError,
{
    fn clone(&self) -> Self {
        Self {
            form: self.form.clone(),
            lens: self.lens,
        }
    }
}

impl<T, L, E> FieldBinding<T, L, E>
where
    T: Clone + 'static,
    L: FieldLens<T>,
    E: ValidationError,
{
    pub fn key(&self) -> FieldKey {
        self.lens.key()
    }

    pub fn mount(&self, focus: impl Fn() + 'static) -> FormResult<FieldMount<T, E>> {
        self.form.mount_field(self.key(), focus)
    }

    pub fn state(&self) -> FormResult<FieldState<L::Value, E>> {
        self.form.field_state(self.lens)
    }

    pub fn change(&self, value: L::Value) -> FormResult<()> {
        self.form.set_value_from_edit(self.lens, value)
    }

    pub fn blur(&self) -> FormResult<()> {
        self.form.blur_field(self.key())
    }

    pub fn focus(&self) -> FormResult<()> {
        self.form.focus_field(self.key())
    }

    pub fn subscribe(&self, listener: impl Fn() + 'static) -> FormResult<Subscription> {
        self.form.listen_fields(&[self.key()], listener)
    }
}

impl<T, E> FormController<T, E>
where
    T: Clone + 'static,
    E: ValidationError,
{
    pub fn bind<L>(&self, lens: L) -> FieldBinding<T, L, E>
    where
        L: FieldLens<T>,
    {
        FieldBinding {
            form: self.clone(),
            lens,
        }
    }

    /// The edit path: stores `value`, lets an `OnChange` field speak, then validates right
    /// away or after the field's debounce interval.
    pub fn set_value_from_edit<L>(&self, lens: L, value: L::Value) -> FormResult<()>
    where
        L: FieldLens<T>,
    {
        let key = lens.key();
        let field = self.field_entry(key)?;
        lens.set(
            &mut write_cell(&self.state, "writing edited value")?.model,
            value,
        );
        self.reveal_on(key, FeedbackTrigger::Change)?;
        self.mark_editing()?;
        write_cell(&self.debounce, "clearing debounce on edit")?.cancel(key);

        let interval = self.debounce_for(field.as_ref());
        if interval.is_zero() {
            self.notify_field(key)?;
            let _ = self.run_validation(key)?;
            return Ok(());
        }

        self.update_meta(key, |meta| meta.validity = Validity::Validating)?;
        self.notify_field(key)?;
        self.schedule_validation(key, interval)
    }

    /// The blur path: a silent field that already has a known validity gets one chance to
    /// speak, gated by its strategy, and is revalidated.
    pub fn blur_field(&self, key: FieldKey) -> FormResult<()> {
        let meta = self.field_meta(key)?;
        if meta.talkative || matches!(meta.validity, Validity::Unknown) {
            return Ok(());
        }
        debug!(form = self.id.0, field = %key, "revalidating on blur");
        self.reveal_on(key, FeedbackTrigger::Blur)?;
        let _ = self.run_validation(key)?;
        Ok(())
    }

    fn mark_editing(&self) -> FormResult<()> {
        match self.form_status()? {
            FormStatus::Untouched | FormStatus::Submitted => self.set_status(FormStatus::Editing),
            FormStatus::Editing | FormStatus::Submitting => Ok(()),
        }
    }
}

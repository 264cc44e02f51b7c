use std::any::Any;
use std::fmt::{Debug, Formatter};
use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use futures::channel::oneshot;
use futures::future::LocalBoxFuture;
use tracing::{debug, warn};

use super::controller::{
    FieldKey, FormController, FormResult, Validity, read_cell, write_cell,
};
use super::strategy::{FeedbackTrigger, FieldState};

pub trait ValidationError: Clone + 'static {
    fn message(&self) -> String;
}

impl ValidationError for String {
    fn message(&self) -> String {
        self.clone()
    }
}

impl ValidationError for &'static str {
    fn message(&self) -> String {
        (*self).to_owned()
    }
}

pub trait FieldLens<T>: Copy + 'static {
    type Value: Clone + PartialEq + 'static;

    fn key(self) -> FieldKey;
    fn get<'a>(self, model: &'a T) -> &'a Self::Value;
    fn set(self, model: &mut T, value: Self::Value);
}

pub trait FormModel: Clone + 'static {
    type Fields;

    fn fields() -> Self::Fields;
}

/// Outcome of a validator: settled now, or settling later.
pub enum Validation<E> {
    Ready(Result<(), E>),
    Pending(LocalBoxFuture<'static, Result<(), E>>),
}

impl<E: 'static> Validation<E> {
    pub fn valid() -> Self {
        Self::Ready(Ok(()))
    }

    pub fn invalid(error: E) -> Self {
        Self::Ready(Err(error))
    }

    pub fn pending(future: impl Future<Output = Result<(), E>> + 'static) -> Self {
        Self::Pending(future.boxed_local())
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending(_))
    }

    pub fn ready(self) -> Option<Result<(), E>> {
        match self {
            Self::Ready(result) => Some(result),
            Self::Pending(_) => None,
        }
    }

    pub async fn resolve(self) -> Result<(), E> {
        match self {
            Self::Ready(result) => result,
            Self::Pending(future) => future.await,
        }
    }
}

impl<E> From<Result<(), E>> for Validation<E> {
    fn from(result: Result<(), E>) -> Self {
        Self::Ready(result)
    }
}

impl<E> From<Option<E>> for Validation<E> {
    fn from(error: Option<E>) -> Self {
        Self::Ready(error.map_or(Ok(()), Err))
    }
}

impl<E: Debug> Debug for Validation<E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ready(result) => f.debug_tuple("Ready").field(result).finish(),
            Self::Pending(_) => f.write_str("Pending(..)"),
        }
    }
}

/// Capabilities a validator gets over the rest of the form. Cheap to clone, so async
/// validators can keep it across awaits.
pub struct FieldHelpers<T, E>
where
    T: Clone + 'static,
    E: ValidationError,
{
    form: FormController<T, E>,
}

impl<T, E> Clone for FieldHelpers<T, E>
where
    T: Clone + 'static,
    E: ValidationError,
{
    fn clone(&self) -> Self {
        Self {
            form: self.form.clone(),
        }
    }
}

impl<T, E> FieldHelpers<T, E>
where
    T: Clone + 'static,
    E: ValidationError,
{
    pub(super) fn new(form: FormController<T, E>) -> Self {
        Self { form }
    }

    pub fn focus_field(&self, key: FieldKey) -> FormResult<()> {
        self.form.focus_field(key)
    }

    pub fn field_state<L>(&self, lens: L) -> FormResult<FieldState<L::Value, E>>
    where
        L: FieldLens<T>,
    {
        self.form.field_state(lens)
    }

    pub fn sanitized_field_state<L>(&self, lens: L) -> FormResult<FieldState<L::Value, E>>
    where
        L: FieldLens<T>,
    {
        self.form.sanitized_field_state(lens)
    }
}

impl<T, E> FormController<T, E>
where
    T: Clone + 'static,
    E: ValidationError,
{
    /// Runs the validator of `key` against its sanitized value and records the outcome.
    ///
    /// A pending outcome is settled on the spawner. When it lands, it is applied only if the
    /// field's sanitized value still equals the one that was validated; otherwise it is
    /// dropped without touching state or listeners.
    pub(super) fn run_validation(&self, key: FieldKey) -> FormResult<Validation<E>> {
        let cleared_debounce = write_cell(&self.debounce, "cancelling debounce")?.cancel(key);
        let field = self.field_entry(key)?;
        let snapshot = {
            let state = read_cell(&self.state, "sanitizing field value")?;
            field.sanitized(&state.model)
        };
        let helpers = FieldHelpers::new(self.clone());

        let future = match field.validate(snapshot.as_ref(), &helpers) {
            Validation::Ready(result) => {
                self.apply_validation(key, &result)?;
                return Ok(Validation::Ready(result));
            }
            Validation::Pending(future) => future,
        };

        let (sender, receiver) = oneshot::channel();
        let form = self.clone();
        self.spawn(async move {
            match AssertUnwindSafe(future).catch_unwind().await {
                Ok(result) => {
                    if let Err(error) = form.settle_validation(key, snapshot, &result) {
                        warn!(form = form.id.0, field = %key, %error, "validation result not applied");
                    }
                    let _ = sender.send(result);
                }
                Err(panic) => warn!(
                    form = form.id.0,
                    field = %key,
                    reason = %panic_message(&*panic),
                    "deferred validation failed; field stays validating"
                ),
            }
        })?;

        if !cleared_debounce {
            self.update_meta(key, |meta| meta.validity = Validity::Validating)?;
            self.notify_field(key)?;
        }

        Ok(Validation::pending(async move {
            receiver.await.unwrap_or(Ok(()))
        }))
    }

    fn settle_validation(
        &self,
        key: FieldKey,
        snapshot: Box<dyn Any>,
        result: &Result<(), E>,
    ) -> FormResult<()> {
        let field = self.field_entry(key)?;
        let current = {
            let state = read_cell(&self.state, "re-sanitizing field value")?;
            field.sanitized(&state.model)
        };
        if !field.same_value(snapshot.as_ref(), current.as_ref()) {
            debug!(form = self.id.0, field = %key, "discarding stale validation result");
            return Ok(());
        }
        self.apply_validation(key, result)
    }

    fn apply_validation(&self, key: FieldKey, result: &Result<(), E>) -> FormResult<()> {
        if result.is_ok() {
            self.reveal_on(key, FeedbackTrigger::Success)?;
        }
        self.update_meta(key, |meta| {
            meta.validity = match result {
                Ok(()) => Validity::Valid,
                Err(error) => Validity::Invalid(error.clone()),
            };
        })?;
        self.notify_field(key)
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_owned()
    }
}

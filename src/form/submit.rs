use std::future::Future;

use futures::FutureExt;
use futures::future::{LocalBoxFuture, join_all};
use tracing::{debug, warn};

use super::controller::{FieldKey, FormController, FormResult, FormStatus, read_cell};
use super::validation::{FieldLens, Validation, ValidationError};

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct SubmitOptions {
    pub avoid_focus_on_error: bool,
}

/// What a submit handler leaves behind. The form stays `Submitting` until a pending effect
/// settles.
pub enum SubmitEffect {
    Done,
    Pending(LocalBoxFuture<'static, ()>),
}

impl SubmitEffect {
    pub fn pending(future: impl Future<Output = ()> + 'static) -> Self {
        Self::Pending(future.boxed_local())
    }
}

impl From<()> for SubmitEffect {
    fn from(_: ()) -> Self {
        Self::Done
    }
}

/// Sanitized values of the submitted fields.
#[derive(Clone, Debug)]
pub struct SubmittedValues<T> {
    model: T,
    keys: Vec<FieldKey>,
}

impl<T> SubmittedValues<T> {
    /// `None` when the field was not mounted at submit time.
    pub fn get<L>(&self, lens: L) -> Option<&L::Value>
    where
        L: FieldLens<T>,
    {
        self.contains(lens.key()).then(|| lens.get(&self.model))
    }

    pub fn contains(&self, key: FieldKey) -> bool {
        self.keys.contains(&key)
    }

    pub fn keys(&self) -> &[FieldKey] {
        &self.keys
    }

    /// The model with every submitted field sanitized. Fields that were not submitted hold
    /// their current raw value.
    pub fn into_model(self) -> T {
        self.model
    }
}

/// Validation errors of a failed submit, in declaration order.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FieldErrors<E> {
    entries: Vec<(FieldKey, E)>,
}

impl<E> FieldErrors<E> {
    pub fn get(&self, key: FieldKey) -> Option<&E> {
        self.entries
            .iter()
            .find_map(|(candidate, error)| (*candidate == key).then_some(error))
    }

    pub fn first(&self) -> Option<(FieldKey, &E)> {
        self.entries.first().map(|(key, error)| (*key, error))
    }

    pub fn keys(&self) -> impl Iterator<Item = FieldKey> {
        self.entries.iter().map(|(key, _)| *key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (FieldKey, &E)> {
        self.entries.iter().map(|(key, error)| (*key, error))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

type SuccessHandler<T> = Box<dyn FnOnce(SubmittedValues<T>) -> SubmitEffect>;
type FailureHandler<E> = Box<dyn FnOnce(FieldErrors<E>) -> SubmitEffect>;

struct SubmitRun<T, E> {
    keys: Vec<FieldKey>,
    values: SubmittedValues<T>,
    on_success: SuccessHandler<T>,
    on_failure: FailureHandler<E>,
    focus_on_error: bool,
}

impl<T, E> FormController<T, E>
where
    T: Clone + 'static,
    E: ValidationError,
{
    /// Puts every field back to its initial value, silent and unvalidated.
    pub fn reset_form(&self) -> FormResult<()> {
        for key in self.field_keys()? {
            self.reset_field(key)?;
        }
        self.set_status(FormStatus::Untouched)
    }

    pub fn submit_form<S, R>(&self, on_success: S) -> FormResult<()>
    where
        S: FnOnce(SubmittedValues<T>) -> R + 'static,
        R: Into<SubmitEffect>,
    {
        self.submit_form_with(
            on_success,
            |_errors: FieldErrors<E>| SubmitEffect::Done,
            SubmitOptions::default(),
        )
    }

    /// Validates every mounted field and hands the outcome to `on_success` or `on_failure`.
    ///
    /// Calling it while a submission is in flight does nothing. If the submission cannot be
    /// started, the form goes back to the status it had before and the error is returned.
    pub fn submit_form_with<S, SR, F, FR>(
        &self,
        on_success: S,
        on_failure: F,
        options: SubmitOptions,
    ) -> FormResult<()>
    where
        S: FnOnce(SubmittedValues<T>) -> SR + 'static,
        SR: Into<SubmitEffect>,
        F: FnOnce(FieldErrors<E>) -> FR + 'static,
        FR: Into<SubmitEffect>,
    {
        let previous = self.form_status()?;
        if previous == FormStatus::Submitting {
            debug!(form = self.id.0, "submit ignored; already submitting");
            return Ok(());
        }
        self.set_status(FormStatus::Submitting)?;

        self.run_submit(on_success, on_failure, options)
            .or_else(|error| {
                warn!(form = self.id.0, %error, "submit aborted; restoring form status");
                self.set_status(previous)?;
                Err(error)
            })
    }

    fn run_submit<S, SR, F, FR>(
        &self,
        on_success: S,
        on_failure: F,
        options: SubmitOptions,
    ) -> FormResult<()>
    where
        S: FnOnce(SubmittedValues<T>) -> SR + 'static,
        SR: Into<SubmitEffect>,
        F: FnOnce(FieldErrors<E>) -> FR + 'static,
        FR: Into<SubmitEffect>,
    {
        let keys = self.mounted_field_keys()?;
        let mut model = read_cell(&self.state, "capturing submitted values")?
            .model
            .clone();
        let mut results = Vec::with_capacity(keys.len());
        for key in &keys {
            self.force_talkative(*key)?;
            let field = self.field_entry(*key)?;
            let sanitized = {
                let state = read_cell(&self.state, "sanitizing submitted value")?;
                field.sanitized(&state.model)
            };
            field.assign(&mut model, sanitized);
            results.push(self.run_validation(*key)?);
        }

        let run = SubmitRun {
            values: SubmittedValues {
                model,
                keys: keys.clone(),
            },
            keys,
            on_success: Box::new(move |values: SubmittedValues<T>| -> SubmitEffect {
                on_success(values).into()
            }),
            on_failure: Box::new(move |errors: FieldErrors<E>| -> SubmitEffect {
                on_failure(errors).into()
            }),
            focus_on_error: self.options.focus_first_error_on_submit
                && !options.avoid_focus_on_error,
        };

        if !results.iter().any(Validation::is_pending) {
            let outcomes = results.into_iter().filter_map(Validation::ready).collect();
            return match self.conclude_submit(run, outcomes)? {
                SubmitEffect::Done => self.set_status(FormStatus::Submitted),
                SubmitEffect::Pending(effect) => self.finish_after(effect),
            };
        }

        for key in &run.keys {
            self.notify_field(*key)?;
        }
        let form = self.clone();
        self.spawn(async move {
            let outcomes = join_all(results.into_iter().map(Validation::resolve)).await;
            let effect = match form.conclude_submit(run, outcomes) {
                Ok(effect) => effect,
                Err(error) => {
                    warn!(form = form.id.0, %error, "submit could not be concluded");
                    SubmitEffect::Done
                }
            };
            if let SubmitEffect::Pending(effect) = effect {
                effect.await;
            }
            if let Err(error) = form.set_status(FormStatus::Submitted) {
                warn!(form = form.id.0, %error, "submit status not updated");
            }
        })
    }

    fn conclude_submit(
        &self,
        run: SubmitRun<T, E>,
        outcomes: Vec<Result<(), E>>,
    ) -> FormResult<SubmitEffect> {
        let entries = run
            .keys
            .iter()
            .zip(outcomes)
            .filter_map(|(key, outcome)| outcome.err().map(|error| (*key, error)))
            .collect::<Vec<_>>();
        if entries.is_empty() {
            return Ok((run.on_success)(run.values));
        }

        let errors = FieldErrors { entries };
        if run.focus_on_error {
            if let Some((key, _)) = errors.first() {
                self.focus_field(key)?;
            }
        }
        Ok((run.on_failure)(errors))
    }

    fn finish_after(&self, effect: LocalBoxFuture<'static, ()>) -> FormResult<()> {
        let form = self.clone();
        self.spawn(async move {
            effect.await;
            if let Err(error) = form.set_status(FormStatus::Submitted) {
                warn!(form = form.id.0, %error, "submit status not updated");
            }
        })
    }
}

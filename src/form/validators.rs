//! Combinators over field validators.

use std::rc::Rc;

use super::config::ValidateFn;
use super::validation::{FieldHelpers, Validation, ValidationError};

/// Boxes a validator closure so it can sit next to others in [`combine`].
pub fn validator<T, V, E, F, R>(check: F) -> ValidateFn<T, V, E>
where
    T: Clone + 'static,
    V: 'static,
    E: ValidationError,
    F: Fn(&V, &FieldHelpers<T, E>) -> R + 'static,
    R: Into<Validation<E>>,
{
    Rc::new(move |value: &V, helpers: &FieldHelpers<T, E>| check(value, helpers).into())
}

/// Runs `validators` in order and stops at the first error. A pending validator suspends the
/// chain; the remaining ones run once it settles without error.
pub fn combine<T, V, E>(
    validators: Vec<ValidateFn<T, V, E>>,
) -> impl Fn(&V, &FieldHelpers<T, E>) -> Validation<E> + 'static
where
    T: Clone + 'static,
    V: Clone + 'static,
    E: ValidationError,
{
    let validators: Rc<[ValidateFn<T, V, E>]> = validators.into();
    move |value: &V, helpers: &FieldHelpers<T, E>| run_from(validators.clone(), 0, value, helpers)
}

fn run_from<T, V, E>(
    validators: Rc<[ValidateFn<T, V, E>]>,
    start: usize,
    value: &V,
    helpers: &FieldHelpers<T, E>,
) -> Validation<E>
where
    T: Clone + 'static,
    V: Clone + 'static,
    E: ValidationError,
{
    for index in start..validators.len() {
        match validators[index](value, helpers) {
            Validation::Ready(Ok(())) => {}
            Validation::Ready(Err(error)) => return Validation::invalid(error),
            Validation::Pending(pending) => {
                let value = value.clone();
                let helpers = helpers.clone();
                return Validation::pending(async move {
                    pending.await?;
                    run_from(validators, index + 1, &value, &helpers)
                        .resolve()
                        .await
                });
            }
        }
    }
    Validation::valid()
}

/// Skips `validator` when `is_empty` holds for the value.
pub fn optional<T, V, E, F, R>(
    validator: F,
    is_empty: impl Fn(&V) -> bool + 'static,
) -> impl Fn(&V, &FieldHelpers<T, E>) -> Validation<E> + 'static
where
    T: Clone + 'static,
    V: 'static,
    E: ValidationError,
    F: Fn(&V, &FieldHelpers<T, E>) -> R + 'static,
    R: Into<Validation<E>>,
{
    move |value: &V, helpers: &FieldHelpers<T, E>| {
        if is_empty(value) {
            Validation::valid()
        } else {
            validator(value, helpers).into()
        }
    }
}

/// [`optional`] for text values, where blank counts as empty.
pub fn optional_string<T, V, E, F, R>(
    validator: F,
) -> impl Fn(&V, &FieldHelpers<T, E>) -> Validation<E> + 'static
where
    T: Clone + 'static,
    V: AsRef<str> + 'static,
    E: ValidationError,
    F: Fn(&V, &FieldHelpers<T, E>) -> R + 'static,
    R: Into<Validation<E>>,
{
    optional(validator, |value: &V| value.as_ref().trim().is_empty())
}

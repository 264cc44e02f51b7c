use std::any::Any;
use std::collections::BTreeMap;
use std::rc::Rc;
use std::time::Duration;

use super::controller::{FieldKey, FormError, FormResult};
use super::strategy::ValidationStrategy;
use super::validation::{FieldHelpers, FieldLens, Validation, ValidationError};

type InitialValueFn<V> = Rc<dyn Fn() -> V>;
type EqualsFn<V> = Rc<dyn Fn(&V, &V) -> bool>;
type SanitizeFn<V> = Rc<dyn Fn(&V) -> V>;
pub type ValidateFn<T, V, E> = Rc<dyn Fn(&V, &FieldHelpers<T, E>) -> Validation<E>>;

/// Settings of one field, addressed by its lens.
pub struct FieldConfig<T, L, E>
where
    T: Clone + 'static,
    L: FieldLens<T>,
    E: ValidationError,
{
    lens: L,
    initial_value: Option<InitialValueFn<L::Value>>,
    strategy: Option<ValidationStrategy>,
    debounce: Option<Duration>,
    equals: EqualsFn<L::Value>,
    sanitize: Option<SanitizeFn<L::Value>>,
    validate: Option<ValidateFn<T, L::Value, E>>,
}

impl<T, L, E> FieldConfig<T, L, E>
where
    T: Clone + 'static,
    L: FieldLens<T>,
    E: ValidationError,
{
    pub fn new(lens: L) -> Self {
        Self {
            lens,
            initial_value: None,
            strategy: None,
            debounce: None,
            equals: Rc::new(|left: &L::Value, right: &L::Value| left == right),
            sanitize: None,
            validate: None,
        }
    }

    pub fn initial_value(self, value: L::Value) -> Self {
        self.initial_value_with(move || value.clone())
    }

    pub fn initial_value_with(mut self, supplier: impl Fn() -> L::Value + 'static) -> Self {
        self.initial_value = Some(Rc::new(supplier));
        self
    }

    pub fn strategy(mut self, strategy: ValidationStrategy) -> Self {
        self.strategy = Some(strategy);
        self
    }

    pub fn debounce(mut self, interval: Duration) -> Self {
        self.debounce = Some(interval);
        self
    }

    pub fn debounce_ms(self, interval_ms: u64) -> Self {
        self.debounce(Duration::from_millis(interval_ms))
    }

    /// Equality used to detect stale async results. Defaults to `PartialEq`.
    pub fn equals(mut self, equals: impl Fn(&L::Value, &L::Value) -> bool + 'static) -> Self {
        self.equals = Rc::new(equals);
        self
    }

    pub fn sanitize(mut self, sanitize: impl Fn(&L::Value) -> L::Value + 'static) -> Self {
        self.sanitize = Some(Rc::new(sanitize));
        self
    }

    pub fn validate<F, R>(mut self, validator: F) -> Self
    where
        F: Fn(&L::Value, &FieldHelpers<T, E>) -> R + 'static,
        R: Into<Validation<E>>,
    {
        self.validate = Some(Rc::new(
            move |value: &L::Value, helpers: &FieldHelpers<T, E>| validator(value, helpers).into(),
        ));
        self
    }

    fn sanitize_value(&self, value: &L::Value) -> L::Value {
        match &self.sanitize {
            Some(sanitize) => sanitize(value),
            None => value.clone(),
        }
    }
}

/// Type-erased view of a [`FieldConfig`], so fields of different value types can share one
/// ordered store.
pub(super) trait ErasedField<T, E>
where
    T: Clone + 'static,
    E: ValidationError,
{
    fn key(&self) -> FieldKey;
    fn strategy(&self) -> Option<ValidationStrategy>;
    fn debounce(&self) -> Option<Duration>;
    fn has_validator(&self) -> bool;
    fn initial_value(&self, initial_model: &T) -> Box<dyn Any>;
    fn sanitized(&self, model: &T) -> Box<dyn Any>;
    /// Writes `value` into the model; `false` if it is not this field's value type.
    fn assign(&self, model: &mut T, value: Box<dyn Any>) -> bool;
    fn same_value(&self, left: &dyn Any, right: &dyn Any) -> bool;
    fn validate(&self, sanitized: &dyn Any, helpers: &FieldHelpers<T, E>) -> Validation<E>;
}

impl<T, L, E> ErasedField<T, E> for FieldConfig<T, L, E>
where
    T: Clone + 'static,
    L: FieldLens<T>,
    E: ValidationError,
{
    fn key(&self) -> FieldKey {
        self.lens.key()
    }

    fn strategy(&self) -> Option<ValidationStrategy> {
        self.strategy
    }

    fn debounce(&self) -> Option<Duration> {
        self.debounce
    }

    fn has_validator(&self) -> bool {
        self.validate.is_some()
    }

    fn initial_value(&self, initial_model: &T) -> Box<dyn Any> {
        match &self.initial_value {
            Some(supplier) => Box::new(supplier()),
            None => Box::new(self.lens.get(initial_model).clone()),
        }
    }

    fn sanitized(&self, model: &T) -> Box<dyn Any> {
        Box::new(self.sanitize_value(self.lens.get(model)))
    }

    fn assign(&self, model: &mut T, value: Box<dyn Any>) -> bool {
        match value.downcast::<L::Value>() {
            Ok(value) => {
                self.lens.set(model, *value);
                true
            }
            Err(_) => false,
        }
    }

    fn same_value(&self, left: &dyn Any, right: &dyn Any) -> bool {
        match (
            left.downcast_ref::<L::Value>(),
            right.downcast_ref::<L::Value>(),
        ) {
            (Some(left), Some(right)) => (self.equals)(left, right),
            _ => false,
        }
    }

    fn validate(&self, sanitized: &dyn Any, helpers: &FieldHelpers<T, E>) -> Validation<E> {
        let (Some(validate), Some(value)) =
            (&self.validate, sanitized.downcast_ref::<L::Value>())
        else {
            return Validation::valid();
        };
        validate(value, helpers)
    }
}

/// Field configurations in declaration order.
pub struct FormFields<T, E>
where
    T: Clone + 'static,
    E: ValidationError,
{
    fields: Vec<Rc<dyn ErasedField<T, E>>>,
}

impl<T, E> FormFields<T, E>
where
    T: Clone + 'static,
    E: ValidationError,
{
    pub fn new() -> Self {
        Self { fields: Vec::new() }
    }

    pub fn field<L>(mut self, config: FieldConfig<T, L, E>) -> Self
    where
        L: FieldLens<T>,
    {
        self.push(config);
        self
    }

    pub fn push<L>(&mut self, config: FieldConfig<T, L, E>)
    where
        L: FieldLens<T>,
    {
        self.fields.push(Rc::new(config));
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<T, E> Default for FormFields<T, E>
where
    T: Clone + 'static,
    E: ValidationError,
{
    fn default() -> Self {
        Self::new()
    }
}

pub(super) struct FieldConfigStore<T, E>
where
    T: Clone + 'static,
    E: ValidationError,
{
    order: Vec<Rc<dyn ErasedField<T, E>>>,
    index: BTreeMap<FieldKey, usize>,
}

impl<T, E> FieldConfigStore<T, E>
where
    T: Clone + 'static,
    E: ValidationError,
{
    pub(super) fn build(fields: FormFields<T, E>) -> FormResult<Self> {
        let mut index = BTreeMap::new();
        for (position, field) in fields.fields.iter().enumerate() {
            if index.insert(field.key(), position).is_some() {
                return Err(FormError::DuplicateField(field.key()));
            }
        }
        Ok(Self {
            order: fields.fields,
            index,
        })
    }

    pub(super) fn get(&self, key: FieldKey) -> Option<&Rc<dyn ErasedField<T, E>>> {
        self.index
            .get(&key)
            .and_then(|position| self.order.get(*position))
    }

    pub(super) fn iter(&self) -> impl Iterator<Item = &Rc<dyn ErasedField<T, E>>> {
        self.order.iter()
    }

    pub(super) fn keys(&self) -> Vec<FieldKey> {
        self.order.iter().map(|field| field.key()).collect()
    }
}

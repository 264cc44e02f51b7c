use std::cell::{Ref, RefCell, RefMut};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::future::Future;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures::task::{LocalSpawn, LocalSpawnExt};
use thiserror::Error;
use tracing::debug;

use super::config::{ErasedField, FieldConfigStore, FormFields};
use super::debounce::DebounceSlots;
use super::listeners::{ListenTarget, Listener, ListenerRegistry, Subscription};
use super::mount::MountMap;
use super::strategy::{FeedbackTrigger, FieldState, ValidationStrategy, project};
use super::validation::{FieldLens, Validation, ValidationError};

static FORM_ID_ALLOCATOR: AtomicU64 = AtomicU64::new(1);

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct FormId(pub u64);

impl FormId {
    pub fn next() -> Self {
        Self(FORM_ID_ALLOCATOR.fetch_add(1, Ordering::SeqCst))
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct FieldKey(&'static str);

impl FieldKey {
    pub const fn new(value: &'static str) -> Self {
        Self(value)
    }

    pub const fn as_str(self) -> &'static str {
        self.0
    }
}

impl Display for FieldKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0)
    }
}

/// Lifecycle of the whole form, driven by edits and submissions.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum FormStatus {
    #[default]
    Untouched,
    Editing,
    Submitting,
    Submitted,
}

/// Internal validity of a field. Whether it is shown depends on [`FieldMeta::talkative`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Validity<E> {
    Unknown,
    Validating,
    Valid,
    Invalid(E),
}

impl<E> Default for Validity<E> {
    fn default() -> Self {
        Self::Unknown
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FieldMeta<E> {
    pub talkative: bool,
    pub validity: Validity<E>,
}

impl<E> Default for FieldMeta<E> {
    fn default() -> Self {
        Self {
            talkative: false,
            validity: Validity::Unknown,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct FormOptions {
    /// Strategy for fields that do not set one.
    pub default_strategy: ValidationStrategy,
    /// Debounce for fields that do not set one. Zero validates on every edit.
    pub default_debounce_ms: u64,
    pub focus_first_error_on_submit: bool,
}

impl FormOptions {
    pub fn default_debounce(&self) -> Duration {
        Duration::from_millis(self.default_debounce_ms)
    }
}

impl Default for FormOptions {
    fn default() -> Self {
        Self {
            default_strategy: ValidationStrategy::OnSuccessOrBlur,
            default_debounce_ms: 0,
            focus_first_error_on_submit: true,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct SetValueOptions {
    pub validate: bool,
}

#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum FormError {
    #[error("form state is already borrowed while {0}")]
    StateBusy(&'static str),
    #[error("unknown form field `{0}`")]
    UnknownField(FieldKey),
    #[error("form field `{0}` is declared more than once")]
    DuplicateField(FieldKey),
    #[error("form field `{0}` was accessed with a lens of another value type")]
    FieldTypeMismatch(FieldKey),
    #[error("failed to spawn form task: {0}")]
    Spawn(String),
}

pub type FormResult<T> = Result<T, FormError>;

pub(super) struct FormState<T, E> {
    pub(super) initial_model: T,
    pub(super) model: T,
    pub(super) status: FormStatus,
    pub(super) field_meta: BTreeMap<FieldKey, FieldMeta<E>>,
}

impl<T, E> FormState<T, E> {
    pub(super) fn ensure_meta(&mut self, key: FieldKey) -> &mut FieldMeta<E> {
        self.field_meta.entry(key).or_default()
    }
}

/// Handle to one form engine. Clones share the same state.
pub struct FormController<T, E>
where
    T: Clone + 'static,
    E: ValidationError,
{
    pub(super) id: FormId,
    pub(super) options: FormOptions,
    pub(super) state: Rc<RefCell<FormState<T, E>>>,
    pub(super) fields: Rc<RefCell<FieldConfigStore<T, E>>>,
    pub(super) listeners: Rc<RefCell<ListenerRegistry>>,
    pub(super) mounts: Rc<RefCell<MountMap>>,
    pub(super) debounce: Rc<RefCell<DebounceSlots>>,
    pub(super) spawner: Rc<dyn LocalSpawn>,
}

impl<T, E> Clone for FormController<T, E>
where
    T: Clone + 'static,
    E: ValidationError,
{
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            options: self.options,
            state: self.state.clone(),
            fields: self.fields.clone(),
            listeners: self.listeners.clone(),
            mounts: self.mounts.clone(),
            debounce: self.debounce.clone(),
            spawner: self.spawner.clone(),
        }
    }
}

impl<T, E> FormController<T, E>
where
    T: Clone + 'static,
    E: ValidationError,
{
    /// Builds a form over `initial`. Fields with an explicit initial value overwrite the
    /// corresponding part of the model; the others keep what `initial` holds.
    pub fn new(
        initial: T,
        fields: FormFields<T, E>,
        options: FormOptions,
        spawner: impl LocalSpawn + 'static,
    ) -> FormResult<Self> {
        let store = FieldConfigStore::build(fields)?;
        let mut model = initial.clone();
        let mut field_meta = BTreeMap::new();
        for field in store.iter() {
            let value = field.initial_value(&initial);
            if !field.assign(&mut model, value) {
                return Err(FormError::FieldTypeMismatch(field.key()));
            }
            field_meta.insert(field.key(), FieldMeta::default());
        }

        Ok(Self {
            id: FormId::next(),
            options,
            state: Rc::new(RefCell::new(FormState {
                initial_model: initial,
                model,
                status: FormStatus::Untouched,
                field_meta,
            })),
            fields: Rc::new(RefCell::new(store)),
            listeners: Rc::new(RefCell::new(ListenerRegistry::default())),
            mounts: Rc::new(RefCell::new(MountMap::default())),
            debounce: Rc::new(RefCell::new(DebounceSlots::default())),
            spawner: Rc::new(spawner),
        })
    }

    pub fn form_id(&self) -> FormId {
        self.id
    }

    pub fn options(&self) -> FormOptions {
        self.options
    }

    pub fn form_status(&self) -> FormResult<FormStatus> {
        Ok(read_cell(&self.state, "reading form status")?.status)
    }

    /// Field keys in declaration order.
    pub fn field_keys(&self) -> FormResult<Vec<FieldKey>> {
        Ok(read_cell(&self.fields, "reading field keys")?.keys())
    }

    /// Swaps the whole field configuration. Fields keep their value and meta; new keys start
    /// from their initial value.
    pub fn replace_fields(&self, fields: FormFields<T, E>) -> FormResult<()> {
        let store = FieldConfigStore::build(fields)?;
        let added = {
            let state = read_cell(&self.state, "checking replaced fields")?;
            store
                .iter()
                .filter(|field| !state.field_meta.contains_key(&field.key()))
                .cloned()
                .collect::<Vec<_>>()
        };
        *write_cell(&self.fields, "replacing field configuration")? = store;
        for field in added {
            debug!(form = self.id.0, field = %field.key(), "field added by configuration swap");
            self.write_initial(field.as_ref())?;
        }
        Ok(())
    }

    pub fn field_value<L>(&self, lens: L) -> FormResult<L::Value>
    where
        L: FieldLens<T>,
    {
        Ok(lens
            .get(&read_cell(&self.state, "reading field value")?.model)
            .clone())
    }

    /// Projected state with the raw value.
    pub fn field_state<L>(&self, lens: L) -> FormResult<FieldState<L::Value, E>>
    where
        L: FieldLens<T>,
    {
        let key = lens.key();
        let field = self.field_entry(key)?;
        let state = read_cell(&self.state, "projecting field state")?;
        let meta = state.field_meta.get(&key).cloned().unwrap_or_default();
        Ok(project(
            lens.get(&state.model).clone(),
            &meta,
            field.has_validator(),
        ))
    }

    /// Projected state with the value passed through the field's sanitizer.
    pub fn sanitized_field_state<L>(&self, lens: L) -> FormResult<FieldState<L::Value, E>>
    where
        L: FieldLens<T>,
    {
        let key = lens.key();
        let field = self.field_entry(key)?;
        let state = read_cell(&self.state, "projecting sanitized field state")?;
        let value = field
            .sanitized(&state.model)
            .downcast::<L::Value>()
            .map_err(|_| FormError::FieldTypeMismatch(key))?;
        let meta = state.field_meta.get(&key).cloned().unwrap_or_default();
        Ok(project(*value, &meta, field.has_validator()))
    }

    /// Raw internal meta, bypassing the visibility projection.
    pub fn field_meta(&self, key: FieldKey) -> FormResult<FieldMeta<E>> {
        read_cell(&self.state, "reading field meta")?
            .field_meta
            .get(&key)
            .cloned()
            .ok_or(FormError::UnknownField(key))
    }

    /// Writes `value` without going through the edit path. With `validate`, a mounted field is
    /// revalidated and its feedback stays gated by its strategy, unlike [`Self::validate_field`].
    pub fn set_field_value<L>(
        &self,
        lens: L,
        value: L::Value,
        options: SetValueOptions,
    ) -> FormResult<()>
    where
        L: FieldLens<T>,
    {
        let key = lens.key();
        self.field_entry(key)?;
        lens.set(
            &mut write_cell(&self.state, "writing field value")?.model,
            value,
        );
        self.notify_field(key)?;
        if !options.validate {
            return Ok(());
        }
        if !self.is_mounted(key)? {
            debug!(form = self.id.0, field = %key, "skipping validation of unmounted field");
            return Ok(());
        }
        let _ = self.run_validation(key)?;
        Ok(())
    }

    /// Asks the mounted consumer of `key` to take focus. No-op without one.
    pub fn focus_field(&self, key: FieldKey) -> FormResult<()> {
        let handler = read_cell(&self.mounts, "reading focus handlers")?.focus_handler(key);
        if let Some(handler) = handler {
            handler();
        }
        Ok(())
    }

    pub fn reset_field(&self, key: FieldKey) -> FormResult<()> {
        let field = self.field_entry(key)?;
        write_cell(&self.debounce, "cancelling debounce on reset")?.cancel(key);
        self.write_initial(field.as_ref())?;
        self.notify_field(key)
    }

    /// Reveals feedback for `key` and validates it. Unmounted fields are skipped and report
    /// valid.
    pub fn validate_field(&self, key: FieldKey) -> FormResult<Validation<E>> {
        self.field_entry(key)?;
        if !self.is_mounted(key)? {
            debug!(form = self.id.0, field = %key, "skipping validation of unmounted field");
            return Ok(Validation::Ready(Ok(())));
        }
        self.force_talkative(key)?;
        self.run_validation(key)
    }

    pub fn listen_fields(
        &self,
        keys: &[FieldKey],
        listener: impl Fn() + 'static,
    ) -> FormResult<Subscription> {
        self.listen_fields_shared(keys, Rc::new(listener))
    }

    /// Same as [`Self::listen_fields`], keyed by the `Rc` identity of `listener`. Listening
    /// twice with the same `Rc` keeps one registration.
    pub fn listen_fields_shared(
        &self,
        keys: &[FieldKey],
        listener: Listener,
    ) -> FormResult<Subscription> {
        {
            let fields = read_cell(&self.fields, "checking listened fields")?;
            if let Some(unknown) = keys.iter().find(|key| fields.get(**key).is_none()) {
                return Err(FormError::UnknownField(*unknown));
            }
        }
        let targets = keys
            .iter()
            .copied()
            .map(ListenTarget::Field)
            .collect::<Vec<_>>();
        write_cell(&self.listeners, "registering field listener")?.add(&targets, &listener);
        Ok(Subscription::new(
            Rc::downgrade(&self.listeners),
            listener,
            targets,
        ))
    }

    pub fn listen_form_status(&self, listener: impl Fn() + 'static) -> FormResult<Subscription> {
        let listener: Listener = Rc::new(listener);
        let targets = vec![ListenTarget::Status];
        write_cell(&self.listeners, "registering status listener")?.add(&targets, &listener);
        Ok(Subscription::new(
            Rc::downgrade(&self.listeners),
            listener,
            targets,
        ))
    }

    pub(super) fn field_entry(&self, key: FieldKey) -> FormResult<Rc<dyn ErasedField<T, E>>> {
        read_cell(&self.fields, "reading field configuration")?
            .get(key)
            .cloned()
            .ok_or(FormError::UnknownField(key))
    }

    pub(super) fn strategy_for(&self, field: &dyn ErasedField<T, E>) -> ValidationStrategy {
        field.strategy().unwrap_or(self.options.default_strategy)
    }

    pub(super) fn debounce_for(&self, field: &dyn ErasedField<T, E>) -> Duration {
        field
            .debounce()
            .unwrap_or_else(|| self.options.default_debounce())
    }

    pub(super) fn is_mounted(&self, key: FieldKey) -> FormResult<bool> {
        Ok(read_cell(&self.mounts, "reading mount state")?.is_mounted(key))
    }

    pub(super) fn update_meta(
        &self,
        key: FieldKey,
        update: impl FnOnce(&mut FieldMeta<E>),
    ) -> FormResult<()> {
        let mut state = write_cell(&self.state, "updating field meta")?;
        update(state.ensure_meta(key));
        Ok(())
    }

    pub(super) fn force_talkative(&self, key: FieldKey) -> FormResult<()> {
        self.update_meta(key, |meta| meta.talkative = true)
    }

    /// Flips `talkative` when the field's strategy lets `trigger` reveal feedback.
    pub(super) fn reveal_on(&self, key: FieldKey, trigger: FeedbackTrigger) -> FormResult<()> {
        let field = self.field_entry(key)?;
        if self.strategy_for(field.as_ref()).reveals_on(trigger) {
            self.force_talkative(key)?;
        }
        Ok(())
    }

    pub(super) fn set_status(&self, status: FormStatus) -> FormResult<()> {
        {
            let mut state = write_cell(&self.state, "updating form status")?;
            if state.status == status {
                return Ok(());
            }
            state.status = status;
        }
        self.notify(ListenTarget::Status)
    }

    pub(super) fn notify_field(&self, key: FieldKey) -> FormResult<()> {
        self.notify(ListenTarget::Field(key))
    }

    fn notify(&self, target: ListenTarget) -> FormResult<()> {
        let listeners = read_cell(&self.listeners, "collecting listeners")?.snapshot(target);
        for listener in listeners {
            listener();
        }
        Ok(())
    }

    fn write_initial(&self, field: &dyn ErasedField<T, E>) -> FormResult<()> {
        let key = field.key();
        let value = {
            let state = read_cell(&self.state, "reading initial value")?;
            field.initial_value(&state.initial_model)
        };
        let mut state = write_cell(&self.state, "writing initial value")?;
        if !field.assign(&mut state.model, value) {
            return Err(FormError::FieldTypeMismatch(key));
        }
        *state.ensure_meta(key) = FieldMeta::default();
        Ok(())
    }

    pub(super) fn spawn(&self, task: impl Future<Output = ()> + 'static) -> FormResult<()> {
        self.spawner
            .spawn_local(task)
            .map_err(|error| FormError::Spawn(error.to_string()))
    }
}

pub(super) fn read_cell<'a, T>(
    cell: &'a RefCell<T>,
    context: &'static str,
) -> FormResult<Ref<'a, T>> {
    cell.try_borrow().map_err(|_| FormError::StateBusy(context))
}

pub(super) fn write_cell<'a, T>(
    cell: &'a RefCell<T>,
    context: &'static str,
) -> FormResult<RefMut<'a, T>> {
    cell.try_borrow_mut()
        .map_err(|_| FormError::StateBusy(context))
}

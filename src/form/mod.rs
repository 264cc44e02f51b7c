mod binding;
mod config;
mod controller;
mod debounce;
mod listeners;
mod mount;
mod strategy;
mod submit;
mod validation;
pub mod validators;


pub use binding::FieldBinding;
pub use calmform_derive::FormModel;
pub use config::{FieldConfig, FormFields, ValidateFn};
pub use controller::{
    FieldKey, FieldMeta, FormController, FormError, FormId, FormOptions, FormResult, FormStatus,
    SetValueOptions, Validity,
};
pub use listeners::{Listener, Subscription};
pub use mount::{FieldMount, FocusHandler};
pub use strategy::{FeedbackTrigger, FieldState, ValidationStrategy};
pub use submit::{FieldErrors, SubmitEffect, SubmitOptions, SubmittedValues};
pub use validation::{FieldHelpers, FieldLens, FormModel, Validation, ValidationError};

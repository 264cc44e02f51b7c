pub use crate::form::validators::{combine, optional, optional_string, validator};
pub use crate::form::{
    FieldBinding, FieldConfig, FieldErrors, FieldHelpers, FieldKey, FieldLens, FieldState,
    FormController, FormFields, FormModel, FormOptions, FormStatus, SetValueOptions, SubmitEffect,
    SubmitOptions, SubmittedValues, Validation, ValidationError, ValidationStrategy,
};

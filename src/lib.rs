pub mod form;
pub mod prelude;

pub use form::{FormController, FormError, FormResult};

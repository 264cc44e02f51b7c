use calmform::form::{FieldLens, FormModel};

#[derive(Clone, calmform::form::FormModel)]
struct AddressForm {
    #[form(key = "postal_code")]
    zip: String,
    #[form(skip)]
    #[allow(dead_code)]
    revision: u32,
}

fn main() {
    let fields = AddressForm::fields();
    assert_eq!(fields.zip().key().as_str(), "postal_code");
    assert_eq!(
        AddressFormFields::KEYS,
        &[calmform::form::FieldKey::new("postal_code")]
    );
}

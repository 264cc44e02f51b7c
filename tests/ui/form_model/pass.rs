use calmform::form::{FieldLens, FormModel};

#[derive(Clone, calmform::form::FormModel)]
struct SignupForm {
    email: String,
    accept_terms: bool,
}

fn main() {
    let fields = SignupForm::fields();
    let lens = fields.email();
    let mut model = SignupForm {
        email: "a@calm.form".to_string(),
        accept_terms: false,
    };
    lens.set(&mut model, "b@calm.form".to_string());
    fields.accept_terms().set(&mut model, true);

    assert_eq!(lens.key().as_str(), "email");
    assert_eq!(lens.get(&model), "b@calm.form");
    assert!(*SignupFormAcceptTermsLens.get(&model));
    assert_eq!(SignupFormFields::KEYS.len(), 2);
}

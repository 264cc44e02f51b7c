#[derive(Clone, calmform::form::FormModel)]
enum ChoiceForm {
    Email(String),
}

fn main() {
    let ChoiceForm::Email(_) = ChoiceForm::Email(String::new());
}

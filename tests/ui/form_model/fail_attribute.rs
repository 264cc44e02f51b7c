#[derive(Clone, calmform::form::FormModel)]
struct ContactForm {
    #[form(flatten)]
    email: String,
}

fn main() {
    let _ = ContactForm { email: String::new() }.email;
}

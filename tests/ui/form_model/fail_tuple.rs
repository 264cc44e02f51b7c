#[derive(Clone, calmform::form::FormModel)]
struct TupleForm(String);

fn main() {
    let _ = TupleForm(String::new()).0;
}

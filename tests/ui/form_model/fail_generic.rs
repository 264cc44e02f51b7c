#[derive(Clone, calmform::form::FormModel)]
struct GenericForm<T> {
    value: T,
}

fn main() {
    let _ = GenericForm { value: 1 }.value;
}

use super::controller::{FieldMeta, Validity};

/// Picks which user action may make a field's feedback visible. The strategy never stops a
/// validation from running, it only gates visibility.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ValidationStrategy {
    OnChange,
    OnBlur,
    OnSuccess,
    #[default]
    OnSuccessOrBlur,
}

/// The interaction trying to reveal feedback.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum FeedbackTrigger {
    Change,
    Blur,
    Success,
}

impl ValidationStrategy {
    pub const fn reveals_on(self, trigger: FeedbackTrigger) -> bool {
        matches!(
            (self, trigger),
            (Self::OnChange, FeedbackTrigger::Change)
                | (Self::OnBlur, FeedbackTrigger::Blur)
                | (Self::OnSuccess, FeedbackTrigger::Success)
                | (Self::OnSuccessOrBlur, FeedbackTrigger::Blur)
                | (Self::OnSuccessOrBlur, FeedbackTrigger::Success)
        )
    }
}

/// What a presentation layer gets to see of a field.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FieldState<V, E> {
    pub value: V,
    pub validating: bool,
    pub valid: bool,
    pub error: Option<E>,
}

impl<V, E> FieldState<V, E> {
    pub fn is_neutral(&self) -> bool {
        !self.validating && self.error.is_none()
    }
}

pub(super) fn project<V, E: Clone>(
    value: V,
    meta: &FieldMeta<E>,
    has_validator: bool,
) -> FieldState<V, E> {
    let (validating, valid, error) = match &meta.validity {
        _ if !meta.talkative => (false, !has_validator, None),
        Validity::Unknown => (false, !has_validator, None),
        Validity::Validating => (true, false, None),
        Validity::Valid => (false, true, None),
        Validity::Invalid(error) => (false, false, Some(error.clone())),
    };
    FieldState {
        value,
        validating,
        valid,
        error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gate_table_matches_strategies() {
        use FeedbackTrigger::*;
        let table = [
            (ValidationStrategy::OnChange, [true, false, false]),
            (ValidationStrategy::OnBlur, [false, true, false]),
            (ValidationStrategy::OnSuccess, [false, false, true]),
            (ValidationStrategy::OnSuccessOrBlur, [false, true, true]),
        ];
        for (strategy, expected) in table {
            let actual = [Change, Blur, Success].map(|trigger| strategy.reveals_on(trigger));
            assert_eq!(actual, expected, "{strategy:?}");
        }
    }

    #[test]
    fn silent_fields_project_neutral() {
        let meta = FieldMeta {
            talkative: false,
            validity: Validity::Invalid("nope"),
        };
        let state = project("x", &meta, true);
        assert!(state.is_neutral());
        assert!(!state.valid);

        let without_validator = project("x", &FieldMeta::<&str>::default(), false);
        assert!(without_validator.valid);
    }

    #[test]
    fn talkative_fields_project_validity() {
        let invalid = FieldMeta {
            talkative: true,
            validity: Validity::Invalid("nope"),
        };
        assert_eq!(project(1, &invalid, true).error, Some("nope"));

        let validating = FieldMeta::<&str> {
            talkative: true,
            validity: Validity::Validating,
        };
        let state = project(1, &validating, true);
        assert!(state.validating);
        assert!(!state.valid);
    }
}

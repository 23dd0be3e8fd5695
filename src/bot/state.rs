use serde::{Deserialize, Serialize};

/// What the next free-text message from a user is expected to be.
///
/// Stored as JSON in the user's row, so pending prompts survive restarts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum State {
    #[default]
    Idle,
    AwaitingNumbers(NumbersPurpose),
    AwaitingNoteText,
    AwaitingEntryId(IdPurpose),
    AwaitingNoteEdit { id: i64 },
    AwaitingSearchQuery,
    /// Stays active after each logged meal until cancelled.
    AwaitingFood,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NumbersPurpose {
    Sum,
    Max,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IdPurpose {
    EditNote,
    DeleteNote,
    DeleteFood,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stored_form() {
        assert_eq!(serde_json::to_string(&State::Idle).unwrap(), r#""Idle""#);
        assert_eq!(
            serde_json::to_string(&State::AwaitingNoteEdit { id: 7 }).unwrap(),
            r#"{"AwaitingNoteEdit":{"id":7}}"#
        );
        let parsed: State = serde_json::from_str(r#"{"AwaitingEntryId":"DeleteFood"}"#).unwrap();
        assert_eq!(parsed, State::AwaitingEntryId(IdPurpose::DeleteFood));
    }
}

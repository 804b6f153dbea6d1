use serde::Deserialize;
use thiserror::Error;

use crate::blocks::SHOW_OVERVIEW_ACTION;

#[derive(Debug, Error)]
pub enum InteractionError {
    #[error("interaction payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("interaction payload has no actions")]
    NoActions,
}

/// The `payload` form field of a block-action callback.
#[derive(Clone, Debug, Deserialize)]
pub struct InteractionPayload {
    pub user: InteractionUser,
    #[serde(default)]
    pub actions: Vec<InteractionAction>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct InteractionUser {
    pub id: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct InteractionAction {
    #[serde(default)]
    pub action_id: String,
    #[serde(default)]
    pub value: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InteractionKind {
    ShowOverview { user_id: String },
    Ignored,
}

pub fn parse_interaction(raw: &str) -> Result<InteractionKind, InteractionError> {
    let payload: InteractionPayload = serde_json::from_str(raw)?;
    let action = payload.actions.first().ok_or(InteractionError::NoActions)?;
    Ok(match action.value.as_deref() {
        Some(SHOW_OVERVIEW_ACTION) => InteractionKind::ShowOverview { user_id: payload.user.id },
        _ => InteractionKind::Ignored,
    })
}

#[cfg(test)]
mod tests {
    use super::{parse_interaction, InteractionError, InteractionKind};

    #[test]
    fn overview_button_is_recognised() {
        let kind = parse_interaction(
            r#"{"type":"block_actions","user":{"id":"U7"},"actions":[{"action_id":"dashboard.overview.v1","value":"show_overview"}]}"#,
        )
        .expect("payload parses");
        assert_eq!(kind, InteractionKind::ShowOverview { user_id: "U7".to_string() });
    }

    #[test]
    fn url_button_is_ignored() {
        let kind = parse_interaction(
            r#"{"user":{"id":"U7"},"actions":[{"action_id":"dashboard.open.v1","value":"open_dashboard"}]}"#,
        )
        .expect("payload parses");
        assert_eq!(kind, InteractionKind::Ignored);
    }

    #[test]
    fn malformed_payloads_are_errors() {
        assert!(matches!(parse_interaction("not json"), Err(InteractionError::Json(_))));
        assert!(matches!(
            parse_interaction(r#"{"user":{"id":"U7"},"actions":[]}"#),
            Err(InteractionError::NoActions)
        ));
        assert!(matches!(parse_interaction(r#"{"actions":[]}"#), Err(InteractionError::Json(_))));
    }
}

use crate::{actions::ActionRegistry, conversation::ConversationTurn};

/// Built-in assistant persona. Expects `{actions}` and `{conversation}`.
pub const DEFAULT_SYSTEM_PROMPT: &str = include_str!("../prompts/system_prompt.md");

/// Built-in interview scoring prompt. Expects `{transcript}`.
pub const DEFAULT_FEEDBACK_PROMPT: &str = include_str!("../prompts/feedback.md");

/// The fixed instruction block sent ahead of every conversation.
///
/// The action list is rendered from the registry once, at construction, so
/// the protocol the model is told about is always the one the dispatcher
/// accepts.
#[derive(Debug, Clone)]
pub struct Instructions {
    template: String,
    actions: String,
}

impl Instructions {
    pub fn new(template: impl Into<String>, registry: &ActionRegistry) -> Self {
        Self {
            template: template.into(),
            actions: registry.describe_for_prompt(),
        }
    }

    /// Flattens `history` into a single prompt string.
    pub fn render(&self, history: &[ConversationTurn]) -> String {
        self.template
            .replace("{actions}", &self.actions)
            .replace("{conversation}", &flatten(history))
    }
}

impl Default for Instructions {
    fn default() -> Self {
        Self::new(DEFAULT_SYSTEM_PROMPT, &ActionRegistry::new())
    }
}

pub fn flatten(history: &[ConversationTurn]) -> String {
    history
        .iter()
        .map(|turn| format!("{}: {}", turn.role.label(), turn.text))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_includes_actions_and_history() {
        let instructions = Instructions::default();
        let prompt = instructions.render(&[
            ConversationTurn::user("What's 2+2?"),
            ConversationTurn::assistant("4"),
        ]);
        assert!(prompt.contains("- calculate: {\"expression\":\"string\"}"));
        assert!(prompt.contains("User: What's 2+2?\nAssistant: 4"));
        assert!(prompt.trim_end().ends_with("Assistant:"));
        assert!(!prompt.contains("{actions}"));
    }

    #[test]
    fn test_user_text_is_not_expanded() {
        let instructions = Instructions::new("{actions}|{conversation}", &ActionRegistry::new());
        let prompt = instructions.render(&[ConversationTurn::user("{actions}")]);
        assert!(prompt.ends_with("|User: {actions}"));
    }
}

use conclave_core::types::{ChatMessage, Role};

/// Ordered message history of one agent. Messages are only ever appended.
#[derive(Debug, Clone, Default)]
pub struct ConversationState {
    messages: Vec<ChatMessage>,
}

impl ConversationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// A conversation opened with the agent's instructions and the user request.
    pub fn seeded(instructions: &str, request: &str) -> Self {
        let mut state = Self::new();
        if !instructions.trim().is_empty() {
            state.push(ChatMessage::system(instructions.trim()));
        }
        state.push(ChatMessage::user(request));
        state
    }

    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Messages appended at or after position `mark`.
    pub fn since(&self, mark: usize) -> &[ChatMessage] {
        &self.messages[mark.min(self.messages.len())..]
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Text of the most recent assistant message, if any.
    pub fn last_assistant_text(&self) -> Option<String> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::Assistant)
            .map(|m| m.text())
    }

    pub fn into_messages(self) -> Vec<ChatMessage> {
        self.messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_has_system_then_user() {
        let state = ConversationState::seeded("You are the writer.", "Write a report");
        assert_eq!(state.len(), 2);
        assert_eq!(state.messages()[0].role, Role::System);
        assert_eq!(state.messages()[1].text(), "Write a report");
    }

    #[test]
    fn blank_instructions_are_skipped() {
        let state = ConversationState::seeded("  ", "hi");
        assert_eq!(state.len(), 1);
    }

    #[test]
    fn since_and_last_assistant() {
        let mut state = ConversationState::seeded("sys", "q");
        let mark = state.len();
        state.push(ChatMessage::assistant_text("first"));
        state.push(ChatMessage::tool_text("Observation: 1"));
        state.push(ChatMessage::assistant_text("second"));
        assert_eq!(state.since(mark).len(), 3);
        assert!(state.since(99).is_empty());
        assert_eq!(state.last_assistant_text().as_deref(), Some("second"));
    }
}

use shared_types::ConversationTurn;

/// Ordered turn history plus the greeting flag for one conversation.
///
/// The first turn is always the system prompt; user and assistant turns are
/// appended in arrival order and replayed verbatim to the completion provider.
#[derive(Debug, Clone)]
pub struct ConversationContext {
    turns: Vec<ConversationTurn>,
    started: bool,
}

impl ConversationContext {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            turns: vec![ConversationTurn::system(system_prompt)],
            started: false,
        }
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Mark the conversation started. Returns `true` only on the first call.
    pub fn begin(&mut self) -> bool {
        !std::mem::replace(&mut self.started, true)
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.turns.push(ConversationTurn::user(content));
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.turns.push(ConversationTurn::assistant(content));
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::Role;

    #[test]
    fn test_begin_only_once() {
        let mut ctx = ConversationContext::new("sys");
        assert!(!ctx.is_started());
        assert!(ctx.begin());
        assert!(!ctx.begin());
        assert!(ctx.is_started());
    }

    #[test]
    fn test_turns_keep_insertion_order() {
        let mut ctx = ConversationContext::new("sys");
        ctx.push_user("a");
        ctx.push_assistant("b");
        let roles: Vec<Role> = ctx.turns().iter().map(|t| t.role).collect();
        assert_eq!(roles, vec![Role::System, Role::User, Role::Assistant]);
        assert_eq!(ctx.turns()[0].content, "sys");
    }
}

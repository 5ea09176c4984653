//! Token-bounded conversation memory

use super::{ChatTurn, Role};
use tracing::debug;

/// Approximate token cost of a text: about four characters per unit, at least one
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4).max(1)
}

/// Window over the conversation history that fits a token budget
#[derive(Debug, Clone, Copy)]
pub struct ChatMemory {
    token_limit: usize,
}

impl ChatMemory {
    pub fn new(token_limit: usize) -> Self {
        Self { token_limit }
    }

    pub fn token_limit(&self) -> usize {
        self.token_limit
    }

    /// The most recent turns that fit the budget, oldest evicted first
    ///
    /// The window never starts with an assistant turn, so condensation always
    /// sees a question before any answer.
    pub fn window(&self, history: &[ChatTurn]) -> Vec<ChatTurn> {
        let mut start = history.len();
        let mut used = 0;
        for (idx, turn) in history.iter().enumerate().rev() {
            let cost = estimate_tokens(&turn.content);
            if used + cost > self.token_limit {
                break;
            }
            used += cost;
            start = idx;
        }

        while start < history.len() && history[start].role == Role::Assistant {
            start += 1;
        }

        if start > 0 {
            debug!(
                "Memory window evicted {} of {} turns",
                start,
                history.len()
            );
        }

        history[start..].to_vec()
    }
}

impl Default for ChatMemory {
    fn default() -> Self {
        Self::new(8192)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_tokens() {
        assert_eq!(estimate_tokens(""), 1);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
    }

    #[test]
    fn test_keeps_everything_under_budget() {
        let history = vec![ChatTurn::user("hello"), ChatTurn::assistant("hi there")];
        assert_eq!(ChatMemory::default().window(&history), history);
    }

    #[test]
    fn test_evicts_oldest_first() {
        let history = vec![
            ChatTurn::user("a".repeat(40)),
            ChatTurn::assistant("b".repeat(40)),
            ChatTurn::user("c".repeat(40)),
            ChatTurn::assistant("d".repeat(40)),
        ];
        // Each turn costs 10; a budget of 25 fits the last two
        let window = ChatMemory::new(25).window(&history);
        assert_eq!(window, history[2..].to_vec());
    }

    #[test]
    fn test_window_never_starts_with_assistant() {
        let history = vec![
            ChatTurn::user("a".repeat(40)),
            ChatTurn::assistant("b".repeat(40)),
            ChatTurn::user("c".repeat(40)),
            ChatTurn::assistant("d".repeat(40)),
        ];
        // A budget of 35 fits three turns, the first of which is an answer
        let window = ChatMemory::new(35).window(&history);
        assert_eq!(window, history[2..].to_vec());
    }

    #[test]
    fn test_oversized_last_turn_leaves_empty_window() {
        let history = vec![ChatTurn::user("x".repeat(100))];
        assert!(ChatMemory::new(5).window(&history).is_empty());
    }
}

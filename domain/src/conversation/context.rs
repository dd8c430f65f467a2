//! Per-model conversation context.
//!
//! Every backend sees the user's side of the conversation but only its own
//! earlier answers: another model's reply never enters its context.

use super::entities::{ConversationTurn, Message, Role};
use crate::core::model::Model;

/// Default cap on messages sent per request (5 exchanges).
pub const DEFAULT_MAX_CONTEXT_MESSAGES: usize = 10;

/// Rebuild the message list one model should receive.
///
/// Keeps every user turn and this model's own successful assistant answers,
/// appends `prompt` unless it is already the last user message, then keeps
/// only the most recent `max_messages` entries.
pub fn build_model_context(
    history: &[ConversationTurn],
    model: &Model,
    prompt: &str,
    max_messages: usize,
) -> Vec<Message> {
    let mut messages: Vec<Message> = history
        .iter()
        .filter_map(|turn| match turn.role {
            Role::User => Some(Message::user(turn.content.clone())),
            Role::Assistant => turn.response_of(model).map(Message::assistant),
            Role::System => None,
        })
        .collect();

    let already_last = messages
        .last()
        .is_some_and(|m| m.role == Role::User && m.content == prompt);
    if !already_last {
        messages.push(Message::user(prompt));
    }

    if messages.len() > max_messages {
        messages.drain(..messages.len() - max_messages);
    }
    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::entities::ModelResponse;

    fn model(id: &str) -> Model {
        id.parse().unwrap()
    }

    fn exchange(question: &str, answers: &[(&str, &str)]) -> Vec<ConversationTurn> {
        let responses = answers
            .iter()
            .map(|(m, text)| ModelResponse::success(model(m), *text))
            .collect();
        let selected = answers.iter().map(|(m, _)| model(m)).collect();
        vec![
            ConversationTurn::user(question),
            ConversationTurn::assistant(responses, selected, None),
        ]
    }

    #[test]
    fn test_context_contains_only_own_answers() {
        let history = exchange("q1", &[("a", "answer from a"), ("b", "answer from b")]);

        let ctx = build_model_context(&history, &model("a"), "q2", 10);

        assert_eq!(
            ctx,
            vec![
                Message::user("q1"),
                Message::assistant("answer from a"),
                Message::user("q2"),
            ]
        );
        assert!(ctx.iter().all(|m| m.content != "answer from b"));
    }

    #[test]
    fn test_model_without_prior_answer_sees_only_user_turns() {
        let history = exchange("q1", &[("a", "answer from a")]);

        let ctx = build_model_context(&history, &model("c"), "q2", 10);

        assert_eq!(ctx, vec![Message::user("q1"), Message::user("q2")]);
    }

    #[test]
    fn test_prompt_not_duplicated_when_already_last() {
        let mut history = exchange("q1", &[("a", "x")]);
        history.push(ConversationTurn::user("q2"));

        let ctx = build_model_context(&history, &model("a"), "q2", 10);

        assert_eq!(ctx.len(), 3);
        assert_eq!(ctx.last().unwrap(), &Message::user("q2"));
    }

    #[test]
    fn test_context_truncated_to_most_recent_messages() {
        let mut history = Vec::new();
        for i in 0..8 {
            history.extend(exchange(&format!("q{i}"), &[("a", &format!("a{i}"))]));
        }

        let ctx = build_model_context(&history, &model("a"), "latest", 10);

        assert_eq!(ctx.len(), 10);
        assert_eq!(ctx.last().unwrap(), &Message::user("latest"));
        // 17 messages total, the oldest seven are dropped
        assert_eq!(ctx.first().unwrap(), &Message::assistant("a3"));
    }

    #[test]
    fn test_failed_answer_excluded() {
        let history = vec![
            ConversationTurn::user("q1"),
            ConversationTurn::assistant(
                vec![ModelResponse::failure(model("a"), "partial", "timeout")],
                vec![model("a")],
                None,
            ),
        ];

        let ctx = build_model_context(&history, &model("a"), "q2", 10);

        assert_eq!(ctx, vec![Message::user("q1"), Message::user("q2")]);
    }
}

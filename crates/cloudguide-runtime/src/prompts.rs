//! System prompts and prompt builders for the answering backend.
//!
//! The classify prompt must produce a single token the router can match;
//! anything other than `DECLINE` is treated as `ALLOW`.

use crate::providers::ChatMessage;

/// Instruction for generation requests.
pub const ASK_SYSTEM_PROMPT: &str =
    "You are CloudGuide, a helpful cloud pricing and architecture assistant. Be concise.";

/// Instruction for the topic gate.
pub const CLASSIFY_SYSTEM_PROMPT: &str = r#"You are a strict topic classifier for CloudGuide, a cloud assistant.
Reply with exactly one word: ALLOW or DECLINE.
ALLOW: questions about cloud computing, AWS, Azure, GCP, cloud pricing, architecture, networking, storage, databases, containers, Kubernetes, DevOps, SRE, security in the cloud.
DECLINE: anything else (weather, sports, recipes, general chit-chat, personal advice).
Do not explain your answer."#;

pub const ALLOW: &str = "ALLOW";
pub const DECLINE: &str = "DECLINE";

/// Messages for a generation request.
pub fn ask_messages(prompt: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(ASK_SYSTEM_PROMPT),
        ChatMessage::user(prompt),
    ]
}

/// Messages for a topic classification request.
pub fn classify_messages(text: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(CLASSIFY_SYSTEM_PROMPT),
        ChatMessage::user(text),
    ]
}

/// Map a raw classifier reply to `ALLOW` or `DECLINE`.
pub fn parse_verdict(reply: &str) -> &'static str {
    if reply.to_uppercase().contains(DECLINE) {
        DECLINE
    } else {
        ALLOW
    }
}

/// Retrieval-augmented prompt.
pub fn build_retrieval_prompt(context: &str, question: &str) -> String {
    format!(
        "Use the context to answer concisely. If uncertain, say you are unsure.\n\nContext:\n{}\n\nQuestion: {}",
        context, question
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verdict_parsing() {
        assert_eq!(parse_verdict("DECLINE"), DECLINE);
        assert_eq!(parse_verdict("  decline."), DECLINE);
        assert_eq!(parse_verdict("ALLOW"), ALLOW);
        assert_eq!(parse_verdict("maybe"), ALLOW);
        assert_eq!(parse_verdict(""), ALLOW);
    }

    #[test]
    fn test_message_roles() {
        let messages = classify_messages("what's the weather");
        assert_eq!(messages[0].role, "system");
        assert!(messages[0].content.contains("ALLOW or DECLINE"));
        assert_eq!(messages[1].content, "what's the weather");

        let messages = ask_messages("hi");
        assert_eq!(messages[0].content, ASK_SYSTEM_PROMPT);
    }

    #[test]
    fn test_retrieval_prompt_layout() {
        let prompt = build_retrieval_prompt("- a\n- b", "what is a?");
        assert_eq!(
            prompt,
            "Use the context to answer concisely. If uncertain, say you are unsure.\n\nContext:\n- a\n- b\n\nQuestion: what is a?"
        );
    }
}

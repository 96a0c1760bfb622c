//! Grounded generation requests.
//!
//! A request has two parts: a fixed system instruction that confines the
//! model to the supplied context, and a single user turn carrying the
//! context block and the raw question. The wire shape follows the
//! `generateContent` API:
//!
//! ```json
//! {
//!   "systemInstruction": { "parts": [{ "text": "..." }] },
//!   "contents": [{ "parts": [{ "text": "CONTEXT: ... USER QUESTION: ..." }] }]
//! }
//! ```

use serde::{Deserialize, Serialize};

/// Sentence the model must reply with, verbatim, when the context lacks the answer.
pub const REFUSAL_SENTENCE: &str = "I'm sorry, my knowledge base does not have the information to answer this question. Please contact a human IT support agent.";

/// Placed between context chunks when more than one is retrieved.
pub const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Part {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Content {
    pub parts: Vec<Part>,
}

impl Content {
    fn text(text: String) -> Self {
        Self {
            parts: vec![Part { text }],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    pub system_instruction: Content,
    pub contents: Vec<Content>,
}

impl GenerationRequest {
    pub fn system_text(&self) -> &str {
        first_text(&self.system_instruction)
    }

    pub fn user_text(&self) -> &str {
        self.contents.first().map(first_text).unwrap_or_default()
    }
}

fn first_text(content: &Content) -> &str {
    content
        .parts
        .first()
        .map(|p| p.text.as_str())
        .unwrap_or_default()
}

/// The fixed grounding instruction sent with every request.
pub fn system_instruction() -> String {
    format!(
        "You are a helpful and professional IT Service Desk assistant. \
         You must answer the user's question *only* using the context provided. \
         Do not make up information or answer questions not found in the context. \
         If the context does not contain the answer, you MUST say: '{}'",
        REFUSAL_SENTENCE
    )
}

/// Join retrieved chunks in retrieval order.
pub fn context_block(context_chunks: &[String]) -> String {
    context_chunks.join(CONTEXT_SEPARATOR)
}

/// Build the request for `question` grounded on `context_chunks`.
pub fn build(question: &str, context_chunks: &[String]) -> GenerationRequest {
    let user_prompt = format!(
        "CONTEXT:\n---\n{}\n---\n\nUSER QUESTION:\n{}",
        context_block(context_chunks),
        question
    );

    GenerationRequest {
        system_instruction: Content::text(system_instruction()),
        contents: vec![Content::text(user_prompt)],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_instruction_contains_refusal_verbatim() {
        let req = build("q", &["c".to_string()]);
        assert!(req.system_text().contains(REFUSAL_SENTENCE));
        assert_eq!(req.system_text(), system_instruction());
    }

    #[test]
    fn test_system_instruction_is_invariant() {
        let a = build("How do I reset my password?", &["one".to_string()]);
        let b = build("Printer?", &["two".to_string(), "three".to_string()]);
        assert_eq!(a.system_instruction, b.system_instruction);
    }

    #[test]
    fn test_user_turn_layout() {
        let req = build(
            "My VPN won't connect",
            &["Restart the VPN client and re-enter your credentials.".to_string()],
        );
        assert_eq!(req.contents.len(), 1);
        assert_eq!(
            req.user_text(),
            "CONTEXT:\n---\nRestart the VPN client and re-enter your credentials.\n---\n\n\
             USER QUESTION:\nMy VPN won't connect"
        );
    }

    #[test]
    fn test_chunks_joined_in_order() {
        let chunks = vec!["first".to_string(), "second".to_string()];
        assert_eq!(context_block(&chunks), "first\n\n---\n\nsecond");
        assert!(build("q", &chunks)
            .user_text()
            .contains("first\n\n---\n\nsecond"));
    }

    #[test]
    fn test_wire_shape() {
        let req = build("q", &["c".to_string()]);
        let json = serde_json::to_value(&req).unwrap();
        assert!(json["systemInstruction"]["parts"][0]["text"].is_string());
        assert_eq!(json["contents"].as_array().unwrap().len(), 1);
        assert!(json["contents"][0]["parts"][0]["text"]
            .as_str()
            .unwrap()
            .ends_with("USER QUESTION:\nq"));
        assert!(json.get("system_instruction").is_none());
    }
}

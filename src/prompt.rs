//! System prompt for document-grounded answers.

use docqa_core::ContextBundle;

use crate::llm::ChatMessage;

/// System prompt embedding the selected document context.
pub fn system_prompt(context: &str) -> String {
    format!(
        r#"You are a helpful assistant that answers questions about the user's documents.

RULES:
1. Answer using the information in the DOCUMENT CONTEXT below.
2. Mention which document the information comes from, using the name shown in its [From: ...] header.
3. If the context does not contain the answer, say so plainly instead of guessing.
4. Keep answers clear and well organized.

DOCUMENT CONTEXT:
{context}"#,
        context = context
    )
}

/// Messages for one chat turn: the grounded system prompt, then the question.
pub fn build_messages(bundle: &ContextBundle, question: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(system_prompt(&bundle.context)),
        ChatMessage::user(question),
    ]
}

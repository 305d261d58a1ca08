//! Prompts sent to the vision and text models.
//!
//! Every prompt lives here so the wording can be inspected by unit tests
//! without a model server. The transcription prompt can be overridden via
//! [`crate::config::RagConfig::transcription_prompt`]; the grounding prompt is
//! fixed because answers must only ever come from retrieved context.

/// Instruction sent with every page image, in the same user turn.
pub const TRANSCRIPTION_PROMPT: &str = "Your task is to transcribe all visible text from the provided image with accuracy and completeness. Follow these guidelines:\n\n1. **Text Extraction**: Identify and transcribe all text present in the image, including printed, handwritten, or stylized text, while preserving the structure and order in which it appears.\n\n2. **Formatting Consistency**: Maintain the original formatting, such as line breaks, bullet points, or numbered lists, where applicable.\n\n3. **Clarity**: Ensure the transcription is clear and does not contain errors or omissions.\n\n4. **Handle Unclear Text**: For text that is unclear, illegible, or partially obscured, indicate this explicitly using placeholders (e.g., '[illegible]').\n\n5. **Exclude Non-Text Elements**: Focus solely on text; do not describe images, graphics, or non-textual elements unless explicitly requested.\n\n6. **Professional Tone**: Ensure the transcription is neutral and professionally formatted, ready for further use or review.";

/// System turn for answer generation.
pub const GROUNDING_SYSTEM_PROMPT: &str = "You are a helpful assistant answering questions about a resume. Use only the information from the resume to answer questions.";

/// Build the user turn carrying the retrieved context and the question.
///
/// The layout is part of the external model contract and must not change:
/// `Resume content: {context}\n\nQuestion: {query}`.
pub fn grounded_user_message(context: &str, query: &str) -> String {
    format!("Resume content: {}\n\nQuestion: {}", context, query)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transcription_prompt_asks_for_illegible_markers() {
        assert!(TRANSCRIPTION_PROMPT.contains("[illegible]"));
        assert!(TRANSCRIPTION_PROMPT.contains("do not describe images"));
    }

    #[test]
    fn user_message_layout() {
        let msg = grounded_user_message("Name: Jane Doe", "What is the candidate's name?");
        assert_eq!(
            msg,
            "Resume content: Name: Jane Doe\n\nQuestion: What is the candidate's name?"
        );
    }

    #[test]
    fn user_message_with_empty_context() {
        assert_eq!(grounded_user_message("", "q"), "Resume content: \n\nQuestion: q");
    }
}

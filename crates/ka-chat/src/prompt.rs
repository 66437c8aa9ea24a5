//! Grounded prompt template

/// What the model is told to say when the context does not cover the question.
pub const REFUSAL: &str =
    "I don't have enough information in the uploaded documents to answer this question.";

/// Answer returned without calling the model when nothing is indexed.
pub const NO_DOCUMENTS: &str =
    "I don't have any documents to answer your question. Please upload some documents first.";

/// Build the generation prompt, embedding `context` verbatim.
pub fn build_prompt(query: &str, context: &str) -> String {
    format!(
        "You are an AI assistant that answers questions based ONLY on the provided context from uploaded documents.\n\
        \n\
        CRITICAL RULES:\n\
        1. Answer ONLY using information from the context below\n\
        2. If the context doesn't contain relevant information, say \"{}\"\n\
        3. Do NOT use external knowledge or make assumptions\n\
        4. Cite specific parts of the context when answering\n\
        5. Be concise and accurate\n\
        \n\
        CONTEXT FROM DOCUMENTS:\n\
        {}\n\
        \n\
        USER QUESTION:\n\
        {}\n\
        \n\
        ANSWER:",
        REFUSAL, context, query
    )
}

/// Answer shown to the user when generation fails.
pub fn generation_error(error: &impl std::fmt::Display) -> String {
    format!("Error generating response: {}", error)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_is_embedded_verbatim() {
        let context = "  line one\n\n---\n\nline two with {braces}  ";
        let prompt = build_prompt("what?", context);

        assert!(prompt.contains(context));
        assert!(prompt.contains(REFUSAL));
        assert!(prompt.ends_with("USER QUESTION:\nwhat?\n\nANSWER:"));
    }
}

use statrag_core::traits::{CompletionRequest, ContextChunk};

const INSTRUCTIONS: &str = "Answer the question using only the context below. Name the source titles you relied on. \
If the context does not contain the answer, say so.";

/// Grounded prompt: numbered passages, each headed by its source title, then the question.
pub fn build_request(query: &str, context: Vec<ContextChunk>) -> CompletionRequest {
    let mut prompt = String::from(INSTRUCTIONS);
    prompt.push_str("\n\nContext:\n");
    for (i, c) in context.iter().enumerate() {
        prompt.push_str(&format!("\n[{}] {}\n{}\n", i + 1, c.title, c.text.trim()));
    }
    prompt.push_str(&format!("\nQuestion: {}\nAnswer:", query.trim()));
    CompletionRequest { query: query.to_string(), prompt, context }
}

/// First `max_chars` characters of `text`, ellipsised when cut.
pub fn snippet(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}…", text[..cut].trim_end()),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_lists_titled_passages_in_rank_order() {
        let req = build_request(
            "When is Welch's test used?",
            vec![
                ContextChunk { title: "t-test basics".into(), text: "Welch's t-test drops the equal-variance assumption.".into() },
                ContextChunk { title: "ANOVA overview".into(), text: "ANOVA assumes equal variances.".into() },
            ],
        );
        let first = req.prompt.find("[1] t-test basics").unwrap();
        let second = req.prompt.find("[2] ANOVA overview").unwrap();
        assert!(first < second);
        assert!(req.prompt.ends_with("Question: When is Welch's test used?\nAnswer:"));
        assert_eq!(req.context.len(), 2);
    }

    #[test]
    fn snippet_cuts_on_char_boundaries() {
        assert_eq!(snippet("σ² estimates", 2), "σ²…");
        assert_eq!(snippet("short", 300), "short");
    }
}

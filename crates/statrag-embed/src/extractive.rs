use async_trait::async_trait;

use statrag_core::error::Result;
use statrag_core::traits::{CompletionRequest, InferenceProvider};

const MAX_ANSWER_CHARS: usize = 400;

/// Offline answerer: no model call, the answer is lifted from the best
/// retrieved passage and attributed to the source titles.
pub struct ExtractiveInference {
    model: String,
}

impl ExtractiveInference {
    pub fn new(model: &str) -> Self { Self { model: model.to_string() } }
}

#[async_trait]
impl InferenceProvider for ExtractiveInference {
    fn name(&self) -> &str { "extractive" }
    fn model(&self) -> &str { &self.model }

    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let Some(best) = request.context.first() else {
            return Ok(format!("No documents in the knowledge base match \"{}\".", request.query.trim()));
        };
        let mut titles: Vec<&str> = Vec::new();
        for c in &request.context {
            if !titles.contains(&c.title.as_str()) { titles.push(&c.title); }
        }
        Ok(format!("According to {}: {}", titles.join(", "), excerpt(&best.text, MAX_ANSWER_CHARS)))
    }
}

/// Leading sentences of `text` up to `max_chars`, cut on a sentence end when possible.
fn excerpt(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    if text.chars().count() <= max_chars { return text.to_string(); }
    let head: String = text.chars().take(max_chars).collect();
    match head.rfind(['.', '!', '?']) {
        Some(end) if end > max_chars / 3 => head[..=end].to_string(),
        _ => format!("{}…", head.trim_end()),
    }
}

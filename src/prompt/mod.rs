
use crate::session::Turn;
use crate::store::RetrievalResult;

/// Longest email body rendered into a prompt, in characters.
pub const MAX_SNIPPET_CHARS: usize = 1500;

const TRUNCATION_MARKER: &str = "[truncated]";

/// Render retrieved emails, recent conversation and the question into one
/// grounded prompt for the generation model.
///
/// Pure string assembly: same inputs, same prompt. Sources are numbered in
/// rank order so the model can cite them, and the conversation section is
/// omitted entirely for a fresh session.
#[inline]
pub fn build_prompt(results: &[RetrievalResult], history: &[Turn], question: &str) -> String {
    let mut sections = Vec::new();

    sections.push(
        "You are an assistant answering questions about a personal email archive. \
         Use only the email excerpts below. If they do not contain the answer, \
         say so instead of guessing."
            .to_string(),
    );

    let mut excerpts = vec!["Email excerpts:".to_string()];
    for (rank, result) in results.iter().enumerate() {
        let document = &result.document;
        excerpts.push(format!(
            "[source #{}]\nSubject: {}\nFrom: {}\nDate: {}\n{}",
            rank + 1,
            document.subject,
            document.sender,
            document.date,
            truncate_body(&document.body)
        ));
    }
    sections.push(excerpts.join("\n\n"));

    if !history.is_empty() {
        let mut lines = vec!["Conversation so far:".to_string()];
        for turn in history {
            lines.push(format!("{}: {}", turn.role.label(), turn.text));
        }
        sections.push(lines.join("\n"));
    }

    sections.push(format!("Question: {}", question));
    sections.push("Answer concisely and cite the source numbers you used.".to_string());

    sections.join("\n\n")
}

/// Cap a body at [`MAX_SNIPPET_CHARS`] characters, never splitting a
/// character, and mark the cut.
fn truncate_body(body: &str) -> String {
    if body.chars().count() <= MAX_SNIPPET_CHARS {
        return body.to_string();
    }
    let mut truncated: String = body.chars().take(MAX_SNIPPET_CHARS).collect();
    truncated.push(' ');
    truncated.push_str(TRUNCATION_MARKER);
    truncated
}

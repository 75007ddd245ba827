//! Prompt templates and prompt composition for LLM usage.

use std::fmt::Write;

use crate::base::types::MessageRecord;

/// System directive sent as the first turn of every generation request.
pub const SYSTEM_DIRECTIVE: &str = "You are a helpful assistant in a conversational workspace.";

/// Header preceding the rendered history window.
pub const HISTORY_HEADER: &str = "Previous conversation:";

/// Label introducing the message being answered.
pub const CURRENT_MESSAGE_LABEL: &str = "Current message:";

/// Fixed instruction closing every prompt.
pub const RESPONSE_INSTRUCTION: &str = "Please provide a helpful response to the current message, taking into account the context from previous messages if relevant.";

/// Render the history window plus the current message into a single prompt.
///
/// `history` must already be in chronological order (oldest first); each entry becomes one
/// `User: <text>` line. The output depends only on the inputs, so identical inputs always
/// produce identical bytes. No length truncation happens here: the size of the window is
/// bounded by the history limit used when fetching.
pub fn build_prompt(current_text: &str, history: &[MessageRecord]) -> String {
    let mut prompt = String::new();

    prompt.push_str(HISTORY_HEADER);
    prompt.push('\n');

    for record in history {
        // Writing into a `String` cannot fail.
        let _ = writeln!(prompt, "User: {}", record.text);
    }

    let _ = write!(prompt, "\n{CURRENT_MESSAGE_LABEL} {current_text}\n\n{RESPONSE_INSTRUCTION}");

    prompt
}

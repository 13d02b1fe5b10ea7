//! Text preparation for embedding input.
//!
//! Conversation windows are joined with a single space. Persona text is the
//! system prompt with template slots such as `{user_name}` removed, or the
//! description when the prompt is blank.

use sha2::{Digest, Sha256};

/// Join message contents into one embedding input, skipping blank messages.
pub fn join_messages<'a, I>(contents: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    contents
        .into_iter()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Text that defines a persona for embedding.
pub fn persona_profile_text(description: &str, system_prompt: &str) -> String {
    let prompt = strip_template_slots(system_prompt);
    let prompt = collapse_whitespace(&prompt);

    if prompt.is_empty() {
        collapse_whitespace(description)
    } else {
        prompt
    }
}

/// Hash of an embedding input, used to detect when a profile must be re-embedded.
pub fn content_hash(text: &str) -> [u8; 32] {
    Sha256::digest(text.as_bytes()).into()
}

fn strip_template_slots(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find('{') {
        match rest[start..].find('}') {
            Some(len) => {
                out.push_str(&rest[..start]);
                rest = &rest[start + len + 1..];
            }
            None => break,
        }
    }
    out.push_str(rest);
    out
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_skips_blank_messages() {
        let joined = join_messages(["  hello ", "", "   ", "world"]);
        assert_eq!(joined, "hello world");
    }

    #[test]
    fn test_join_empty() {
        assert_eq!(join_messages(Vec::<&str>::new()), "");
    }

    #[test]
    fn test_profile_text_strips_slots() {
        let text = persona_profile_text("", "You coach {user_name} on\n   careers.");
        assert_eq!(text, "You coach on careers.");
    }

    #[test]
    fn test_profile_text_unterminated_slot_kept() {
        let text = persona_profile_text("", "Braces { stay here");
        assert_eq!(text, "Braces { stay here");
    }

    #[test]
    fn test_profile_text_falls_back_to_description() {
        let text = persona_profile_text("  A shy genius programmer. ", "  {slot} ");
        assert_eq!(text, "A shy genius programmer.");
    }

    #[test]
    fn test_content_hash() {
        assert_eq!(content_hash("abc"), content_hash("abc"));
        assert_ne!(content_hash("abc"), content_hash("abd"));
    }
}

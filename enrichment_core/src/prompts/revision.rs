//! Prompts for rewriting source content with accepted suggestions applied.

use campaign_model::ContentAnalysisItem;

/// System prompt for content revision.
pub const REVISION_SYSTEM_PROMPT: &str = "\
You are an editor for a tabletop role-playing campaign archive. You revise \
narrative text so that it reflects a set of accepted corrections and \
additions, while preserving the author's voice, structure and formatting. \
Change only what the accepted items require.

Respond with a single JSON object and nothing else:
{\"revisedContent\": \"<the full revised text>\", \"summary\": \"<one or two sentences describing the changes>\"}";

/// Render the user prompt for a revision.
pub fn revision_prompt(
    original_content: &str,
    accepted_items: &[ContentAnalysisItem],
    schema_text: Option<&str>,
) -> String {
    let mut prompt = String::new();

    prompt.push_str("## Original Content\n");
    prompt.push_str(original_content);
    prompt.push_str("\n\n");

    prompt.push_str("## Accepted Changes\n");
    for (i, item) in accepted_items.iter().enumerate() {
        prompt.push_str(&format!(
            "{}. [{}] {}\n",
            i + 1,
            item.detection_type.as_str(),
            item.matched_text
        ));
        if let Some((label, note)) = item
            .suggested_content
            .as_ref()
            .and_then(|payload| payload.revision_note())
        {
            let label = if label == "description" { "Description" } else { "Suggestion" };
            prompt.push_str(&format!("   {}: {}\n", label, note.trim()));
        }
    }
    prompt.push('\n');

    if let Some(schema) = schema_text.map(str::trim).filter(|s| !s.is_empty()) {
        prompt.push_str("## Game System Schema\n");
        prompt.push_str(schema);
        prompt.push_str("\n\n");
    }

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use campaign_model::{DescriptionUpdate, DetectionType, SuggestionPayload};

    #[test]
    fn test_revision_prompt_lists_items() {
        let update = ContentAnalysisItem::suggestion(
            "Kael",
            None,
            SuggestionPayload::DescriptionUpdate(DescriptionUpdate {
                suggested_description: "Kael is one-eyed.".to_string(),
                ..Default::default()
            }),
        );
        let mention = ContentAnalysisItem::detection(DetectionType::WikiLink, "[[Mira]]", None);

        let prompt = revision_prompt("Kael left.", &[update, mention], Some("  "));

        assert!(prompt.contains("## Original Content\nKael left."));
        assert!(prompt.contains("1. [description_update] Kael"));
        assert!(prompt.contains("   Suggestion: Kael is one-eyed."));
        assert!(prompt.contains("2. [wiki_link] [[Mira]]"));
        assert!(!prompt.contains("Game System Schema"));
    }

    #[test]
    fn test_revision_prompt_includes_schema() {
        let prompt = revision_prompt("text", &[], Some("hp: int"));
        assert!(prompt.contains("## Game System Schema\nhp: int"));
    }
}

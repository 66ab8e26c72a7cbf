//! User prompts for entity enrichment and new-entity detection.

use campaign_model::{Entity, Relationship};

use super::push_retrieved_context;
use crate::context_builder::RetrievedContext;

/// Inputs for an entity enrichment prompt.
#[derive(Debug, Clone, Copy)]
pub struct EnrichmentPrompt<'a> {
    pub entity: &'a Entity,
    pub content: &'a str,
    pub other_entities: &'a [Entity],
    pub relationships: &'a [Relationship],
    pub context: &'a RetrievedContext,
    /// Maximum characters of `content` to include.
    pub content_char_budget: usize,
}

impl EnrichmentPrompt<'_> {
    /// Render the user prompt.
    pub fn render(&self) -> String {
        let mut prompt = String::new();

        prompt.push_str("## Source Content\n");
        prompt.push_str(&truncate_content(
            self.content,
            &self.entity.name,
            self.content_char_budget,
        ));
        prompt.push_str("\n\n");

        prompt.push_str("## Entity\n");
        prompt.push_str(&format!("ID: {}\n", self.entity.id));
        prompt.push_str(&format!("Name: {}\n", self.entity.name));
        prompt.push_str(&format!("Type: {}\n", self.entity.entity_type));
        prompt.push_str("Current description: ");
        if self.entity.description.trim().is_empty() {
            prompt.push_str("(none)");
        } else {
            prompt.push_str(self.entity.description.trim());
        }
        prompt.push_str("\n\n");

        if !self.relationships.is_empty() {
            prompt.push_str("## Existing Relationships\n");
            for rel in self.relationships {
                prompt.push_str(&format!("- {}\n", rel.to_arrow_string()));
            }
            prompt.push('\n');
        }

        let others: Vec<&Entity> = self
            .other_entities
            .iter()
            .filter(|e| e.id != self.entity.id)
            .collect();
        if !others.is_empty() {
            prompt.push_str("## Other Entities Mentioned\n");
            for other in others {
                prompt.push_str(&format!(
                    "- {} ({}, id {})\n",
                    other.name, other.entity_type, other.id
                ));
            }
            prompt.push('\n');
        }

        push_retrieved_context(&mut prompt, self.context);
        prompt
    }
}

/// Render the user prompt for new-entity detection.
pub fn new_entity_prompt(
    content: &str,
    known_entities: &[Entity],
    context: &RetrievedContext,
    content_char_budget: usize,
) -> String {
    let mut prompt = String::new();

    prompt.push_str("## Source Content\n");
    prompt.push_str(&truncate_content(content, "", content_char_budget));
    prompt.push_str("\n\n");

    prompt.push_str("## Known Entities\n");
    if known_entities.is_empty() {
        prompt.push_str("(none)\n");
    }
    for entity in known_entities {
        prompt.push_str(&format!("- {} ({})\n", entity.name, entity.entity_type));
    }
    prompt.push('\n');

    push_retrieved_context(&mut prompt, context);
    prompt
}

/// Cut `content` down to `max_chars` characters, centred on the first
/// case-insensitive occurrence of `focus`.
///
/// Works on `char` boundaries only, so multi-byte text is never split, and
/// the window always contains the whole focus term when it fits. When
/// `focus` is empty or absent the window starts at the beginning. Elided
/// ends are marked with `...`, and the markers count against `max_chars`.
pub fn truncate_content(content: &str, focus: &str, max_chars: usize) -> String {
    let chars: Vec<char> = content.chars().collect();
    if chars.len() <= max_chars {
        return content.to_string();
    }

    let focus: Vec<char> = focus.trim().chars().map(fold_case).collect();
    let idx = find_folded(&chars, &focus);

    // No room for markers, so return the bare window.
    if max_chars <= 2 * ELISION.len() {
        let start = window_start(&chars, &focus, idx, max_chars);
        return chars[start..start + max_chars].iter().collect();
    }

    let window = max_chars - 2 * ELISION.len();
    let mut start = window_start(&chars, &focus, idx, window);
    let mut end = start + window;
    // A missing marker on one side hands its room back to the text.
    if start == 0 {
        end += ELISION.len();
    } else if end == chars.len() {
        start -= ELISION.len();
    }

    let mut out = String::with_capacity(max_chars);
    if start > 0 {
        out.push_str(ELISION);
    }
    out.extend(&chars[start..end]);
    if end < chars.len() {
        out.push_str(ELISION);
    }
    out
}

const ELISION: &str = "...";

fn window_start(chars: &[char], focus: &[char], idx: Option<usize>, window: usize) -> usize {
    match idx {
        Some(idx) => {
            let centre = idx + focus.len() / 2;
            centre
                .saturating_sub(window / 2)
                .min(chars.len() - window)
                .min(idx)
        }
        None => 0,
    }
}

/// Single-char lowercase mapping, so folded and original indices line up.
fn fold_case(c: char) -> char {
    c.to_lowercase().next().unwrap_or(c)
}

fn find_folded(haystack: &[char], needle: &[char]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|w| w.iter().zip(needle).all(|(a, b)| fold_case(*a) == *b))
}

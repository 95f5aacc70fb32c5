//! Tolerant parsing of LLM responses into typed values.
//!
//! The model is asked for bare JSON but often wraps it anyway: markdown
//! fences, leading prose, a stray trailing comma. Rather than hand-fix
//! one failure mode at a time, [`extract_json`] collects every plausible
//! JSON candidate in the response -- the whole trimmed text, the body of
//! each fenced code block, and the first balanced `{...}`/`[...]` span --
//! and tries each one as-is and again with trailing commas repaired.
//!
//! Unknown fields are ignored and missing fields fall back to serde
//! defaults on the target types; anything beyond that is the caller's
//! per-generator fallback.

use serde::de::DeserializeOwned;

use fateloom_types::enums::Intent;

use crate::error::AgentError;

/// Parse a typed value out of a raw LLM response.
///
/// # Errors
///
/// Returns [`AgentError::Format`] when no candidate deserialises;
/// callers substitute their per-generator defaults.
pub fn extract_json<T: DeserializeOwned>(raw: &str) -> Result<T, AgentError> {
    for candidate in json_candidates(raw) {
        if let Ok(parsed) = serde_json::from_str::<T>(&candidate) {
            return Ok(parsed);
        }
        let repaired = remove_trailing_commas(&candidate);
        if repaired != candidate
            && let Ok(parsed) = serde_json::from_str::<T>(&repaired)
        {
            return Ok(parsed);
        }
    }
    Err(AgentError::Format(format!(
        "no parseable JSON in response: {}",
        preview(raw)
    )))
}

/// Parse an intent token, tolerating case and separator variations.
///
/// Unknown tokens fall back to the default intent (exploration) rather
/// than erroring: a misclassified turn still plays.
pub fn parse_intent(s: &str) -> Intent {
    let quoted = format!("\"{}\"", s.trim());
    if let Ok(intent) = serde_json::from_str::<Intent>(&quoted) {
        return intent;
    }
    match s.trim().to_uppercase().replace([' ', '-'], "_").as_str() {
        "COMBAT" | "ATTACK" | "FIGHT" => Intent::Combat,
        "NPC_DIALOGUE" | "DIALOGUE" | "TALK" => Intent::NpcDialogue,
        "SYSTEM_QUERY" | "QUERY" => Intent::SystemQuery,
        "QUEST_ACTION" | "QUEST" => Intent::QuestAction,
        "CLASS_SELECTION" | "CLASS" => Intent::ClassSelection,
        "SKILL_MENU" | "SKILLS" => Intent::SkillMenu,
        "USE_SKILL" | "SKILL_USE" => Intent::UseSkill,
        "SKILL_EVOLUTION" | "EVOLVE" => Intent::SkillEvolution,
        "SKILL_FUSION" | "FUSE" | "FUSION" => Intent::SkillFusion,
        "STATUS_MENU" | "STATUS" => Intent::StatusMenu,
        "INVENTORY_MENU" | "INVENTORY" => Intent::InventoryMenu,
        _ => Intent::Exploration,
    }
}

// ---------------------------------------------------------------------------
// Candidate collection
// ---------------------------------------------------------------------------

/// Collect the texts worth handing to the deserialiser, in the order they
/// should be tried: the trimmed whole, each fenced block's body, and the
/// first balanced brace/bracket span.
fn json_candidates(raw: &str) -> Vec<String> {
    let trimmed = raw.trim();
    let mut candidates = vec![String::from(trimmed)];

    // Markdown fences split the text into prose/block/prose/block/...;
    // every odd segment is a block body, possibly led by a language tag
    // on its own line.
    for (segment_index, segment) in trimmed.split("```").enumerate() {
        if segment_index % 2 == 0 {
            continue;
        }
        let body = match segment.split_once('\n') {
            Some((first_line, rest)) if is_language_tag(first_line) => rest,
            _ => segment,
        };
        let body = body.trim();
        if !body.is_empty() {
            candidates.push(String::from(body));
        }
    }

    if let Some(span) = balanced_span(trimmed) {
        candidates.push(String::from(span));
    }

    candidates
}

/// Whether a fence's first line looks like a language tag (`json`,
/// `JSON5`, or empty) rather than content.
fn is_language_tag(line: &str) -> bool {
    let line = line.trim();
    line.is_empty() || line.chars().all(char::is_alphanumeric)
}

/// The first balanced `{...}` or `[...]` span, respecting string
/// literals. Picks JSON out of surrounding prose when the model skipped
/// the fence entirely.
fn balanced_span(text: &str) -> Option<&str> {
    let open = text.find(['{', '['])?;
    let tail = text.get(open..)?;

    let mut depth: u32 = 0;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, ch) in tail.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' | '[' => depth = depth.saturating_add(1),
            '}' | ']' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return tail.get(..offset.saturating_add(ch.len_utf8()));
                }
            }
            _ => {}
        }
    }
    None
}

/// Drop commas that sit directly before a closing brace or bracket, a
/// habit several models share. Commas inside string literals are left
/// alone.
fn remove_trailing_commas(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;
    for (index, ch) in text.char_indices() {
        if in_string {
            out.push(ch);
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => {
                in_string = true;
                out.push(ch);
            }
            ',' => {
                // A comma is only kept when something other than a
                // closer follows it.
                let next = text
                    .get(index.saturating_add(1)..)
                    .and_then(|rest| rest.chars().find(|c| !c.is_whitespace()));
                if !matches!(next, Some('}' | ']')) {
                    out.push(ch);
                }
            }
            _ => out.push(ch),
        }
    }
    out
}

/// Bound a raw response for inclusion in an error message.
fn preview(raw: &str) -> &str {
    let trimmed = raw.trim();
    let mut end = trimmed.len().min(200);
    while end > 0 && !trimmed.is_char_boundary(end) {
        end = end.saturating_sub(1);
    }
    trimmed.get(..end).unwrap_or("")
}

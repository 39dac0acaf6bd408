//! Entity resolution: map free text onto one of a fetched candidate list.

use crate::types::EntityCandidate;

/// Pick the candidate a user's answer refers to.
///
/// A 1-based index within range wins; otherwise the first candidate whose
/// name equals the trimmed input, ignoring case.
pub fn resolve<'a>(candidates: &'a [EntityCandidate], raw_input: &str) -> Option<&'a EntityCandidate> {
    let trimmed = raw_input.trim();

    if let Ok(n) = trimmed.parse::<usize>() {
        if (1..=candidates.len()).contains(&n) {
            return candidates.get(n - 1);
        }
    }

    let wanted = trimmed.to_lowercase();
    candidates.iter().find(|c| c.name.to_lowercase() == wanted)
}

/// Render candidates as a numbered list, one per line.
///
/// Used for both the first selection prompt and every re-prompt, so an
/// index a user has already seen stays valid.
pub fn format_list(candidates: &[EntityCandidate]) -> String {
    candidates
        .iter()
        .enumerate()
        .map(|(i, c)| format!("{}. {}", i + 1, c.name))
        .collect::<Vec<_>>()
        .join("\n")
}

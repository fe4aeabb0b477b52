//! Name resolution against the runtime cache.
//!
//! Emote names are not unique and aliases are private to their owner, so a
//! single piece of text can match several emotes. Resolution picks one of them
//! deterministically for a given cache state:
//!
//! 1. a lone candidate wins;
//! 2. otherwise an emote the caller registered wins;
//! 3. otherwise the candidate registered first wins.

use std::cmp::Reverse;

use eevee_db::entities::emote;

use super::cache::CacheState;

/// Inline form `<a:name:id>` or `:name:` reduced to `name`, case-folded.
#[must_use]
pub fn normalize(raw: &str) -> String {
    let trimmed = raw.trim();
    let inner = if trimmed.matches(':').count() == 2 {
        trimmed.split(':').nth(1).unwrap_or(trimmed)
    } else {
        trimmed.trim_matches(':')
    };

    inner.trim().to_lowercase()
}

/// Alias text as stored: colons removed, surrounding whitespace trimmed.
#[must_use]
pub fn clean_alias(raw: &str) -> String {
    raw.replace(':', "").trim().to_string()
}

/// Texts enclosed between pairs of `:` in a message, e.g. `pog` and `kek` in
/// `"hi :pog: and :kek:"`.
#[must_use]
pub fn inline_tokens(content: &str) -> Vec<&str> {
    let segments: Vec<&str> = content.split(':').collect();
    segments
        .iter()
        .enumerate()
        .skip(1)
        .step_by(2)
        .filter(|(i, _)| *i + 1 < segments.len())
        .map(|(_, token)| *token)
        .filter(|token| !token.is_empty() && !token.contains(char::is_whitespace))
        .collect()
}

/// Whether `emote` is a candidate for `normalized` as seen by `user_id`.
fn is_candidate(state: &CacheState, user_id: &str, emote: &emote::Model, normalized: &str) -> bool {
    emote.name.to_lowercase() == normalized
        || state
            .owned_aliases_of(&emote.id, user_id)
            .any(|a| a.matches(normalized))
}

/// Resolve raw input to an emote for `user_id`.
///
/// Among several candidates the caller's own registration wins; otherwise the
/// first candidate in cache order is returned. That fallback follows insertion
/// order and is not a stable contract: register a unique alias to pin a match.
#[must_use]
pub fn resolve<'a>(state: &'a CacheState, user_id: &str, raw: &str) -> Option<&'a emote::Model> {
    let normalized = normalize(raw);
    if normalized.is_empty() {
        return None;
    }

    let mut first = None;
    for emote in state.emotes() {
        if !is_candidate(state, user_id, emote, &normalized) {
            continue;
        }
        if emote.adder_id == user_id {
            return Some(emote);
        }
        if first.is_none() {
            first = Some(emote);
        }
    }

    first
}

/// Resolve several tokens, dropping the ones that match nothing.
#[must_use]
pub fn resolve_many<'a, S: AsRef<str>>(
    state: &'a CacheState,
    user_id: &str,
    tokens: &[S],
) -> Vec<&'a emote::Model> {
    tokens
        .iter()
        .filter_map(|token| resolve(state, user_id, token.as_ref()))
        .collect()
}

/// Every emote, animated first, then by how many aliases the caller holds on
/// it. Ties keep registration order.
#[must_use]
pub fn list<'a>(state: &'a CacheState, user_id: &str) -> Vec<&'a emote::Model> {
    let mut emotes: Vec<&emote::Model> = state.emotes().collect();
    emotes.sort_by_key(|e| {
        (
            Reverse(e.is_animated),
            Reverse(state.owned_aliases_of(&e.id, user_id).count()),
        )
    });
    emotes
}

/// Emotes whose name, or one of the caller's aliases, contains `query`.
#[must_use]
pub fn search<'a>(state: &'a CacheState, user_id: &str, query: &str) -> Vec<&'a emote::Model> {
    let needle = clean_alias(query).to_lowercase();
    if needle.is_empty() {
        return Vec::new();
    }

    list(state, user_id)
        .into_iter()
        .filter(|e| {
            e.name.to_lowercase().contains(&needle)
                || state
                    .owned_aliases_of(&e.id, user_id)
                    .any(|a| a.alias.to_lowercase().contains(&needle))
        })
        .collect()
}

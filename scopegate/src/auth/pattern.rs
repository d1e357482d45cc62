//! Wildcard matching of member identifiers against group membership entries.
//!
//! A membership entry is `local@domain` where each part is either a literal (no `*`) or exactly
//! `*`. A `*` part matches any non-empty value; literal parts compare case-sensitively. Partial
//! wildcards such as `john*@example.com` or `john@example.*` are malformed and never match.
//!
//! Matching is total: malformed input yields `false`, never an error.

const WILDCARD: &str = "*";

/// Split `value` into `(local, domain)` if it contains exactly one `@`.
fn split_address(value: &str) -> Option<(&str, &str)> {
    let (local, domain) = value.split_once('@')?;
    if domain.contains('@') {
        return None;
    }
    Some((local, domain))
}

fn is_valid_pattern_part(part: &str) -> bool {
    part == WILDCARD || (!part.is_empty() && !part.contains('*'))
}

/// Whether `pattern` is a well-formed membership entry (literal or whole-part wildcard).
pub fn is_valid_member_pattern(pattern: &str) -> bool {
    match split_address(pattern) {
        Some((local, domain)) => is_valid_pattern_part(local) && is_valid_pattern_part(domain),
        None => false,
    }
}

/// Whether `pattern` is well-formed and uses at least one wildcard part.
pub fn is_wildcard_member_pattern(pattern: &str) -> bool {
    is_valid_member_pattern(pattern) && pattern.contains('*')
}

fn part_matches(value: &str, pattern: &str) -> bool {
    if pattern == WILDCARD {
        !value.is_empty()
    } else {
        value == pattern
    }
}

/// Decide whether `member_id` is covered by the membership entry `pattern`.
pub fn matches(member_id: &str, pattern: &str) -> bool {
    if member_id.contains('*') || !is_valid_member_pattern(pattern) {
        return false;
    }
    let (Some((member_local, member_domain)), Some((pattern_local, pattern_domain))) = (split_address(member_id), split_address(pattern))
    else {
        return false;
    };

    part_matches(member_local, pattern_local) && part_matches(member_domain, pattern_domain)
}

/// Whether a group member list entry covers `member_id`.
///
/// Wildcard entries go through [`matches`]. Literal entries compare by exact equality, so
/// identifiers that are not email shaped (API key revoke ids) can still be listed as members.
pub fn member_entry_matches(member_id: &str, entry: &str) -> bool {
    if member_id.is_empty() {
        return false;
    }
    if entry.contains('*') {
        matches(member_id, entry)
    } else {
        member_id == entry
    }
}

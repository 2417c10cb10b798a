use std::collections::HashSet;

/// Lowercases, replaces punctuation with spaces and collapses whitespace.
pub fn normalize_title(title: &str) -> String {
    let spaced: String = title
        .to_lowercase()
        .chars()
        .map(|ch| if ch.is_alphanumeric() { ch } else { ' ' })
        .collect();
    spaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Two titles match when their normalized forms are equal, or when
/// `threshold < 1.0` and their normalized Levenshtein similarity reaches it.
pub fn titles_match(left: &str, right: &str, threshold: f64) -> bool {
    let left = normalize_title(left);
    let right = normalize_title(right);
    if left == right {
        return true;
    }
    if threshold >= 1.0 || left.is_empty() || right.is_empty() {
        return false;
    }
    strsim::normalized_levenshtein(&left, &right) >= threshold
}

pub fn tokens(text: &str) -> HashSet<String> {
    normalize_title(text)
        .split(' ')
        .filter(|token| is_significant(token))
        .map(str::to_string)
        .collect()
}

// Single letters are noise, single digits ("iphone 5") are not.
fn is_significant(token: &str) -> bool {
    if token.is_empty() {
        return false;
    }
    token.chars().count() >= 2 || token.chars().all(|ch| ch.is_ascii_digit())
}

/// True when `title` shares at least one significant token with `query`.
/// Queries with no significant tokens match everything.
pub fn matches_query(query: &str, title: &str) -> bool {
    let wanted = tokens(query);
    if wanted.is_empty() {
        return true;
    }
    let offered = tokens(title);
    wanted.iter().any(|token| offered.contains(token))
}

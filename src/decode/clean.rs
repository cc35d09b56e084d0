//! Uniform text cleaning shared by every grammar.

/// Collapse runs of whitespace to a single space and trim both ends.
pub fn clean_text(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalize a gender marker by case-insensitive prefix.
///
/// `m*` → Male, `f*` → Female, `t*` → Transgender; anything else is returned
/// cleaned but otherwise untouched.
pub fn normalize_gender(value: &str) -> String {
    let cleaned = clean_text(value);
    match cleaned.chars().next().map(|c| c.to_ascii_lowercase()) {
        Some('m') => "Male".to_string(),
        Some('f') => "Female".to_string(),
        Some('t') => "Transgender".to_string(),
        _ => cleaned,
    }
}

/// Clean one locality part: whitespace collapsed, stray separators trimmed.
pub fn clean_address_part(value: &str) -> String {
    clean_text(value)
        .trim_matches(|c: char| c == ',' || c == ';' || c.is_whitespace())
        .to_string()
}

/// Join locality parts with a uniform separator, dropping the empty ones.
pub fn join_address<'a, I>(parts: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    parts
        .into_iter()
        .map(clean_address_part)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Trailing four-digit year of a date string such as `01-01-1990`.
pub fn year_of(date: &str) -> Option<String> {
    let trimmed = date.trim();
    let digits: String = trimmed
        .chars()
        .rev()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    if digits.len() == 4 {
        return Some(digits.chars().rev().collect());
    }
    // ISO dates lead with the year instead.
    let leading: String = trimmed.chars().take_while(|c| c.is_ascii_digit()).collect();
    if leading.len() == 4 {
        Some(leading)
    } else {
        None
    }
}

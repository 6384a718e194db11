//! Path pattern normalisation for coverage filters
//!
//! kcov takes each filter as one comma separated list, so a single pattern
//! can never contain a comma itself.

/// Expand a leading `~` and reject patterns kcov would misread
///
/// # Errors
///
/// Returns a message if the pattern is blank or contains a comma
pub fn normalize_pattern(pattern: &str) -> Result<String, String> {
    normalize_pattern_with_home(pattern, || {
        dirs::home_dir().and_then(|home| home.to_str().map(str::to_owned))
    })
}

/// [`normalize_pattern`] with the home directory supplied by `home`
///
/// # Errors
///
/// Returns a message if the pattern is blank or contains a comma
pub fn normalize_pattern_with_home<F>(pattern: &str, home: F) -> Result<String, String>
where
    F: FnOnce() -> Option<String>,
{
    let trimmed = pattern.trim();
    if trimmed.is_empty() {
        return Err("empty path pattern".to_string());
    }
    if trimmed.contains(',') {
        return Err(format!(
            "path pattern `{trimmed}` contains a comma; list patterns separately"
        ));
    }
    Ok(shellexpand::tilde_with_context(trimmed, home).into_owned())
}

/// Normalise every pattern, keeping order and dropping exact duplicates
///
/// # Errors
///
/// Returns the first pattern error, prefixed with the list name
pub fn normalize_patterns(list: &str, patterns: &[String]) -> Result<Vec<String>, String> {
    let mut normalized: Vec<String> = Vec::with_capacity(patterns.len());
    for pattern in patterns {
        let pattern =
            normalize_pattern(pattern).map_err(|message| format!("{list}: {message}"))?;
        if !normalized.contains(&pattern) {
            normalized.push(pattern);
        }
    }
    Ok(normalized)
}

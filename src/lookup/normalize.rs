//! Input normalization for lookup keys.

use super::errors::{LookupError, LookupResult};

const MAX_PART_LEN: usize = 50;

/// Lowercase `local@domain`, after checking there is exactly one `@`, a
/// non-empty local part of at most 50 characters, and a dotted domain of
/// at most 50 characters.
pub fn normalize_email_address(email: &str) -> LookupResult<String> {
    let parts: Vec<&str> = email.split('@').collect();
    let [local, domain] = parts.as_slice() else {
        return Err(LookupError::InvalidEmailAddress("Malformed email address".into()));
    };
    if local.is_empty() || local.chars().count() > MAX_PART_LEN {
        return Err(LookupError::InvalidEmailAddress("Malformed email address".into()));
    }
    if domain.split('.').count() < 2 || domain.chars().count() > MAX_PART_LEN {
        return Err(LookupError::InvalidEmailAddress("Malformed email domain".into()));
    }
    Ok(format!(
        "{}@{}",
        local.trim().to_lowercase(),
        domain.trim().to_lowercase()
    ))
}

/// `"COMP 11"`, `"comp   11 lecture"` and `"COMP_11"` all become `"comp 11"`.
pub fn normalize_course_cat_no(catalog_no: &str) -> LookupResult<String> {
    let trimmed = catalog_no.trim();

    let pieces: Vec<&str> = trimmed.split_whitespace().collect();
    if pieces.len() >= 2 {
        return Ok(pieces[..2].join(" ").to_lowercase());
    }

    let pieces: Vec<&str> = trimmed.split('_').collect();
    if pieces.len() >= 2 {
        return Ok(pieces[..2].join(" ").to_lowercase());
    }

    Err(LookupError::InvalidCourseCatalogNumber(
        "Malformed Course Catalog number".into(),
    ))
}

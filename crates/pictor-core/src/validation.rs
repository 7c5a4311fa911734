//! Input validation helpers.

use crate::error::{DomainError, DomainResult};
use crate::models::ImageId;

/// Display-order positions are 1-based.
pub fn validate_position(position: i32) -> DomainResult<()> {
    if position < 1 {
        return Err(DomainError::Validation(format!(
            "Position must be at least 1, got {}",
            position
        )));
    }
    Ok(())
}

pub fn validate_image_ids(ids: &[ImageId]) -> DomainResult<()> {
    if ids.is_empty() {
        return Err(DomainError::Validation(
            "Image id list must not be empty".to_string(),
        ));
    }
    let mut seen = std::collections::HashSet::with_capacity(ids.len());
    for id in ids {
        if !seen.insert(*id) {
            return Err(DomainError::Validation(format!(
                "Duplicate image id {} in input",
                id
            )));
        }
    }
    Ok(())
}

/// Rendition names become path segments; keep them filesystem- and
/// key-safe.
pub fn validate_rendition_name(name: &str) -> DomainResult<()> {
    if name.is_empty() {
        return Err(DomainError::Validation(
            "Rendition name must not be empty".to_string(),
        ));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(DomainError::Validation(format!(
            "Rendition name '{}' contains invalid characters",
            name
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_bounds() {
        assert!(validate_position(1).is_ok());
        assert!(validate_position(100).is_ok());
        assert!(validate_position(0).is_err());
        assert!(validate_position(-3).is_err());
    }

    #[test]
    fn test_empty_id_list_rejected() {
        assert!(matches!(
            validate_image_ids(&[]),
            Err(DomainError::Validation(_))
        ));
        assert!(validate_image_ids(&[1, 2, 3]).is_ok());
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        assert!(validate_image_ids(&[1, 2, 1]).is_err());
    }

    #[test]
    fn test_rendition_names() {
        assert!(validate_rendition_name("thumbnail").is_ok());
        assert!(validate_rendition_name("size_800x600").is_ok());
        assert!(validate_rendition_name("").is_err());
        assert!(validate_rendition_name("../escape").is_err());
        assert!(validate_rendition_name("a/b").is_err());
    }
}

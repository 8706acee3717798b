use crate::error::{AppError, Result};
use crate::models::package::Package;

/// Validates a username.
pub fn validate_username(username: &str) -> Result<()> {
    if username.is_empty() || username.len() < 3 {
        return Err(AppError::Validation(
            "Username must be at least 3 characters long".to_string(),
        ));
    }

    if username.len() > 255 {
        return Err(AppError::Validation(
            "Username must be at most 255 characters".to_string(),
        ));
    }

    if !username.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '-') {
        return Err(AppError::Validation(
            "Username can only contain letters, numbers, underscores, and hyphens".to_string(),
        ));
    }

    Ok(())
}

/// Validates a hardware identifier.
pub fn validate_hwid(hwid: &str) -> Result<()> {
    if hwid.is_empty() {
        return Err(AppError::Validation("Missing hwid".to_string()));
    }

    if hwid.len() > 128 {
        return Err(AppError::Validation(
            "HWID must be at most 128 characters".to_string(),
        ));
    }

    if !hwid.chars().all(|c| c.is_ascii_alphanumeric() || "-_:.".contains(c)) {
        return Err(AppError::Validation(
            "HWID can only contain letters, numbers, and -_:.".to_string(),
        ));
    }

    Ok(())
}

/// Parses a submitted package label into a known tier.
pub fn validate_package(raw: &str) -> Result<Package> {
    raw.parse()
        .map_err(|_| AppError::Validation(format!("Unknown package: {raw}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_username_rules() {
        assert!(validate_username("alice").is_ok());
        assert!(validate_username("al").is_err());
        assert!(validate_username("").is_err());
        assert!(validate_username("alice!").is_err());
        assert!(validate_username(&"a".repeat(256)).is_err());
    }

    #[test]
    fn test_hwid_rules() {
        assert!(validate_hwid("HW1").is_ok());
        assert!(validate_hwid("AB-12:cd_34.ef").is_ok());
        assert!(validate_hwid("").is_err());
        assert!(validate_hwid("white space").is_err());
    }

    #[test]
    fn test_package_labels() {
        assert_eq!(validate_package("Basis+").expect("known tier"), Package::BasisPlus);
        assert!(validate_package("Gold").is_err());
    }
}

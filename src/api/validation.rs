use super::ApiError;

pub const PASSWORD_MIN: usize = 6;
const USERNAME_MIN: usize = 3;
const USERNAME_MAX: usize = 32;

pub fn validate_username(username: &str) -> Result<&str, ApiError> {
    let trimmed = username.trim();
    if !(USERNAME_MIN..=USERNAME_MAX).contains(&trimmed.len()) {
        return Err(ApiError::validation(format!(
            "Username must be between {USERNAME_MIN} and {USERNAME_MAX} characters"
        )));
    }

    if !trimmed
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(ApiError::validation(
            "Username can only contain letters, numbers, hyphens, and underscores",
        ));
    }

    Ok(trimmed)
}

pub fn validate_password(password: &str) -> Result<&str, ApiError> {
    if password.chars().count() < PASSWORD_MIN {
        return Err(ApiError::validation(format!(
            "Password must be at least {PASSWORD_MIN} characters"
        )));
    }
    Ok(password)
}

pub fn require_field<'a>(name: &str, value: &'a str) -> Result<&'a str, ApiError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ApiError::validation(format!("{name} is required")));
    }
    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_username() {
        assert!(validate_username("alice").is_ok());
        assert!(validate_username("a_b-c9").is_ok());
        assert!(validate_username("ab").is_err());
        assert!(validate_username(&"x".repeat(33)).is_err());
        assert!(validate_username("al ice").is_err());
        assert!(validate_username("alice!").is_err());
    }

    #[test]
    fn test_validate_password() {
        assert!(validate_password("secret").is_ok());
        assert!(validate_password("12345").is_err());
    }

    #[test]
    fn test_require_field() {
        assert_eq!(require_field("id", "  T1 ").unwrap(), "T1");
        assert!(require_field("id", "   ").is_err());
    }
}

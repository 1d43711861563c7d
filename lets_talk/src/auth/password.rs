//! Password hashing and credential input rules.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString, rand_core::OsRng},
};

use super::errors::{AuthError, AuthResult};

/// Minimum password length.
pub const MIN_PASSWORD_LEN: usize = 6;

/// Argon2id hashing with a server-side pepper
#[derive(Clone)]
pub struct PasswordHasher {
    pepper: String,
}

impl PasswordHasher {
    pub fn new(pepper: String) -> Self {
        Self { pepper }
    }

    /// Hash password with Argon2id + pepper
    pub fn hash(&self, password: &str) -> AuthResult<String> {
        let peppered = format!("{}{}", password, self.pepper);
        let salt = SaltString::generate(&mut OsRng);

        Ok(Argon2::default()
            .hash_password(peppered.as_bytes(), &salt)
            .map_err(|_| AuthError::HashingFailed)?
            .to_string())
    }

    /// Check a password against a stored hash.
    ///
    /// Returns `false` for a wrong password and for an unparseable hash.
    pub fn matches(&self, password: &str, hash: &str) -> bool {
        let peppered = format!("{}{}", password, self.pepper);
        let Ok(parsed_hash) = PasswordHash::new(hash) else {
            return false;
        };

        Argon2::default()
            .verify_password(peppered.as_bytes(), &parsed_hash)
            .is_ok()
    }
}

/// Validate username format
pub fn validate_username(username: &str) -> AuthResult<()> {
    let len = username.chars().count();
    if !(3..=20).contains(&len) {
        return Err(AuthError::InvalidUsername(
            "Username must be 3-20 characters".to_string(),
        ));
    }

    if !username.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(AuthError::InvalidUsername(
            "Username can only contain letters, numbers, and underscores".to_string(),
        ));
    }

    Ok(())
}

/// Validate password length
pub fn validate_password(password: &str) -> AuthResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthError::WeakPassword(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters long"
        )));
    }
    Ok(())
}

/// Validate that the email parses as a mailbox address
pub fn validate_email(email: &str) -> AuthResult<()> {
    email
        .parse::<lettre::Address>()
        .map(|_| ())
        .map_err(|_| AuthError::InvalidEmail)
}

/// Canonical form used for lookups and storage.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_match() {
        let hasher = PasswordHasher::new("test_pepper_0123456789".to_string());
        let hash = hasher.hash("hunter22").unwrap();

        assert!(hash.starts_with("$argon2"));
        assert!(hasher.matches("hunter22", &hash));
        assert!(!hasher.matches("hunter23", &hash));
        assert!(!hasher.matches("hunter22", "not-a-hash"));
    }

    #[test]
    fn test_pepper_is_part_of_the_hash() {
        let hash = PasswordHasher::new("pepper_one_0123456".to_string())
            .hash("hunter22")
            .unwrap();
        let other = PasswordHasher::new("pepper_two_0123456".to_string());
        assert!(!other.matches("hunter22", &hash));
    }

    #[test]
    fn test_username_rules() {
        assert!(validate_username("alice_01").is_ok());
        assert!(validate_username("al").is_err());
        assert!(validate_username("a".repeat(21).as_str()).is_err());
        assert!(validate_username("alice!").is_err());
    }

    #[test]
    fn test_password_and_email_rules() {
        assert!(validate_password("12345").is_err());
        assert!(validate_password("123456").is_ok());

        assert!(validate_email("a@x.com").is_ok());
        assert!(matches!(
            validate_email("not-an-email"),
            Err(AuthError::InvalidEmail)
        ));
        assert_eq!(normalize_email("  A@X.com "), "a@x.com");
    }
}

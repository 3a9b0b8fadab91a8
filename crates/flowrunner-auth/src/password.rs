//! Argon2id password hashing, strength validation, and generation.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2, Params, Version,
};
use zeroize::Zeroizing;

use crate::config::PasswordConfig;
use crate::error::{AccountError, AccountResult};

#[derive(Clone)]
pub struct PasswordService {
    config: PasswordConfig,
}

impl PasswordService {
    pub fn new(config: PasswordConfig) -> Self {
        Self { config }
    }

    pub fn hash_password(&self, password: &str) -> AccountResult<String> {
        self.validate_password_strength(password)?;

        let password_with_pepper = if let Some(ref pepper) = self.config.pepper {
            Zeroizing::new(format!("{}{}", password, pepper))
        } else {
            Zeroizing::new(password.to_string())
        };

        let salt = SaltString::generate(&mut OsRng);

        let params = Params::new(
            self.config.memory_cost,
            self.config.time_cost,
            self.config.parallelism,
            Some(self.config.hash_length as usize),
        )
        .map_err(|e| AccountError::Internal(format!("invalid argon2 params: {}", e)))?;

        let argon2 = Argon2::new(argon2::Algorithm::Argon2id, Version::V0x13, params);

        let hash = argon2
            .hash_password(password_with_pepper.as_bytes(), &salt)
            .map_err(|_| AccountError::Internal("password hashing failed".to_string()))?;

        Ok(hash.to_string())
    }

    pub fn verify_password(&self, password: &str, hash: &str) -> AccountResult<bool> {
        let password_with_pepper = if let Some(ref pepper) = self.config.pepper {
            Zeroizing::new(format!("{}{}", password, pepper))
        } else {
            Zeroizing::new(password.to_string())
        };

        let parsed_hash =
            PasswordHash::new(hash).map_err(|_| AccountError::InvalidCredentials)?;

        let argon2 = Argon2::default();
        match argon2.verify_password(password_with_pepper.as_bytes(), &parsed_hash) {
            Ok(_) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(_) => Err(AccountError::InvalidCredentials),
        }
    }

    pub fn validate_password_strength(&self, password: &str) -> AccountResult<()> {
        let mut errors = Vec::new();

        if password.len() < self.config.min_password_length {
            errors.push(format!(
                "password must be at least {} characters",
                self.config.min_password_length
            ));
        }
        if password.len() > self.config.max_password_length {
            errors.push(format!(
                "password must be at most {} characters",
                self.config.max_password_length
            ));
        }
        if self.config.require_uppercase && !password.chars().any(|c| c.is_uppercase()) {
            errors.push("password must contain at least one uppercase letter".to_string());
        }
        if self.config.require_lowercase && !password.chars().any(|c| c.is_lowercase()) {
            errors.push("password must contain at least one lowercase letter".to_string());
        }
        if self.config.require_digit && !password.chars().any(|c| c.is_ascii_digit()) {
            errors.push("password must contain at least one digit".to_string());
        }
        if self.config.require_special && !password.chars().any(|c| !c.is_alphanumeric()) {
            errors.push("password must contain at least one special character".to_string());
        }

        let common_passwords = [
            "password", "123456", "12345678", "qwerty", "abc123", "monkey", "1234567",
            "letmein", "trustno1", "dragon", "baseball", "iloveyou", "master", "sunshine",
            "ashley", "michael", "shadow", "123123", "654321", "password1",
        ];
        let lowercase = password.to_lowercase();
        if common_passwords.iter().any(|&c| lowercase.contains(c)) {
            errors.push("password is too common".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(AccountError::WeakPassword(errors.join("; ")))
        }
    }

    pub fn needs_rehash(&self, hash: &str) -> bool {
        match PasswordHash::new(hash) {
            Ok(parsed) => match parsed.hash {
                Some(output) => output.len() != self.config.hash_length as usize,
                None => true,
            },
            Err(_) => true,
        }
    }

    pub fn generate_password(&self, length: usize) -> String {
        use rand::Rng;

        let length = length.max(self.config.min_password_length);

        let uppercase = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";
        let lowercase = "abcdefghijklmnopqrstuvwxyz";
        let digits = "0123456789";
        let special = "!@#$%^&*()_+-=[]{}|;:,.<>?";

        let mut rng = rand::thread_rng();
        let mut password = String::with_capacity(length);

        let mut required = Vec::new();
        if self.config.require_uppercase {
            required.push(uppercase.chars().nth(rng.gen_range(0..uppercase.len())).unwrap());
        }
        if self.config.require_lowercase {
            required.push(lowercase.chars().nth(rng.gen_range(0..lowercase.len())).unwrap());
        }
        if self.config.require_digit {
            required.push(digits.chars().nth(rng.gen_range(0..digits.len())).unwrap());
        }
        if self.config.require_special {
            required.push(special.chars().nth(rng.gen_range(0..special.len())).unwrap());
        }

        let mut all_chars = String::new();
        all_chars.push_str(uppercase);
        all_chars.push_str(lowercase);
        all_chars.push_str(digits);
        if self.config.require_special {
            all_chars.push_str(special);
        }

        let remaining = length.saturating_sub(required.len());
        for _ in 0..remaining {
            password.push(all_chars.chars().nth(rng.gen_range(0..all_chars.len())).unwrap());
        }
        for c in required {
            let pos = rng.gen_range(0..=password.len());
            password.insert(pos, c);
        }

        password
    }

    pub fn calculate_entropy(&self, password: &str) -> f64 {
        let mut charset_size = 0;
        if password.chars().any(|c| c.is_lowercase()) {
            charset_size += 26;
        }
        if password.chars().any(|c| c.is_uppercase()) {
            charset_size += 26;
        }
        if password.chars().any(|c| c.is_ascii_digit()) {
            charset_size += 10;
        }
        if password.chars().any(|c| !c.is_alphanumeric()) {
            charset_size += 32;
        }
        if charset_size == 0 {
            return 0.0;
        }
        password.len() as f64 * (charset_size as f64).log2()
    }

    pub fn get_strength_level(&self, password: &str) -> PasswordStrength {
        let entropy = self.calculate_entropy(password);
        if entropy < 28.0 {
            PasswordStrength::VeryWeak
        } else if entropy < 36.0 {
            PasswordStrength::Weak
        } else if entropy < 60.0 {
            PasswordStrength::Reasonable
        } else if entropy < 128.0 {
            PasswordStrength::Strong
        } else {
            PasswordStrength::VeryStrong
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordStrength {
    VeryWeak,
    Weak,
    Reasonable,
    Strong,
    VeryStrong,
}

impl PasswordStrength {
    pub fn level(&self) -> u8 {
        match self {
            Self::VeryWeak => 0,
            Self::Weak => 1,
            Self::Reasonable => 2,
            Self::Strong => 3,
            Self::VeryStrong => 4,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> PasswordConfig {
        PasswordConfig {
            memory_cost: 4096,
            time_cost: 1,
            parallelism: 1,
            hash_length: 32,
            pepper: None,
            min_password_length: 8,
            max_password_length: 128,
            require_uppercase: true,
            require_lowercase: true,
            require_digit: true,
            require_special: false,
        }
    }

    #[test]
    fn hash_and_verify_roundtrip() {
        let service = PasswordService::new(test_config());
        let password = "MySecureP@ss123";

        let hash = service.hash_password(password).unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(service.verify_password(password, &hash).unwrap());
        assert!(!service.verify_password("wrongpassword", &hash).unwrap());
    }

    #[test]
    fn pepper_changes_the_derived_hash() {
        let mut config = test_config();
        config.pepper = Some("secret-pepper".to_string());
        let service = PasswordService::new(config);

        let password = "MySecureP@ss123";
        let hash = service.hash_password(password).unwrap();
        assert!(service.verify_password(password, &hash).unwrap());

        let service_no_pepper = PasswordService::new(test_config());
        assert!(!service_no_pepper.verify_password(password, &hash).unwrap());
    }

    #[test]
    fn strength_validation_rejects_weak_passwords() {
        let service = PasswordService::new(test_config());
        assert!(service.validate_password_strength("MySecureP@ss123").is_ok());
        assert!(service.validate_password_strength("Short1").is_err());
        assert!(service.validate_password_strength("mysecurepass123").is_err());
        assert!(service.validate_password_strength("MYSECUREPASS123").is_err());
        assert!(service.validate_password_strength("MySecurePassword").is_err());
        assert!(service.validate_password_strength("Password123").is_err());
    }

    #[test]
    fn generated_passwords_pass_their_own_validation() {
        let service = PasswordService::new(test_config());
        let password = service.generate_password(16);
        assert!(password.len() >= 16);
        assert!(service.validate_password_strength(&password).is_ok());
    }

    #[test]
    fn same_password_hashes_differently_each_time() {
        let service = PasswordService::new(test_config());
        let password = "MySecureP@ss123";
        let hash1 = service.hash_password(password).unwrap();
        let hash2 = service.hash_password(password).unwrap();
        assert_ne!(hash1, hash2);
        assert!(service.verify_password(password, &hash1).unwrap());
        assert!(service.verify_password(password, &hash2).unwrap());
    }
}

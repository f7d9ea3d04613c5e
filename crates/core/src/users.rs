//! Account rules: username and password constraints, avatar handling.

use rand::seq::IndexedRandom;

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

pub const MIN_USERNAME_LENGTH: usize = 3;
pub const MAX_USERNAME_LENGTH: usize = 50;
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Seed names for generated avatars.
const AVATAR_SEEDS: &[&str] = &[
    "Luis",
    "Mackenzie",
    "Aidan",
    "Maria",
    "George",
    "Caleb",
    "Brooklynn",
];

const AVATAR_BASE_URL: &str = "https://api.dicebear.com/9.x/notionists/svg?seed=";

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Usernames are 3 to 50 ASCII letters, digits, or underscores.
pub fn validate_username(username: &str) -> Result<(), CoreError> {
    let mut errors = Vec::new();
    let len = username.chars().count();
    if !(MIN_USERNAME_LENGTH..=MAX_USERNAME_LENGTH).contains(&len) {
        errors.push(format!(
            "Username must be between {MIN_USERNAME_LENGTH} and {MAX_USERNAME_LENGTH} characters"
        ));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        errors.push("Username can only contain letters, numbers, and underscores".to_string());
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(CoreError::Validation(errors))
    }
}

pub fn validate_password(password: &str) -> Result<(), CoreError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(CoreError::validation(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Validate registration input, reporting username and password problems together.
pub fn validate_registration(username: &str, password: &str) -> Result<(), CoreError> {
    let mut errors = Vec::new();
    for result in [validate_username(username), validate_password(password)] {
        if let Err(CoreError::Validation(mut msgs)) = result {
            errors.append(&mut msgs);
        }
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(CoreError::Validation(errors))
    }
}

/// Avatar URLs must be absolute `http(s)` URLs.
pub fn validate_avatar_url(url: &str) -> Result<(), CoreError> {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"));
    match rest {
        Some(host_and_path) if !host_and_path.is_empty() && !url.contains(char::is_whitespace) => {
            Ok(())
        }
        _ => Err(CoreError::validation("Avatar URL must be a valid URL")),
    }
}

// ---------------------------------------------------------------------------
// Avatars
// ---------------------------------------------------------------------------

/// Pick a random generated avatar for a new account.
pub fn generate_avatar_url() -> String {
    let seed = AVATAR_SEEDS
        .choose(&mut rand::rng())
        .copied()
        .unwrap_or(AVATAR_SEEDS[0]);
    format!("{AVATAR_BASE_URL}{seed}")
}

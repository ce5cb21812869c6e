//! Types for authentication and user management

use serde::{Deserialize, Serialize};

/// Cuisine and diet preferences stored on the user profile
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default)]
    pub cuisines: Vec<String>,

    #[serde(default)]
    pub dietary_restrictions: Vec<String>,

    #[serde(default)]
    pub favorite_tags: Vec<String>,
}

/// User data with the gamification snapshot.
///
/// Held by the session store and replaced wholesale on every successful fetch or
/// update, never patched field by field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// The user ID
    pub id: String,

    pub username: String,

    #[serde(default)]
    pub email: Option<String>,

    #[serde(default)]
    pub avatar_url: Option<String>,

    #[serde(default)]
    pub bio: Option<String>,

    /// Experience points
    #[serde(default)]
    pub xp: u64,

    #[serde(default = "first_level")]
    pub level: u32,

    /// Badge IDs
    #[serde(default)]
    pub badges: Vec<String>,

    #[serde(default)]
    pub followers_count: u64,

    #[serde(default)]
    pub following_count: u64,

    #[serde(default)]
    pub preferences: Option<Preferences>,

    /// The creation time
    #[serde(default)]
    pub created_at: Option<String>,
}

fn first_level() -> u32 {
    1
}

/// Login credentials
#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

impl LoginRequest {
    pub fn new(username: &str, password: &str) -> Self {
        Self {
            username: username.to_string(),
            password: password.to_string(),
        }
    }
}

/// Registration data
#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub password_confirm: String,
}

impl RegisterRequest {
    pub fn new(username: &str, email: &str, password: &str) -> Self {
        Self {
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
            password_confirm: password.to_string(),
        }
    }
}

/// Profile attributes that can be updated
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateProfileRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferences: Option<Preferences>,
}

/// Access and refresh token pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

/// Login and registration response.
///
/// The API nests the tokens under `tokens`; a flat `access`/`refresh` layout is
/// accepted as well.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    #[serde(default)]
    pub message: Option<String>,

    pub user: User,

    #[serde(default)]
    tokens: Option<TokenPair>,

    #[serde(default)]
    access: Option<String>,

    #[serde(default)]
    refresh: Option<String>,
}

impl AuthResponse {
    /// The token pair carried by the response, whichever layout was used
    pub fn token_pair(&self) -> Option<TokenPair> {
        if let Some(tokens) = &self.tokens {
            return Some(tokens.clone());
        }
        match (&self.access, &self.refresh) {
            (Some(access), Some(refresh)) => Some(TokenPair {
                access: access.clone(),
                refresh: refresh.clone(),
            }),
            _ => None,
        }
    }
}

/// Token refresh response
#[derive(Debug, Clone, Deserialize)]
pub struct RefreshResponse {
    pub access: String,

    /// Present when the server rotates refresh tokens
    #[serde(default)]
    pub refresh: Option<String>,
}

//! Payloads exchanged with the fitness backend.

use serde::{Deserialize, Serialize};

use crate::auth::TokenPair;

/// The signed-in athlete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Backend identifier.
    pub id: u64,
    /// Display name.
    pub name: String,
    /// Login email.
    pub email: String,
    /// Avatar file name under `/avatar/`, if one was uploaded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

/// An exercise in the catalogue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exercise {
    /// Backend identifier.
    pub id: u64,
    /// Exercise name.
    pub name: String,
    /// Number of sets.
    pub series: u32,
    /// Repetitions per set.
    pub repetitions: u32,
    /// Muscle group.
    pub group: String,
    /// Demo animation file under `/exercise/demo/`.
    #[serde(default)]
    pub demo: String,
    /// Thumbnail file under `/exercise/thumb/`.
    #[serde(default)]
    pub thumb: String,
}

/// One completed exercise in the history log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// History record identifier.
    pub id: u64,
    /// The user who logged it.
    pub user_id: u64,
    /// The exercise performed.
    pub exercise_id: u64,
    /// Exercise name at the time of logging.
    pub name: String,
    /// Muscle group.
    pub group: String,
    /// Time of day, formatted by the backend (e.g. `08:15`).
    pub hour: String,
    /// Creation timestamp as sent by the backend.
    pub created_at: String,
}

/// History entries grouped under one day heading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryDay {
    /// Day heading (e.g. `28.02.2024`).
    pub title: String,
    /// Entries logged that day.
    pub data: Vec<HistoryEntry>,
}

/// Response of `POST /sessions`.
///
/// Any field may be missing on a misbehaving backend, so all are optional
/// and [`SessionGrant::into_parts`] decides whether a session was granted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionGrant {
    #[serde(default)]
    user: Option<User>,
    #[serde(default)]
    token: String,
    #[serde(default)]
    refresh_token: String,
}

impl SessionGrant {
    /// Creates a complete grant.
    #[must_use]
    pub fn new(user: User, tokens: TokenPair) -> Self {
        Self {
            user: Some(user),
            token: tokens.access_token,
            refresh_token: tokens.refresh_token,
        }
    }

    /// Splits the grant into user and tokens when all three are present.
    #[must_use]
    pub fn into_parts(self) -> Option<(User, TokenPair)> {
        let tokens = TokenPair::new(self.token, self.refresh_token);
        match self.user {
            Some(user) if tokens.is_complete() => Some((user, tokens)),
            _ => None,
        }
    }
}

/// Body of `POST /users`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUser {
    /// Display name.
    pub name: String,
    /// Login email.
    pub email: String,
    /// Initial password.
    pub password: String,
}

/// Body of `PUT /users`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    /// New display name.
    pub name: String,
    /// New password, when changing it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Current password, required by the backend to change it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_password: Option<String>,
}

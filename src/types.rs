use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};

/// Browser session as carried by cookies.
///
/// `id_token` is the only signal of "logged in". `refresh_token` is only ever
/// present between personal access token completion and its one-time reveal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub id_token: Option<String>,
    pub refresh_token: Option<String>,
}

impl Session {
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.id_token.as_deref().is_some_and(|t| !t.is_empty())
    }
}

/// Console login identifier of a user.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, From, Into,
)]
#[serde(transparent)]
pub struct LoginId(pub String);

/// Identifier of a personal access token, opaque to the console.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, From, Into,
)]
#[serde(transparent)]
pub struct TokenId(pub String);

impl From<&str> for TokenId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Personal access token record as listed by the token management API.
///
/// The secret itself is never part of this record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalAccessToken {
    pub token_id: TokenId,
    pub description: String,
    #[serde(with = "time::serde::rfc3339")]
    pub creation_time: time::OffsetDateTime,
    pub owner: TokenOwner,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenOwner {
    pub login_id: LoginId,
}

/// User record from the user management API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub login_id: LoginId,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

//! Wire models for the identity endpoints.

use serde::{Deserialize, Deserializer, Serialize};

use super::decode;

/// Successful response from any identity endpoint (guest session, sign-in,
/// account upgrade).
///
/// Decoded by hand; the identity service predates the rest of the API and
/// kept its own naming. Accepted names, in priority order:
///
/// | field           | accepted names                         |
/// |-----------------|----------------------------------------|
/// | `user_id`       | `userId`, `user_id`, `uid`             |
/// | `token`         | `token`, `accessToken`, `sessionToken` |
/// | `refresh_token` | `refreshToken`, `refresh_token`        |
/// | `is_new_user`   | `isNewUser`, `newUser`, `created`      |
/// | `expires_in`    | `expiresIn`, `expires_in`, `ttl`       |
///
/// A missing `is_new_user` decodes as `false`: when the provider does not
/// say the account was just created, guest content must not be merged into
/// it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthGrant {
    pub user_id: String,
    pub token: String,
    pub refresh_token: Option<String>,
    /// True only when this very call created the account.
    pub is_new_user: bool,
    /// Token lifetime in seconds, when the provider reports one.
    pub expires_in: Option<i64>,
}

impl<'de> Deserialize<'de> for AuthGrant {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let obj = decode::object(deserializer)?;
        let user_id = decode::string_at(&obj, &["userId", "user_id", "uid"])
            .ok_or_else(|| serde::de::Error::missing_field("userId"))?;
        let token = decode::string_at(&obj, &["token", "accessToken", "sessionToken"])
            .ok_or_else(|| serde::de::Error::missing_field("token"))?;
        Ok(AuthGrant {
            user_id,
            token,
            refresh_token: decode::string_at(&obj, &["refreshToken", "refresh_token"]),
            is_new_user: decode::bool_at(&obj, &["isNewUser", "newUser", "created"])
                .unwrap_or(false),
            expires_in: decode::i64_at(&obj, &["expiresIn", "expires_in", "ttl"]),
        })
    }
}

//! Claims carried by a signed access token.

use serde::{Deserialize, Serialize};

/// Verified claims of an access token.
///
/// `user` is advisory and only feeds logs and metrics. `repository` is the
/// single repository the token grants access to. `write_once` marks a WORM
/// credential: existing objects can't be overwritten and only locks can be
/// deleted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthClaims {
    pub user: String,
    pub repository: String,
    #[serde(rename = "writeOnce")]
    pub write_once: bool,
}

impl AuthClaims {
    pub fn new(user: impl Into<String>, repository: impl Into<String>, write_once: bool) -> Self {
        Self {
            user: user.into(),
            repository: repository.into(),
            write_once,
        }
    }

    /// Check whether these claims grant access to `repository`.
    pub fn allows_repository(&self, repository: &str) -> bool {
        self.repository == repository
    }
}

//! Credential resolution
//!
//! Turns a classified remote into something the transport can authenticate
//! with:
//! - HTTP remotes use the username/token stored for their provider
//! - SSH remotes use the tool keypair, unlocked by a passphrase that is asked
//!   for once per session and cached in memory
//!
//! Remotes that are neither fail immediately.

use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use crate::core::prompt::{PromptOptions, UserInteraction};
use crate::core::remote::{AuthMode, Remote};
use crate::core::session::Session;
use crate::error::{Result, ShipitError};

/// Credentials handed to the transport
#[derive(Clone)]
pub enum Credentials {
    Http {
        username: String,
        token: SecretString,
    },
    Ssh {
        passphrase: SecretString,
    },
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credentials::Http { username, token } => f
                .debug_struct("Http")
                .field("username", username)
                .field("token", &mask_token(token))
                .finish(),
            Credentials::Ssh { .. } => f.debug_struct("Ssh").finish_non_exhaustive(),
        }
    }
}

/// Resolve credentials for `remote`.
///
/// HTTP lookups never prompt: missing credentials are `AuthNotFound`, which
/// only the `init` flow can fix. For SSH remotes the caller must already have
/// confirmed the keypair exists.
pub fn resolve(
    session: &mut Session,
    remote: &Remote,
    ui: &dyn UserInteraction,
) -> Result<Credentials> {
    match remote.auth_mode() {
        AuthMode::Http => {
            let config = session.config().ok_or(ShipitError::ConfigNotLoaded)?;
            let provider = remote.provider();
            let stored = config
                .provider_auth(provider)
                .ok_or(ShipitError::AuthNotFound { provider })?;

            debug!(%provider, username = %stored.username, "using stored http credentials");
            Ok(Credentials::Http {
                username: stored.username.clone(),
                token: SecretString::from(stored.token.clone()),
            })
        }
        AuthMode::Ssh => {
            if let Some(passphrase) = session.cached_passphrase() {
                return Ok(Credentials::Ssh {
                    passphrase: passphrase.clone(),
                });
            }

            let answer = ui.prompt("passphrase", PromptOptions::masked())?;
            let passphrase = SecretString::from(answer);
            session.cache_passphrase(passphrase.clone());
            Ok(Credentials::Ssh { passphrase })
        }
        AuthMode::Unknown => Err(ShipitError::InvalidAuthMethod {
            url: remote.url.clone(),
        }),
    }
}

/// Get a masked version of a token for display (shows first 4 and last 4 chars)
pub fn mask_token(token: &SecretString) -> String {
    let exposed = token.expose_secret();
    let chars: Vec<char> = exposed.chars().collect();
    if chars.len() <= 8 {
        "*".repeat(chars.len())
    } else {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}...{}", head, tail)
    }
}

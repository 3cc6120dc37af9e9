//! SSH key bootstrap
//!
//! SSH remotes authenticate with a tool-owned ed25519 keypair. The first time
//! an SSH remote is used the keypair is generated, and the workflow stops so
//! the user can upload the public half to their provider.

use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use tracing::info;

use crate::core::prompt::{PromptOptions, StatusLevel, UserInteraction};
use crate::core::remote::Provider;
use crate::core::runner::CommandRunner;
use crate::error::{Result, ShipitError};

const KEY_NAME: &str = "shipit_key";
const KEY_ALGORITHM: &str = "ed25519";

/// Location of the tool-owned SSH keypair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshKeyPaths {
    pub private_key: PathBuf,
    pub public_key: PathBuf,
}

impl SshKeyPaths {
    pub fn in_dir(dir: &Path) -> Self {
        let private_key = dir.join(KEY_NAME);
        let public_key = dir.join(format!("{}.pub", KEY_NAME));
        Self {
            private_key,
            public_key,
        }
    }

    /// Bootstrap is complete once the private key exists
    pub fn exists(&self) -> bool {
        self.private_key.exists()
    }
}

/// Result of ensuring a keypair exists
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyStatus {
    /// Keypair present, SSH transport can proceed
    Ready,
    /// Keypair was just generated; the public key must be uploaded first
    AwaitingUpload {
        public_key: PathBuf,
        host: String,
    },
}

/// Instruction shown whenever the user must upload the public key
pub fn upload_instructions(public_key: &Path, provider: Provider) -> String {
    format!(
        "copy contents of {} and upload the key on {}",
        public_key.display(),
        provider_host(provider)
    )
}

/// Host shown in upload instructions; unknown providers get a generic label
pub fn provider_host(provider: Provider) -> String {
    provider
        .host_url()
        .map(str::to_string)
        .unwrap_or_else(|| "your git provider".to_string())
}

/// Make sure the keypair exists, generating it on first use.
///
/// Generation prompts for an email and a passphrase and runs `ssh-keygen`.
/// A generation failure is fatal.
pub fn ensure_key(
    keys: &SshKeyPaths,
    provider: Provider,
    ui: &dyn UserInteraction,
    runner: &dyn CommandRunner,
) -> Result<KeyStatus> {
    ui.status(StatusLevel::Info, "Gathering ssh keys...");

    if keys.exists() {
        ui.status(StatusLevel::Success, "key found");
        return Ok(KeyStatus::Ready);
    }

    let email = ui.prompt("mail", PromptOptions::default())?;
    let passphrase = SecretString::from(ui.prompt("passphrase", PromptOptions::masked())?);

    if let Some(parent) = keys.private_key.parent() {
        fs::create_dir_all(parent)?;
    }

    let key_path = keys.private_key.to_string_lossy().into_owned();
    info!(path = %key_path, "generating ssh keypair");
    runner
        .run(
            "ssh-keygen",
            &[
                "-t",
                KEY_ALGORITHM,
                "-C",
                email.as_str(),
                "-f",
                key_path.as_str(),
                "-P",
                passphrase.expose_secret(),
            ],
        )?
        .into_result("ssh-keygen")?;

    if !keys.exists() {
        return Err(ShipitError::CommandFailed {
            program: "ssh-keygen".into(),
            output: format!("no key written to {}", key_path),
        });
    }

    ui.status(StatusLevel::Success, "keys generated");
    ui.status(
        StatusLevel::StrictInfo,
        &upload_instructions(&keys.public_key, provider),
    );

    Ok(KeyStatus::AwaitingUpload {
        public_key: keys.public_key.clone(),
        host: provider_host(provider),
    })
}

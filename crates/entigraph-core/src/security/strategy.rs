//! Password authentication strategies.
//!
//! Four strategies share the [`Authenticates`] capability. Encryption and
//! directory binding are delegated to injected collaborators so the crate
//! carries no cipher or LDAP client of its own.

use super::error::{SecurityError, SecurityResult};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Option naming the key handed to the [`PasswordCipher`].
pub const SECRET_KEY_OPTION: &str = "secret_key";

/// Option naming the directory server URL.
pub const LDAP_URL_OPTION: &str = "ldap_url";

/// Option holding the suffix appended to the bind principal.
pub const BASE_DN_OPTION: &str = "base_dn";

/// Build options of a strategy.
pub type StrategyOptions = HashMap<String, String>;

/// Password verification capability.
pub trait Authenticates: Send + Sync {
    /// Check `password` against the stored `credential` of `login`.
    fn authenticate(&self, credential: &str, password: &str, login: &str) -> SecurityResult<bool>;

    /// Turn a clear password into the credential to store.
    fn encrypt_password(&self, password: &str, login: &str) -> SecurityResult<String>;

    /// Check if stored credentials can be turned back into passwords.
    fn can_retrieve_password(&self) -> bool;

    /// Recover the clear password from a stored credential.
    fn decode_credential(&self, credential: &str, login: &str) -> SecurityResult<String>;
}

/// Reversible password encryption.
pub trait PasswordCipher: Send + Sync {
    /// Encrypt `plain` under `secret_key`.
    fn encrypt(&self, secret_key: &str, plain: &str) -> SecurityResult<String>;

    /// Decrypt `encrypted` under `secret_key`.
    fn decrypt(&self, secret_key: &str, encrypted: &str) -> SecurityResult<String>;
}

/// Simple bind against a directory server.
pub trait DirectoryBinder: Send + Sync {
    /// Bind as `principal`.
    ///
    /// Returns `Ok(false)` when the server rejects the credentials and an
    /// error when the server cannot be reached.
    fn bind(&self, url: &str, principal: &str, password: &str) -> SecurityResult<bool>;
}

/// Strategy selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrategyKind {
    /// Credential is the password.
    Simple,
    /// Credential is a one-way digest.
    Digested,
    /// Credential is the encrypted password.
    Encrypted,
    /// Password is checked by a directory server.
    Ldap,
}

impl StrategyKind {
    /// Lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::Simple => "simple",
            StrategyKind::Digested => "digested",
            StrategyKind::Encrypted => "encrypted",
            StrategyKind::Ldap => "ldap",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyKind {
    type Err = SecurityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "simple" => Ok(StrategyKind::Simple),
            "digested" => Ok(StrategyKind::Digested),
            "encrypted" => Ok(StrategyKind::Encrypted),
            "ldap" => Ok(StrategyKind::Ldap),
            _ => Err(SecurityError::UnknownStrategy(s.to_string())),
        }
    }
}

/// A configured authentication strategy.
#[derive(Clone)]
pub enum AuthStrategy {
    /// Plain comparison.
    Simple,
    /// SHA-256 hex digest comparison.
    Digested,
    /// Reversible encryption through a [`PasswordCipher`].
    Encrypted {
        /// Cipher doing the work.
        cipher: Arc<dyn PasswordCipher>,
        /// Key handed to the cipher.
        secret_key: String,
    },
    /// Bind against a directory server.
    Ldap {
        /// Binder doing the work.
        directory: Arc<dyn DirectoryBinder>,
        /// Server URL.
        url: String,
        /// Suffix appended to the bind principal.
        base_dn: String,
    },
}

impl AuthStrategy {
    /// Build a strategy of `kind` from its options.
    ///
    /// `Encrypted` needs a cipher and the `secret_key` option; `Ldap` needs a
    /// directory binder and the `ldap_url` option (`base_dn` defaults to
    /// empty).
    pub fn build(
        kind: StrategyKind,
        options: &StrategyOptions,
        cipher: Option<&Arc<dyn PasswordCipher>>,
        directory: Option<&Arc<dyn DirectoryBinder>>,
    ) -> SecurityResult<Self> {
        match kind {
            StrategyKind::Simple => Ok(AuthStrategy::Simple),
            StrategyKind::Digested => Ok(AuthStrategy::Digested),
            StrategyKind::Encrypted => {
                let cipher = cipher.ok_or(SecurityError::MissingCollaborator("password cipher"))?;
                Ok(AuthStrategy::Encrypted {
                    cipher: Arc::clone(cipher),
                    secret_key: required_option(kind, options, SECRET_KEY_OPTION)?,
                })
            }
            StrategyKind::Ldap => {
                let directory =
                    directory.ok_or(SecurityError::MissingCollaborator("directory binder"))?;
                Ok(AuthStrategy::Ldap {
                    directory: Arc::clone(directory),
                    url: required_option(kind, options, LDAP_URL_OPTION)?,
                    base_dn: options.get(BASE_DN_OPTION).cloned().unwrap_or_default(),
                })
            }
        }
    }

    /// Strategy selector of this strategy.
    pub fn kind(&self) -> StrategyKind {
        match self {
            AuthStrategy::Simple => StrategyKind::Simple,
            AuthStrategy::Digested => StrategyKind::Digested,
            AuthStrategy::Encrypted { .. } => StrategyKind::Encrypted,
            AuthStrategy::Ldap { .. } => StrategyKind::Ldap,
        }
    }

    /// Hex-encoded SHA-256 of `value`.
    pub fn digest(value: &str) -> String {
        hex::encode(Sha256::digest(value.as_bytes()))
    }

    fn unsupported(&self, operation: &'static str) -> SecurityError {
        SecurityError::Unsupported {
            strategy: self.kind().to_string(),
            operation,
        }
    }
}

fn required_option(
    kind: StrategyKind,
    options: &StrategyOptions,
    option: &str,
) -> SecurityResult<String> {
    options
        .get(option)
        .cloned()
        .ok_or_else(|| SecurityError::MissingOption {
            strategy: kind.to_string(),
            option: option.to_string(),
        })
}

impl Authenticates for AuthStrategy {
    fn authenticate(&self, credential: &str, password: &str, login: &str) -> SecurityResult<bool> {
        match self {
            AuthStrategy::Simple => Ok(credential == password),
            AuthStrategy::Digested => Ok(Self::digest(password) == credential),
            AuthStrategy::Encrypted { cipher, secret_key } => {
                Ok(cipher.encrypt(secret_key, password)? == credential)
            }
            AuthStrategy::Ldap {
                directory,
                url,
                base_dn,
            } => {
                let principal = format!("userid={}{}", login, base_dn);
                directory.bind(url, &principal, password)
            }
        }
    }

    fn encrypt_password(&self, password: &str, _login: &str) -> SecurityResult<String> {
        match self {
            AuthStrategy::Simple => Ok(password.to_string()),
            AuthStrategy::Digested => Ok(Self::digest(password)),
            AuthStrategy::Encrypted { cipher, secret_key } => cipher.encrypt(secret_key, password),
            // The directory owns the password.
            AuthStrategy::Ldap { .. } => Ok(String::new()),
        }
    }

    fn can_retrieve_password(&self) -> bool {
        matches!(self, AuthStrategy::Simple | AuthStrategy::Encrypted { .. })
    }

    fn decode_credential(&self, credential: &str, _login: &str) -> SecurityResult<String> {
        match self {
            AuthStrategy::Simple => Ok(credential.to_string()),
            AuthStrategy::Encrypted { cipher, secret_key } => {
                cipher.decrypt(secret_key, credential)
            }
            AuthStrategy::Digested | AuthStrategy::Ldap { .. } => {
                Err(self.unsupported("credential decoding"))
            }
        }
    }
}

impl fmt::Debug for AuthStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthStrategy::Ldap { url, base_dn, .. } => f
                .debug_struct("Ldap")
                .field("url", url)
                .field("base_dn", base_dn)
                .finish_non_exhaustive(),
            AuthStrategy::Encrypted { .. } => f.debug_struct("Encrypted").finish_non_exhaustive(),
            AuthStrategy::Simple => f.write_str("Simple"),
            AuthStrategy::Digested => f.write_str("Digested"),
        }
    }
}

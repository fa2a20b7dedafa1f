use irisvote::{CryptoVerifier, Policy, StaticVerifier, Verifier};
use std::env::var;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("irisvoted: {name} must be {expected}, found {found:?}")]
    BadValue {
        name: &'static str,
        expected: &'static str,
        found: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifierKind {
    /// Schnorr identity proofs and ed25519 nonce signatures
    Crypto,

    /// Accepts everything. Development only.
    Permissive,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: String,
    pub challenge_ttl_secs: i64,
    pub request_timeout: Duration,
    pub auto_activate: bool,
    pub verifier: VerifierKind,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            db_path: "./irisvote.db".to_owned(),
            challenge_ttl_secs: irisvote::DEFAULT_CHALLENGE_TTL_SECS,
            request_timeout: Duration::from_millis(5000),
            auto_activate: false,
            verifier: VerifierKind::Crypto,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        if let Some(val) = lookup("IRISVOTE_DB_PATH") {
            config.db_path = val;
        }

        if let Some(val) = lookup("IRISVOTE_CHALLENGE_TTL_SECS") {
            config.challenge_ttl_secs = match val.parse::<i64>() {
                Ok(secs) if secs > 0 => secs,
                _ => return Err(bad_value("IRISVOTE_CHALLENGE_TTL_SECS", "a positive integer", val)),
            };
        }

        if let Some(val) = lookup("IRISVOTE_REQUEST_TIMEOUT_MS") {
            config.request_timeout = match val.parse::<u64>() {
                Ok(ms) if ms > 0 => Duration::from_millis(ms),
                _ => return Err(bad_value("IRISVOTE_REQUEST_TIMEOUT_MS", "a positive integer", val)),
            };
        }

        if let Some(val) = lookup("IRISVOTE_AUTO_ACTIVATE") {
            config.auto_activate = match val.to_lowercase().as_str() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" => false,
                _ => return Err(bad_value("IRISVOTE_AUTO_ACTIVATE", "true or false", val)),
            };
        }

        if let Some(val) = lookup("IRISVOTE_VERIFIER") {
            config.verifier = match val.as_str() {
                "crypto" => VerifierKind::Crypto,
                "permissive" => VerifierKind::Permissive,
                _ => return Err(bad_value("IRISVOTE_VERIFIER", "crypto or permissive", val)),
            };
        }

        Ok(config)
    }

    pub fn policy(&self) -> Policy {
        Policy {
            challenge_ttl: chrono::Duration::seconds(self.challenge_ttl_secs),
            auto_activate: self.auto_activate,
        }
    }

    pub fn verifier(&self) -> Arc<dyn Verifier> {
        match self.verifier {
            VerifierKind::Crypto => Arc::new(CryptoVerifier),
            VerifierKind::Permissive => {
                warn!("irisvoted: permissive verifier enabled, every proof and signature is accepted");
                Arc::new(StaticVerifier::accept_all())
            }
        }
    }
}

fn bad_value(name: &'static str, expected: &'static str, found: String) -> ConfigError {
    ConfigError::BadValue {
        name,
        expected,
        found,
    }
}

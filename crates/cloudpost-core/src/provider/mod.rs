//! Cloud provider credentials.
//!
//! A provider bundles the cloud account credentials with the SMTP settings
//! of its email service. Only the SMTP part is used for delivery; the cloud
//! credentials are validated so a misconfigured account fails before any
//! message is sent.

mod aws;
mod oci;

pub use aws::AwsAuth;
pub use oci::OciAuth;

use std::collections::HashMap;

use serde::Deserialize;
use tracing::info;

use crate::config::SmtpCredentials;
use crate::error::{Error, Result};

/// Credentials of one cloud provider.
pub trait Provider: Send + Sync + 'static {
    /// Short provider name (`"aws"`, `"oci"`).
    fn name(&self) -> &'static str;

    /// Checks that every required credential field is present.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingFields`] listing the empty fields.
    fn validate(&self) -> Result<()>;

    /// Validates the credentials and marks them authenticated.
    ///
    /// Idempotent: once authenticated, later calls return immediately.
    ///
    /// # Errors
    ///
    /// Returns the validation error if the credentials are incomplete.
    fn authenticate(&self) -> Result<()>;

    /// Returns true after a successful [`authenticate`](Self::authenticate).
    fn is_authenticated(&self) -> bool;

    /// SMTP settings of the provider's email service.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings are incomplete.
    fn smtp(&self) -> Result<SmtpCredentials>;
}

/// Credentials for any supported provider, selected by name.
#[derive(Debug)]
pub enum AuthConfig {
    /// Amazon Web Services (SES SMTP).
    Aws(AwsAuth),
    /// Oracle Cloud Infrastructure (Email Delivery).
    Oci(OciAuth),
}

#[derive(Deserialize)]
struct RawAuthConfig {
    provider: String,
    #[serde(default)]
    fields: HashMap<String, String>,
}

impl AuthConfig {
    /// Builds and validates the credentials of `provider` from a field map.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedProvider`] for unknown names, or the
    /// provider's validation error.
    pub fn new(provider: &str, fields: &HashMap<String, String>) -> Result<Self> {
        match provider.trim().to_ascii_lowercase().as_str() {
            "aws" => Ok(Self::Aws(AwsAuth::from_fields(fields)?)),
            "oci" => Ok(Self::Oci(OciAuth::from_fields(fields)?)),
            _ => Err(Error::UnsupportedProvider(provider.to_string())),
        }
    }

    /// Parses `{"provider": "...", "fields": {...}}`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for malformed JSON, otherwise the same
    /// errors as [`AuthConfig::new`].
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: RawAuthConfig = serde_json::from_str(json)?;
        Self::new(&raw.provider, &raw.fields)
    }

    fn inner(&self) -> &dyn Provider {
        match self {
            Self::Aws(auth) => auth,
            Self::Oci(auth) => auth,
        }
    }
}

impl Provider for AuthConfig {
    fn name(&self) -> &'static str {
        self.inner().name()
    }

    fn validate(&self) -> Result<()> {
        self.inner().validate()
    }

    fn authenticate(&self) -> Result<()> {
        self.inner().authenticate()
    }

    fn is_authenticated(&self) -> bool {
        self.inner().is_authenticated()
    }

    fn smtp(&self) -> Result<SmtpCredentials> {
        self.inner().smtp()
    }
}

/// Returns `name` for every `(name, value)` pair whose value is empty.
fn missing(pairs: &[(&'static str, &str)]) -> Vec<&'static str> {
    pairs
        .iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| *name)
        .collect()
}

fn check_fields(provider: &'static str, pairs: &[(&'static str, &str)]) -> Result<()> {
    let fields = missing(pairs);
    if fields.is_empty() {
        Ok(())
    } else {
        Err(Error::MissingFields { provider, fields })
    }
}

fn field(map: &HashMap<String, String>, key: &str) -> String {
    map.get(key).cloned().unwrap_or_default()
}

fn log_authenticated(provider: &'static str) {
    info!(provider, "provider credentials authenticated");
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_provider() {
        let err = AuthConfig::new("azure", &HashMap::new()).unwrap_err();
        assert!(matches!(err, Error::UnsupportedProvider(name) if name == "azure"));
    }

    #[test]
    fn test_from_json_aws() {
        let config = AuthConfig::from_json(
            r#"{
                "provider": "aws",
                "fields": {
                    "aws_access_key_id": "AKIA",
                    "aws_secret_access_key": "secret",
                    "aws_region": "us-east-1",
                    "email_host": "email-smtp.us-east-1.amazonaws.com",
                    "email_port": "587"
                }
            }"#,
        )
        .unwrap();

        assert_eq!(config.name(), "aws");
        assert!(!config.is_authenticated());
        config.authenticate().unwrap();
        assert!(config.is_authenticated());
        assert_eq!(config.smtp().unwrap().port, 587);
    }

    #[test]
    fn test_from_json_malformed() {
        assert!(matches!(
            AuthConfig::from_json("{not json"),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_provider_name_is_case_insensitive() {
        let err = AuthConfig::new(" OCI ", &HashMap::new()).unwrap_err();
        assert!(matches!(err, Error::MissingFields { provider: "oci", .. }));
    }
}

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use super::{Provider, check_fields, field, log_authenticated};
use crate::config::SmtpCredentials;
use crate::error::Result;

/// AWS account credentials plus the SES SMTP settings.
pub struct AwsAuth {
    /// Access key ID (`aws_access_key_id`).
    pub access_key_id: String,
    /// Secret access key (`aws_secret_access_key`).
    pub secret_access_key: String,
    /// Region (`aws_region`).
    pub region: String,
    /// SMTP settings (`email_*`).
    pub smtp: SmtpCredentials,
    authenticated: AtomicBool,
}

impl AwsAuth {
    /// Builds and validates credentials from a field map.
    ///
    /// # Errors
    ///
    /// Returns an error if a required field is empty or the SMTP settings
    /// cannot be parsed.
    pub fn from_fields(fields: &HashMap<String, String>) -> Result<Self> {
        let auth = Self {
            access_key_id: field(fields, "aws_access_key_id"),
            secret_access_key: field(fields, "aws_secret_access_key"),
            region: field(fields, "aws_region"),
            smtp: SmtpCredentials::from_fields(fields)?,
            authenticated: AtomicBool::new(false),
        };
        auth.validate()?;
        Ok(auth)
    }
}

impl Provider for AwsAuth {
    fn name(&self) -> &'static str {
        "aws"
    }

    fn validate(&self) -> Result<()> {
        check_fields(
            self.name(),
            &[
                ("aws_access_key_id", self.access_key_id.as_str()),
                ("aws_secret_access_key", self.secret_access_key.as_str()),
                ("aws_region", self.region.as_str()),
            ],
        )
    }

    fn authenticate(&self) -> Result<()> {
        if self.is_authenticated() {
            return Ok(());
        }
        self.validate()?;
        if !self.authenticated.swap(true, Ordering::AcqRel) {
            log_authenticated(self.name());
        }
        Ok(())
    }

    fn is_authenticated(&self) -> bool {
        self.authenticated.load(Ordering::Acquire)
    }

    fn smtp(&self) -> Result<SmtpCredentials> {
        self.smtp.validate()?;
        Ok(self.smtp.clone())
    }
}

impl fmt::Debug for AwsAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AwsAuth")
            .field("access_key_id", &self.access_key_id)
            .field("region", &self.region)
            .field("smtp", &self.smtp)
            .field("authenticated", &self.is_authenticated())
            .finish_non_exhaustive()
    }
}

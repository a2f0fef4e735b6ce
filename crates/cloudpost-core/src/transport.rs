//! SMTP submission bound to a provider's credentials.

use std::fmt;
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use cloudpost_smtp::connection::{connect, connect_tls};
use cloudpost_smtp::{Address, Client, Ready};
use tracing::debug;

use crate::config::{Security, SmtpCredentials};
use crate::error::{Error, Result};
use crate::provider::{AwsAuth, OciAuth, Provider};

/// Name sent in EHLO.
const CLIENT_HOSTNAME: &str = "localhost";

/// SMTP server address and connection security.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Server hostname.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Security mode.
    pub security: Security,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// AUTH PLAIN credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct PlainAuthenticator {
    /// Username.
    pub username: String,
    /// Password.
    pub password: String,
}

impl fmt::Debug for PlainAuthenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlainAuthenticator")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Everything needed to submit a message, resolved once per batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    /// Server to connect to.
    pub endpoint: Endpoint,
    /// Credentials for AUTH PLAIN; `None` skips authentication.
    pub authenticator: Option<PlainAuthenticator>,
    /// Envelope sender replacing each message's From address.
    pub sender: Option<String>,
}

impl From<SmtpCredentials> for Route {
    fn from(creds: SmtpCredentials) -> Self {
        let security = creds.security();
        let authenticator = (!creds.username.is_empty()).then(|| PlainAuthenticator {
            username: creds.username,
            password: creds.password,
        });
        Self {
            endpoint: Endpoint {
                host: creds.host,
                port: creds.port,
                security,
            },
            authenticator,
            sender: creds.from,
        }
    }
}

/// Capability to submit raw messages to recipients.
#[async_trait]
pub trait TransportAdapter: Send + Sync + 'static {
    /// Resolves the endpoint and authenticator.
    ///
    /// Cheap after the first call; callers resolve once per batch.
    ///
    /// # Errors
    ///
    /// Returns an error if the credentials do not describe a usable
    /// endpoint.
    fn resolve(&self) -> Result<Arc<Route>>;

    /// Submits `raw` from `from` to every address in `recipients` as one
    /// SMTP transaction, without retrying.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] if the session fails at any step.
    async fn submit(
        &self,
        route: &Route,
        from: &str,
        recipients: &[String],
        raw: &[u8],
    ) -> Result<()>;
}

/// SMTP transport for any [`Provider`].
#[derive(Debug)]
pub struct SmtpTransport<P> {
    provider: P,
    route: OnceLock<Arc<Route>>,
}

/// Transport using AWS SES SMTP credentials.
pub type AwsTransport = SmtpTransport<AwsAuth>;

/// Transport using OCI Email Delivery SMTP credentials.
pub type OciTransport = SmtpTransport<OciAuth>;

impl<P: Provider> SmtpTransport<P> {
    /// Creates a transport for `provider`. Nothing is resolved until first
    /// use.
    #[must_use]
    pub const fn new(provider: P) -> Self {
        Self {
            provider,
            route: OnceLock::new(),
        }
    }

    /// The provider credentials.
    pub const fn provider(&self) -> &P {
        &self.provider
    }
}

#[async_trait]
impl<P: Provider> TransportAdapter for SmtpTransport<P> {
    fn resolve(&self) -> Result<Arc<Route>> {
        if let Some(route) = self.route.get() {
            return Ok(Arc::clone(route));
        }

        let route = Arc::new(Route::from(self.provider.smtp()?));
        debug!(
            provider = self.provider.name(),
            endpoint = %route.endpoint,
            security = route.endpoint.security.display_name(),
            "resolved SMTP route"
        );
        Ok(Arc::clone(self.route.get_or_init(|| route)))
    }

    async fn submit(
        &self,
        route: &Route,
        from: &str,
        recipients: &[String],
        raw: &[u8],
    ) -> Result<()> {
        if recipients.is_empty() {
            return Err(Error::no_recipients());
        }
        let sender = route.sender.as_deref().unwrap_or(from);

        debug!(
            endpoint = %route.endpoint,
            recipients = recipients.len(),
            bytes = raw.len(),
            "submitting message"
        );
        submit_smtp(route, sender, recipients, raw)
            .await
            .map_err(|source| Error::Transport {
                endpoint: route.endpoint.to_string(),
                source,
            })
    }
}

async fn submit_smtp(
    route: &Route,
    from: &str,
    recipients: &[String],
    raw: &[u8],
) -> cloudpost_smtp::Result<()> {
    let endpoint = &route.endpoint;
    let stream = match endpoint.security {
        Security::Tls => connect_tls(&endpoint.host, endpoint.port).await?,
        Security::StartTls | Security::None => connect(&endpoint.host, endpoint.port).await?,
    };

    let client = Client::from_stream(stream)
        .await?
        .ehlo(CLIENT_HOSTNAME)
        .await?;
    let client = if endpoint.security == Security::StartTls {
        client
            .starttls(&endpoint.host)
            .await?
            .ehlo(CLIENT_HOSTNAME)
            .await?
    } else {
        client
    };

    match &route.authenticator {
        Some(auth) => {
            let client = client.auth_plain(&auth.username, &auth.password).await?;
            transaction(client, from, recipients, raw).await
        }
        None => transaction(client, from, recipients, raw).await,
    }
}

async fn transaction<State: Ready>(
    client: Client<State>,
    from: &str,
    recipients: &[String],
    raw: &[u8],
) -> cloudpost_smtp::Result<()> {
    let Some((first, rest)) = recipients.split_first() else {
        return Err(cloudpost_smtp::Error::InvalidAddress("no recipients".into()));
    };

    let client = client.mail_from(Address::new(from)?, Some(raw.len())).await?;
    let mut client = client.rcpt_to(Address::new(first.as_str())?).await?;
    for recipient in rest {
        client = client.rcpt_to(Address::new(recipient.as_str())?).await?;
    }
    let client = client.data().await?.send_message(raw).await?;

    // The message is already accepted; a failed QUIT does not change that.
    if let Err(err) = client.quit().await {
        debug!(error = %err, "QUIT failed after delivery");
    }
    Ok(())
}

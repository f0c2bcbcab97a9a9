use std::net::IpAddr;
use std::time::Duration;

use reqwest::{Client, Response, Url};
use tracing::{debug, warn};

use crate::error::Error;

/// Deadline for the whole lookup race.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Longest echo body read; an address literal plus whitespace fits easily.
const MAX_BODY_LEN: usize = 64;

pub const DEFAULT_ENDPOINTS: [&str; 4] = [
    "http://ifconfig.me/ip",
    "https://ifconfig.co/",
    "https://api.ipify.org/",
    "http://ipv4bot.whatismyipaddress.com/",
];

/// Finds the public address of this host by asking several echo services at
/// once and keeping the first answer that parses as an IP literal.
#[derive(Debug, Clone)]
pub struct IpResolver {
    client: Client,
    endpoints: Vec<Url>,
    timeout: Duration,
}

impl IpResolver {
    pub fn new<I, S>(endpoints: I, timeout: Duration) -> Result<Self, Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let endpoints = endpoints
            .into_iter()
            .map(|endpoint| {
                let s = endpoint.as_ref();
                Url::parse(s).map_err(|e| Error::InvalidEndpoint(format!("{s}: {e}")))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let client = Client::builder().connect_timeout(timeout).build()?;

        Ok(Self {
            client,
            endpoints,
            timeout,
        })
    }

    pub fn endpoints(&self) -> &[Url] {
        &self.endpoints
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Races every endpoint and returns the first valid address.
    ///
    /// Lookups still pending when a winner is found, or when the deadline
    /// passes, are dropped, which aborts their requests.
    pub async fn resolve(&self) -> Result<IpAddr, Error> {
        if self.endpoints.is_empty() {
            return Err(Error::NoAddressFound);
        }

        let lookups = self
            .endpoints
            .iter()
            .map(|url| Box::pin(self.lookup(url)));

        match tokio::time::timeout(self.timeout, futures::future::select_ok(lookups)).await {
            Ok(Ok((ip, pending))) => {
                debug!("resolved public ip {ip}, cancelling {} lookups", pending.len());
                drop(pending);
                Ok(ip)
            }
            Ok(Err(_)) => Err(Error::NoAddressFound),
            Err(_) => {
                warn!("public ip lookup timed out after {:?}", self.timeout);
                Err(Error::ResolveTimeout(self.timeout))
            }
        }
    }

    async fn lookup(&self, url: &Url) -> Result<IpAddr, Error> {
        let body = match self.fetch(url).await {
            Ok(body) => body,
            Err(e) => {
                warn!("Skipping... {url}: {e}");
                return Err(e);
            }
        };

        parse_addr(&body).ok_or_else(|| {
            warn!("Skipping... ip [{body}] from {url} invalid");
            Error::InvalidAddress(url.to_string(), body)
        })
    }

    async fn fetch(&self, url: &Url) -> Result<String, Error> {
        let mut response = self
            .client
            .get(url.clone())
            .send()
            .await
            .and_then(Response::error_for_status)?;

        if response
            .content_length()
            .is_some_and(|len| len > MAX_BODY_LEN as u64)
        {
            return Err(Error::BodyTooLarge(url.to_string()));
        }

        let mut body = Vec::with_capacity(MAX_BODY_LEN);
        while let Some(chunk) = response.chunk().await? {
            body.extend_from_slice(&chunk);
            if body.len() > MAX_BODY_LEN {
                return Err(Error::BodyTooLarge(url.to_string()));
            }
        }

        Ok(String::from_utf8_lossy(&body).into_owned())
    }
}

/// Shorthand for a one-off [`IpResolver`].
pub async fn resolve<I, S>(endpoints: I, timeout: Duration) -> Result<IpAddr, Error>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    IpResolver::new(endpoints, timeout)?.resolve().await
}

fn parse_addr(body: &str) -> Option<IpAddr> {
    body.trim().parse().ok()
}

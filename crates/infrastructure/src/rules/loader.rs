use hickory_proto::rr::RecordType;
use reqwest::Url;
use splitroute_domain::{DomainError, RuleLocation, RuleSource};
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tracing::{debug, warn};

use crate::dns::forwarding::{MessageBuilder, ResponseParser};
use crate::dns::transport::{DnsTransport, UdpTransport};

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);
const BOOTSTRAP_LOOKUP_TIMEOUT: Duration = Duration::from_secs(2);
const USER_AGENT: &str = concat!("splitroute/", env!("CARGO_PKG_VERSION"), " (rules)");

/// Fetches rule sources. Remote hosts are looked up through each bootstrap
/// resolver in turn, then through the system resolver.
pub struct RuleLoader {
    bootstrap: Vec<SocketAddr>,
    fetch_timeout: Duration,
}

impl RuleLoader {
    pub fn new(bootstrap: Vec<SocketAddr>) -> Self {
        Self {
            bootstrap,
            fetch_timeout: FETCH_TIMEOUT,
        }
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub async fn fetch(&self, source: &RuleSource) -> Result<Vec<u8>, DomainError> {
        match &source.location {
            RuleLocation::Local(path) => tokio::fs::read(path).await.map_err(|e| {
                DomainError::RuleSource(format!("read error for {}: {}", path.display(), e))
            }),
            RuleLocation::Remote(url) => self.fetch_remote(url).await,
        }
    }

    /// Source contents as text, for line-oriented lists.
    pub async fn fetch_text(&self, source: &RuleSource) -> Result<String, DomainError> {
        let bytes = self.fetch(source).await?;
        String::from_utf8(bytes)
            .map_err(|e| DomainError::RuleSource(format!("{source} is not UTF-8: {e}")))
    }

    async fn fetch_remote(&self, url: &str) -> Result<Vec<u8>, DomainError> {
        let parsed = Url::parse(url)
            .map_err(|e| DomainError::RuleSource(format!("invalid URL {url}: {e}")))?;
        let host = parsed
            .host_str()
            .ok_or_else(|| DomainError::RuleSource(format!("URL without host: {url}")))?
            .to_string();
        let port = parsed.port_or_known_default().unwrap_or(443);

        let mut last_error = None;

        if host.parse::<IpAddr>().is_err() {
            for resolver in &self.bootstrap {
                let attempt = match self.lookup(*resolver, &host).await {
                    Ok(ip) => {
                        debug!(host = %host, resolver = %resolver, ip = %ip, "Rule source host resolved");
                        self.download(url, Some((&host, SocketAddr::new(ip, port))))
                            .await
                    }
                    Err(e) => Err(e),
                };
                match attempt {
                    Ok(bytes) => return Ok(bytes),
                    Err(e) => {
                        warn!(url, resolver = %resolver, error = %e, "Fetch through bootstrap resolver failed");
                        last_error = Some(e);
                    }
                }
            }
        }

        match self.download(url, None).await {
            Ok(bytes) => Ok(bytes),
            Err(e) => {
                if let Some(previous) = last_error {
                    debug!(error = %previous, "Earlier bootstrap attempt failed");
                }
                Err(e)
            }
        }
    }

    async fn lookup(&self, resolver: SocketAddr, host: &str) -> Result<IpAddr, DomainError> {
        let query = MessageBuilder::build_query(&format!("{host}."), RecordType::A)?;
        let bytes = MessageBuilder::serialize_message(&query)?;
        let response = UdpTransport::new(resolver)
            .send(&bytes, BOOTSTRAP_LOOKUP_TIMEOUT)
            .await?;
        let reply = ResponseParser::parse(&response.bytes)?;

        ResponseParser::first_address(&reply).ok_or_else(|| {
            DomainError::RuleSource(format!("{resolver} returned no address for {host}"))
        })
    }

    async fn download(
        &self,
        url: &str,
        pinned: Option<(&str, SocketAddr)>,
    ) -> Result<Vec<u8>, DomainError> {
        let mut builder = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(self.fetch_timeout);
        if let Some((host, addr)) = pinned {
            builder = builder.resolve(host, addr);
        }
        let client = builder
            .build()
            .map_err(|e| DomainError::RuleSource(format!("HTTP client error: {e}")))?;

        let response = client
            .get(url)
            .send()
            .await
            .map_err(|e| DomainError::RuleSource(format!("fetch error for {url}: {e}")))?;

        if !response.status().is_success() {
            return Err(DomainError::RuleSource(format!(
                "HTTP {} for {}",
                response.status().as_u16(),
                url
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| DomainError::RuleSource(format!("read error for {url}: {e}")))?;
        Ok(body.to_vec())
    }
}

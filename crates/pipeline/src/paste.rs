//! Paste fallback services.
//!
//! Output that does not fit inline is replaced by a link to the source:
//! stable and beta use a shortened playground deep link, nightly uses a
//! private gist. A failed upload never fails the request; the caller gets
//! [`PASTE_FAILED`] instead of a link.

use async_trait::async_trait;
use secrecy::{ExposeSecret, Secret};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use playpen_core::config::PasteConfig;
use playpen_core::traits::PasteService;
use playpen_core::types::ReleaseChannel;
use playpen_core::{Error, Result};
use playpen_telemetry::track_paste;

/// Sent in place of a link when the paste service could not be reached.
pub const PASTE_FAILED: &str = "failed to shorten url";

const USER_AGENT: &str = concat!("playpen/", env!("CARGO_PKG_VERSION"));

fn http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

fn parse_url(name: &str, raw: &str) -> Result<Url> {
    Url::parse(raw).map_err(|e| Error::config(format!("Invalid {} {:?}: {}", name, raw, e)))
}

// =============================================================================
// URL shortener
// =============================================================================

/// Shortens a "run this in the playground" deep link (bit.ly v3 API).
pub struct ShortenerPaste {
    client: reqwest::Client,
    playground_url: Url,
    shortener_url: Url,
    token: Option<Secret<String>>,
}

impl ShortenerPaste {
    pub fn new(config: &PasteConfig) -> Result<Self> {
        Ok(Self {
            client: http_client(Duration::from_millis(config.timeout_ms)),
            playground_url: parse_url("playground_url", &config.playground_url)?,
            shortener_url: parse_url("shortener_url", &config.shortener_url)?,
            token: config.shortener_token.clone(),
        })
    }

    /// Playground URL that loads and runs `source`.
    pub fn deep_link(&self, source: &str) -> Url {
        let mut url = self.playground_url.clone();
        url.query_pairs_mut()
            .append_pair("code", source)
            .append_pair("run", "1");
        url
    }
}

/// Extract the short link from a shortener reply.
pub fn parse_shortener_response(body: &Value) -> Result<String> {
    if body.get("status_txt").and_then(Value::as_str) != Some("OK") {
        return Err(Error::paste(format!("Shortener refused request: {}", body)));
    }
    body.pointer("/data/url")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| Error::paste(format!("Shortener reply has no url: {}", body)))
}

#[async_trait]
impl PasteService for ShortenerPaste {
    async fn publish(&self, source: &str, _channel: ReleaseChannel) -> Result<String> {
        let token = self
            .token
            .as_ref()
            .ok_or_else(|| Error::paste("No shortener token configured"))?;
        let long_url = self.deep_link(source);

        let response = self
            .client
            .get(self.shortener_url.clone())
            .query(&[
                ("access_token", token.expose_secret().as_str()),
                ("longUrl", long_url.as_str()),
            ])
            .send()
            .await
            .map_err(|e| Error::paste(format!("Shortener request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::paste(format!(
                "Shortener responded with {}",
                response.status()
            )));
        }
        let body: Value = response
            .json()
            .await
            .map_err(|e| Error::paste(format!("Malformed shortener reply: {}", e)))?;

        parse_shortener_response(&body)
    }
}

// =============================================================================
// Gist
// =============================================================================

/// Uploads the source as a private gist.
pub struct GistPaste {
    client: reqwest::Client,
    gist_url: Url,
    token: Option<Secret<String>>,
    filename: String,
}

impl GistPaste {
    pub fn new(config: &PasteConfig) -> Result<Self> {
        Ok(Self {
            client: http_client(Duration::from_millis(config.timeout_ms)),
            gist_url: parse_url("gist_url", &config.gist_url)?,
            token: config.gist_token.clone(),
            filename: config.gist_filename.clone(),
        })
    }

    pub fn payload(&self, source: &str, channel: ReleaseChannel) -> Value {
        let mut files = serde_json::Map::new();
        files.insert(self.filename.clone(), json!({ "content": source }));
        json!({
            "description": format!("playbot paste ({})", channel),
            "public": false,
            "files": files,
        })
    }
}

pub fn parse_gist_response(body: &Value) -> Result<String> {
    body.get("html_url")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| Error::paste(format!("Gist reply has no html_url: {}", body)))
}

#[async_trait]
impl PasteService for GistPaste {
    async fn publish(&self, source: &str, channel: ReleaseChannel) -> Result<String> {
        let mut request = self
            .client
            .post(self.gist_url.clone())
            .json(&self.payload(source, channel));
        if let Some(token) = &self.token {
            request = request.header(
                reqwest::header::AUTHORIZATION,
                format!("token {}", token.expose_secret()),
            );
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::paste(format!("Gist request failed: {}", e)))?;
        if !response.status().is_success() {
            return Err(Error::paste(format!("Gist API responded with {}", response.status())));
        }
        let body: Value = response
            .json()
            .await
            .map_err(|e| Error::paste(format!("Malformed gist reply: {}", e)))?;

        parse_gist_response(&body)
    }
}

// =============================================================================
// Channel routing
// =============================================================================

/// Picks the gist service for unstable channels and the shortener otherwise.
pub struct ChannelPaste {
    shortener: Arc<dyn PasteService>,
    gist: Arc<dyn PasteService>,
}

impl ChannelPaste {
    pub fn new(shortener: Arc<dyn PasteService>, gist: Arc<dyn PasteService>) -> Self {
        Self { shortener, gist }
    }

    pub fn from_config(config: &PasteConfig) -> Result<Self> {
        Ok(Self::new(
            Arc::new(ShortenerPaste::new(config)?),
            Arc::new(GistPaste::new(config)?),
        ))
    }
}

#[async_trait]
impl PasteService for ChannelPaste {
    async fn publish(&self, source: &str, channel: ReleaseChannel) -> Result<String> {
        let (backend, service) = if channel.is_unstable() {
            ("gist", &self.gist)
        } else {
            ("shortener", &self.shortener)
        };

        let published = service.publish(source, channel).await;
        track_paste(backend, published.is_ok());
        published
    }
}

/// Publish `source`, turning any failure into `Err(PASTE_FAILED)` after
/// logging it. `Ok` carries the link.
pub async fn publish_or_apologize(
    paste: &dyn PasteService,
    source: &str,
    channel: ReleaseChannel,
) -> std::result::Result<String, &'static str> {
    match paste.publish(source, channel).await {
        Ok(url) => Ok(url),
        Err(e) => {
            tracing::error!(error = %e, channel = %channel, "Paste fallback failed");
            Err(PASTE_FAILED)
        }
    }
}

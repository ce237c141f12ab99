//! REST capability for the forge API

use std::future::Future;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, LINK, USER_AGENT};
use tracing::debug;
use url::Url;

use crate::error::{Error, Result};

const API_VERSION_HEADER: &str = "X-GitHub-Api-Version";
const API_VERSION: &str = "2022-11-28";

/// One page of a paginated REST response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestPage {
    pub body: Vec<u8>,
    /// URL of the next page, from the `Link` header
    pub next: Option<String>,
}

/// Authenticated GET access to the forge REST API
///
/// Non-2xx responses are reported as [`Error::Http`], transport failures as
/// [`Error::Transport`].
pub trait ApiClient: Send + Sync {
    /// GET `path` (relative to the API root, or an absolute page URL) and
    /// report the next page, if any
    fn rest_with_next(&self, path: &str) -> impl Future<Output = Result<RestPage>> + Send;

    /// GET `path` and return the body
    fn rest(&self, path: &str) -> impl Future<Output = Result<Vec<u8>>> + Send {
        async move { Ok(self.rest_with_next(path).await?.body) }
    }
}

/// API root for a forge host
///
/// `github.com` is served from `api.github.com`, data-residency tenants
/// (`*.ghe.com`) from `api.<host>`, and server installs from `/api/v3/`.
pub fn api_base_url(host: &str) -> Result<Url> {
    let host = host.trim_end_matches('/');
    let base = if host == "github.com" || host == "api.github.com" {
        "https://api.github.com/".to_string()
    } else if host.ends_with(".ghe.com") {
        format!("https://api.{host}/")
    } else if host.starts_with("http://") || host.starts_with("https://") {
        format!("{host}/")
    } else {
        format!("https://{host}/api/v3/")
    };
    Url::parse(&base).map_err(|e| Error::InvalidResponse(format!("invalid API host {host}: {e}")))
}

/// Extract the `rel="next"` target from a `Link` header
pub fn parse_next_link(header: &str) -> Option<String> {
    header.split(',').find_map(|part| {
        let mut pieces = part.split(';');
        let target = pieces.next()?.trim();
        let is_next = pieces.any(|p| {
            let p = p.trim();
            p == r#"rel="next""# || p == "rel=next"
        });
        if !is_next {
            return None;
        }
        target
            .strip_prefix('<')
            .and_then(|t| t.strip_suffix('>'))
            .map(str::to_string)
    })
}

/// [`ApiClient`] backed by a `reqwest` client
#[derive(Debug, Clone)]
pub struct RestClient {
    client: reqwest::Client,
    base_url: Url,
}

impl RestClient {
    /// Wrap a caller-configured client; auth headers are the caller's concern
    pub fn new(client: reqwest::Client, base_url: Url) -> Self {
        Self { client, base_url }
    }

    /// Build a client for `host`, authenticating with `token` when given
    pub fn for_host(host: &str, token: Option<&str>, user_agent: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(API_VERSION_HEADER, HeaderValue::from_static(API_VERSION));
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(user_agent).map_err(|e| Error::Transport(e.to_string()))?,
        );
        if let Some(token) = token {
            let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| Error::Transport(e.to_string()))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| Error::Transport(e.to_string()))?;

        Ok(Self::new(client, api_base_url(host)?))
    }

    fn resolve(&self, path: &str) -> Result<Url> {
        if path.starts_with("http://") || path.starts_with("https://") {
            return Url::parse(path).map_err(|e| Error::InvalidResponse(e.to_string()));
        }
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| Error::InvalidResponse(e.to_string()))
    }
}

impl ApiClient for RestClient {
    async fn rest_with_next(&self, path: &str) -> Result<RestPage> {
        let url = self.resolve(path)?;
        debug!(%url, "GET");

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Http {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let next = response
            .headers()
            .get(LINK)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_next_link);

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;

        Ok(RestPage {
            body: body.to_vec(),
            next,
        })
    }
}

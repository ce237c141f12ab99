//! Attestation fetch client
//!
//! [`LiveClient`] lists attestations for a subject digest, following
//! pagination up to the caller's limit, then materializes every bundle that
//! is only referenced by URL. Listing pages and bundle downloads are retried
//! independently, each under its own [`RetryPolicy`]; a failed page is
//! re-requested on its own, so pages already collected are never refetched.

use std::future::Future;

use attest_types::{Attestation, Bundle, Initiator};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::http::{Fetcher, ReqwestFetcher};
use crate::rest::{ApiClient, RestClient};
use crate::retry::{retry, RetryError, RetryPolicy};

/// Limit used when the caller does not pick one
pub const DEFAULT_LIMIT: usize = 30;

/// Largest limit the listing endpoint accepts
pub const MAX_LIMIT: usize = 1000;

/// Largest page the listing endpoint serves
pub const MAX_PAGE_SIZE: usize = 100;

/// Query for attestations of one subject digest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchParams {
    /// Subject digest as `<algorithm>:<hex>`
    pub digest: String,
    pub owner: Option<String>,
    /// `owner/name`; takes precedence over `owner`
    pub repo: Option<String>,
    pub predicate_type: Option<String>,
    pub initiator: Option<Initiator>,
    pub limit: usize,
}

impl FetchParams {
    pub fn new(digest: impl Into<String>) -> Self {
        Self {
            digest: digest.into(),
            owner: None,
            repo: None,
            predicate_type: None,
            initiator: None,
            limit: DEFAULT_LIMIT,
        }
    }

    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    pub fn with_repo(mut self, repo: impl Into<String>) -> Self {
        self.repo = Some(repo.into());
        self
    }

    pub fn with_predicate_type(mut self, predicate_type: impl Into<String>) -> Self {
        self.predicate_type = Some(predicate_type.into());
        self
    }

    pub fn with_initiator(mut self, initiator: Initiator) -> Self {
        self.initiator = Some(initiator);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.limit == 0 || self.limit > MAX_LIMIT {
            return Err(Error::InvalidLimit(self.limit));
        }
        Ok(())
    }

    /// Endpoint path for the first page, query included
    pub fn first_page_path(&self) -> Result<String> {
        let base = match (&self.repo, &self.owner) {
            (Some(repo), _) if !repo.is_empty() => {
                format!("repos/{}/attestations/{}", repo, self.digest)
            }
            (_, Some(owner)) if !owner.is_empty() => {
                format!("orgs/{}/attestations/{}", owner, self.digest)
            }
            _ => return Err(Error::MissingScope),
        };

        let mut query = url::form_urlencoded::Serializer::new(String::new());
        query.append_pair("per_page", &self.limit.min(MAX_PAGE_SIZE).to_string());
        if let Some(predicate_type) = self.predicate_type.as_deref().filter(|p| !p.is_empty()) {
            query.append_pair("predicate_type", predicate_type);
        }
        Ok(format!("{}?{}", base, query.finish()))
    }
}

/// Operations callers need from the attestation service
pub trait AttestationClient: Send + Sync {
    /// Attestations for `params.digest`, bundles materialized
    fn get_by_digest(
        &self,
        params: &FetchParams,
    ) -> impl Future<Output = Result<Vec<Attestation>>> + Send;

    /// Trust domain of the forge instance, empty for the default instance
    fn get_trust_domain(&self) -> impl Future<Output = Result<String>> + Send;
}

/// Connection settings for [`LiveClient::from_config`]
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Forge host, e.g. `github.com`
    pub host: String,
    pub token: Option<String>,
    pub user_agent: String,
    pub listing_retry: RetryPolicy,
    pub bundle_retry: RetryPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "github.com".to_string(),
            token: None,
            user_agent: concat!("attest-rs/", env!("CARGO_PKG_VERSION")).to_string(),
            listing_retry: RetryPolicy::default(),
            bundle_retry: RetryPolicy::default(),
        }
    }
}

impl ClientConfig {
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }
}

#[derive(Deserialize)]
struct AttestationsResponse {
    #[serde(default)]
    attestations: Vec<Attestation>,
}

#[derive(Default, Deserialize)]
struct MetaResponse {
    #[serde(default)]
    domains: Domains,
}

#[derive(Default, Deserialize)]
struct Domains {
    #[serde(default)]
    artifact_attestations: ArtifactAttestations,
}

#[derive(Default, Deserialize)]
struct ArtifactAttestations {
    #[serde(default)]
    trust_domain: String,
}

/// Attestation client over an [`ApiClient`] and a bundle [`Fetcher`]
#[derive(Debug, Clone)]
pub struct LiveClient<A, F> {
    api: A,
    http: F,
    listing_retry: RetryPolicy,
    bundle_retry: RetryPolicy,
    cancel: CancellationToken,
}

impl LiveClient<RestClient, ReqwestFetcher> {
    /// Client talking to a real forge
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        let api = RestClient::for_host(&config.host, config.token.as_deref(), &config.user_agent)?;
        Ok(Self::new(api, ReqwestFetcher::default())
            .with_listing_retry(config.listing_retry)
            .with_bundle_retry(config.bundle_retry))
    }
}

impl<A: ApiClient, F: Fetcher> LiveClient<A, F> {
    pub fn new(api: A, http: F) -> Self {
        Self {
            api,
            http,
            listing_retry: RetryPolicy::default(),
            bundle_retry: RetryPolicy::default(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_listing_retry(mut self, policy: RetryPolicy) -> Self {
        self.listing_retry = policy;
        self
    }

    pub fn with_bundle_retry(mut self, policy: RetryPolicy) -> Self {
        self.bundle_retry = policy;
        self
    }

    /// Abort in-flight retry loops when `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// List attestations page by page, without materializing bundles
    pub async fn list_attestations(&self, params: &FetchParams) -> Result<Vec<Attestation>> {
        params.validate()?;
        let mut next = Some(params.first_page_path()?);
        let mut attestations = Vec::new();

        while let Some(path) = next.take() {
            let page = self.fetch_page(&path).await?;
            let response: AttestationsResponse = serde_json::from_slice(&page.body)
                .map_err(|e| Error::InvalidResponse(format!("attestation list: {e}")))?;

            let received = response.attestations.len();
            attestations.extend(
                response
                    .attestations
                    .into_iter()
                    .filter(|a| initiator_matches(a, params.initiator.as_ref())),
            );
            debug!(received, total = attestations.len(), "fetched attestation page");

            if attestations.len() >= params.limit {
                attestations.truncate(params.limit);
                break;
            }
            next = page.next;
        }

        if attestations.is_empty() {
            return Err(Error::NoAttestationsFound);
        }
        Ok(attestations)
    }

    async fn fetch_page(&self, path: &str) -> Result<crate::rest::RestPage> {
        let api = &self.api;
        retry(&self.listing_retry, &self.cancel, |attempt| async move {
            if attempt > 1 {
                debug!(path, attempt, "retrying attestation page");
            }
            api.rest_with_next(path).await.map_err(RetryError::classify)
        })
        .await
    }

    /// Give every attestation an inline bundle
    ///
    /// A bundle URL, when present, is authoritative and fetched; the inline
    /// bundle is used only when the URL is empty. The first failure aborts the
    /// whole batch.
    pub async fn fetch_bundles(&self, attestations: Vec<Attestation>) -> Result<Vec<Attestation>> {
        let mut fetched = Vec::with_capacity(attestations.len());
        for mut attestation in attestations {
            match (&attestation.bundle_url, &attestation.bundle) {
                (Some(url), _) => {
                    let bundle = self.get_bundle(url).await?;
                    attestation.bundle = Some(bundle);
                }
                (None, Some(_)) => {
                    debug!("attestation has no bundle URL, using the inline bundle");
                }
                (None, None) => return Err(Error::MissingBundle),
            }
            fetched.push(attestation);
        }
        Ok(fetched)
    }

    /// Download a snappy-compressed bundle
    pub async fn get_bundle(&self, url: &str) -> Result<Bundle> {
        let http = &self.http;
        retry(&self.bundle_retry, &self.cancel, |_| async move {
            let response = http.get(url).await.map_err(RetryError::classify)?;
            if !response.is_success() {
                return Err(RetryError::classify(Error::Http {
                    status: response.status,
                    url: url.to_string(),
                }));
            }
            decode_bundle(&response.body).map_err(RetryError::Permanent)
        })
        .await
    }
}

impl<A: ApiClient, F: Fetcher> AttestationClient for LiveClient<A, F> {
    async fn get_by_digest(&self, params: &FetchParams) -> Result<Vec<Attestation>> {
        let attestations = self.list_attestations(params).await?;
        let attestations = self.fetch_bundles(attestations).await?;
        info!(
            count = attestations.len(),
            digest = %params.digest,
            "loaded attestations from the API"
        );
        Ok(attestations)
    }

    async fn get_trust_domain(&self) -> Result<String> {
        let body = self.api.rest("meta").await?;
        let meta: MetaResponse = serde_json::from_slice(&body)
            .map_err(|e| Error::InvalidResponse(format!("meta: {e}")))?;
        Ok(meta.domains.artifact_attestations.trust_domain)
    }
}

fn initiator_matches(attestation: &Attestation, wanted: Option<&Initiator>) -> bool {
    match wanted {
        None => true,
        Some(wanted) => attestation.initiator.as_ref() == Some(wanted),
    }
}

fn decode_bundle(body: &[u8]) -> Result<Bundle> {
    let json = snap::raw::Decoder::new()
        .decompress_vec(body)
        .map_err(|e| Error::InvalidBundle(format!("failed to decompress: {e}")))?;
    let bundle = Bundle::from_slice(&json).map_err(|e| Error::InvalidBundle(e.to_string()))?;
    bundle
        .validate()
        .map_err(|e| Error::InvalidBundle(e.to_string()))?;
    Ok(bundle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::HttpResponse;
    use crate::rest::RestPage;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    const DIGEST: &str = "sha256:12313213";
    const BUNDLE_URL: &str = "https://example.com/bundle";

    fn bundle_json() -> String {
        serde_json::json!({
            "mediaType": "application/vnd.dev.sigstore.bundle.v0.3+json",
            "verificationMaterial": {
                "certificate": {"rawBytes": "AQID"},
                "tlogEntries": [{"logIndex": "1", "integratedTime": "1700000000"}]
            },
            "dsseEnvelope": {
                "payload": "e30=",
                "payloadType": "application/vnd.in-toto+json",
                "signatures": [{"sig": "AA=="}]
            }
        })
        .to_string()
    }

    fn compressed_bundle() -> Vec<u8> {
        snap::raw::Encoder::new()
            .compress_vec(bundle_json().as_bytes())
            .unwrap()
    }

    fn attestation_json(index: usize, initiator: &str) -> serde_json::Value {
        serde_json::json!({"bundle_url": bundle_url(index), "initiator": initiator})
    }

    fn bundle_url(index: usize) -> String {
        format!("{BUNDLE_URL}/{index}")
    }

    fn bundle_urls(attestations: &[Attestation]) -> Vec<String> {
        attestations
            .iter()
            .map(|a| a.bundle_url.clone().unwrap_or_default())
            .collect()
    }

    fn numbered(indices: impl IntoIterator<Item = usize>) -> Vec<String> {
        indices.into_iter().map(bundle_url).collect()
    }

    /// Serves `pages` in order, failing the scripted call numbers with 500
    #[derive(Default)]
    struct FakeApi {
        pages: Vec<Vec<serde_json::Value>>,
        fail_calls: Vec<usize>,
        always_fail: bool,
        calls: AtomicUsize,
        paths: Mutex<Vec<String>>,
        meta: Option<String>,
    }

    impl FakeApi {
        fn with_pages(pages: Vec<Vec<serde_json::Value>>) -> Self {
            Self {
                pages,
                ..Default::default()
            }
        }

        /// Pages of user attestations numbered from 0 across pages
        fn user_pages(page_sizes: &[usize]) -> Self {
            let mut next = 0;
            let pages = page_sizes
                .iter()
                .map(|n| {
                    let page: Vec<_> = (next..next + n).map(|i| attestation_json(i, "user")).collect();
                    next += n;
                    page
                })
                .collect();
            Self::with_pages(pages)
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl ApiClient for FakeApi {
        async fn rest_with_next(&self, path: &str) -> Result<RestPage> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            self.paths.lock().unwrap().push(path.to_string());

            if self.always_fail || self.fail_calls.contains(&call) {
                return Err(Error::Http {
                    status: 500,
                    url: path.to_string(),
                });
            }
            if path == "meta" {
                return match &self.meta {
                    Some(body) => Ok(RestPage {
                        body: body.clone().into_bytes(),
                        next: None,
                    }),
                    None => Err(Error::Http {
                        status: 404,
                        url: path.to_string(),
                    }),
                };
            }

            let index = match path.strip_prefix("page-") {
                Some(n) => n.parse::<usize>().unwrap(),
                None => 0,
            };
            let body = serde_json::json!({"attestations": self.pages[index]});
            let next = (index + 1 < self.pages.len()).then(|| format!("page-{}", index + 1));
            Ok(RestPage {
                body: body.to_string().into_bytes(),
                next,
            })
        }
    }

    /// Replays scripted responses, repeating the last one
    struct FakeFetcher {
        responses: Mutex<VecDeque<Result<HttpResponse>>>,
        last: fn() -> Result<HttpResponse>,
        calls: AtomicUsize,
    }

    impl FakeFetcher {
        fn always(last: fn() -> Result<HttpResponse>) -> Self {
            Self {
                responses: Mutex::new(VecDeque::new()),
                last,
                calls: AtomicUsize::new(0),
            }
        }

        fn scripted(first: Vec<Result<HttpResponse>>, last: fn() -> Result<HttpResponse>) -> Self {
            Self {
                responses: Mutex::new(first.into()),
                last,
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl Fetcher for FakeFetcher {
        async fn get(&self, _url: &str) -> Result<HttpResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let scripted = self.responses.lock().unwrap().pop_front();
            scripted.unwrap_or_else(self.last)
        }
    }

    fn ok_bundle() -> Result<HttpResponse> {
        Ok(HttpResponse::ok(compressed_bundle()))
    }

    fn server_error() -> Result<HttpResponse> {
        Ok(HttpResponse {
            status: 503,
            body: Vec::new(),
        })
    }

    fn connection_reset() -> Result<HttpResponse> {
        Err(Error::Transport("connection reset".to_string()))
    }

    fn not_snappy() -> Result<HttpResponse> {
        Ok(HttpResponse::ok(b"definitely not a bundle".to_vec()))
    }

    fn client(api: FakeApi, http: FakeFetcher) -> LiveClient<FakeApi, FakeFetcher> {
        LiveClient::new(api, http)
            .with_listing_retry(RetryPolicy::immediate(4))
            .with_bundle_retry(RetryPolicy::immediate(4))
    }

    fn repo_params() -> FetchParams {
        FetchParams::new(DIGEST)
            .with_repo("github/example")
            .with_predicate_type("https://slsa.dev/provenance/v1")
            .with_initiator(Initiator::User)
    }

    #[test]
    fn test_first_page_path() {
        let params = FetchParams::new(DIGEST).with_repo("github/example").with_limit(250);
        assert_eq!(
            params.first_page_path().unwrap(),
            "repos/github/example/attestations/sha256:12313213?per_page=100"
        );

        let params = FetchParams::new(DIGEST)
            .with_owner("github")
            .with_predicate_type("https://slsa.dev/provenance/v1");
        assert_eq!(
            params.first_page_path().unwrap(),
            "orgs/github/attestations/sha256:12313213?per_page=30&predicate_type=https%3A%2F%2Fslsa.dev%2Fprovenance%2Fv1"
        );

        assert!(matches!(
            FetchParams::new(DIGEST).first_page_path(),
            Err(Error::MissingScope)
        ));
    }

    #[tokio::test]
    async fn test_get_by_digest_single_page() {
        let c = client(FakeApi::user_pages(&[5]), FakeFetcher::always(ok_bundle));
        let attestations = c.get_by_digest(&repo_params()).await.unwrap();
        assert_eq!(bundle_urls(&attestations), numbered(0..5));
        assert_eq!(
            attestations[0].bundle.as_ref().unwrap().media_type,
            "application/vnd.dev.sigstore.bundle.v0.3+json"
        );
        assert_eq!(c.http.calls(), 5);
    }

    #[tokio::test]
    async fn test_get_by_digest_with_owner() {
        let c = client(FakeApi::user_pages(&[5]), FakeFetcher::always(ok_bundle));
        let params = FetchParams::new(DIGEST).with_owner("github");
        let attestations = c.get_by_digest(&params).await.unwrap();
        assert_eq!(attestations.len(), 5);
        assert!(c.api.paths.lock().unwrap()[0].starts_with("orgs/github/attestations/"));
    }

    #[tokio::test]
    async fn test_limit_truncates_results() {
        let c = client(FakeApi::user_pages(&[5]), FakeFetcher::always(ok_bundle));
        let attestations = c
            .get_by_digest(&repo_params().with_limit(3))
            .await
            .unwrap();
        assert_eq!(bundle_urls(&attestations), numbered(0..3));
        assert_eq!(c.http.calls(), 3);
    }

    #[tokio::test]
    async fn test_follows_next_page() {
        let c = client(FakeApi::user_pages(&[5, 5]), FakeFetcher::always(ok_bundle));
        let attestations = c.get_by_digest(&repo_params()).await.unwrap();
        assert_eq!(bundle_urls(&attestations), numbered(0..10));
        assert_eq!(c.api.calls(), 2);
    }

    #[tokio::test]
    async fn test_limit_across_pages_stops_paginating() {
        let c = client(
            FakeApi::user_pages(&[5, 5, 5]),
            FakeFetcher::always(ok_bundle),
        );
        let attestations = c
            .get_by_digest(&repo_params().with_limit(7))
            .await
            .unwrap();
        // all of page 0, then the head of page 1
        assert_eq!(bundle_urls(&attestations), numbered(0..7));
        assert_eq!(c.api.calls(), 2);
    }

    #[tokio::test]
    async fn test_initiator_filter() {
        let page: Vec<_> = (0..9)
            .map(|i| attestation_json(i, if i % 2 == 0 { "user" } else { "github" }))
            .collect();
        let c = client(FakeApi::with_pages(vec![page]), FakeFetcher::always(ok_bundle));

        let params = FetchParams::new(DIGEST)
            .with_repo("github/example")
            .with_initiator(Initiator::Platform);
        let attestations = c.get_by_digest(&params).await.unwrap();
        assert_eq!(bundle_urls(&attestations), numbered([1, 3, 5, 7]));
        assert!(attestations
            .iter()
            .all(|a| a.initiator == Some(Initiator::Platform)));
    }

    #[tokio::test]
    async fn test_no_attestations_found() {
        let c = client(FakeApi::user_pages(&[0]), FakeFetcher::always(ok_bundle));
        let err = c.get_by_digest(&repo_params()).await.unwrap_err();
        assert!(matches!(err, Error::NoAttestationsFound));
    }

    #[tokio::test]
    async fn test_invalid_limit() {
        let c = client(FakeApi::user_pages(&[5]), FakeFetcher::always(ok_bundle));
        for limit in [0, MAX_LIMIT + 1] {
            let err = c
                .get_by_digest(&repo_params().with_limit(limit))
                .await
                .unwrap_err();
            assert!(matches!(err, Error::InvalidLimit(l) if l == limit));
        }
        assert_eq!(c.api.calls(), 0);
    }

    #[tokio::test]
    async fn test_listing_retries_failed_page_only() {
        // Call 2 (the second page) fails twice, then succeeds
        let api = FakeApi {
            fail_calls: vec![2, 3],
            ..FakeApi::user_pages(&[5, 5])
        };
        let c = client(api, FakeFetcher::always(ok_bundle));

        let attestations = c.get_by_digest(&repo_params()).await.unwrap();
        // the retried page is appended once, after page 0
        assert_eq!(bundle_urls(&attestations), numbered(0..10));
        assert_eq!(c.api.calls(), 4);

        let paths = c.api.paths.lock().unwrap();
        assert!(paths[0].starts_with("repos/"));
        assert_eq!(&paths[1..], ["page-1", "page-1", "page-1"]);
    }

    #[tokio::test]
    async fn test_listing_gives_up_after_max_attempts() {
        let api = FakeApi {
            always_fail: true,
            ..FakeApi::user_pages(&[5])
        };
        let c = client(api, FakeFetcher::always(ok_bundle));

        let err = c.get_by_digest(&repo_params()).await.unwrap_err();
        assert!(matches!(err, Error::RetriesExhausted { attempts: 4, .. }));
        assert_eq!(c.api.calls(), 4);
    }

    #[tokio::test]
    async fn test_fetch_bundles_missing_bundle_and_url() {
        let c = client(FakeApi::default(), FakeFetcher::always(ok_bundle));
        let err = c
            .fetch_bundles(vec![Attestation::default()])
            .await
            .unwrap_err();
        assert!(err
            .to_string()
            .contains("attestation has no bundle or bundle URL"));
    }

    #[tokio::test]
    async fn test_fetch_bundles_falls_back_to_inline_bundle() {
        let c = client(FakeApi::default(), FakeFetcher::always(ok_bundle));
        let inline = Bundle::from_json(&bundle_json()).unwrap();
        let fetched = c
            .fetch_bundles(vec![Attestation::from_bundle(inline.clone())])
            .await
            .unwrap();
        assert_eq!(fetched[0].bundle.as_ref(), Some(&inline));
        assert_eq!(c.http.calls(), 0);
    }

    #[tokio::test]
    async fn test_fetch_bundles_fails_on_second_attestation() {
        let http = FakeFetcher::scripted(vec![ok_bundle()], server_error);
        let c = client(FakeApi::default(), http);
        let attestations = vec![
            Attestation::default().with_bundle_url(BUNDLE_URL),
            Attestation::default().with_bundle_url(BUNDLE_URL),
        ];
        assert!(c.fetch_bundles(attestations).await.is_err());
        assert_eq!(c.http.calls(), 5);
    }

    #[tokio::test]
    async fn test_get_bundle_first_try() {
        let c = client(FakeApi::default(), FakeFetcher::always(ok_bundle));
        let bundle = c.get_bundle(BUNDLE_URL).await.unwrap();
        assert_eq!(
            bundle.media_type,
            "application/vnd.dev.sigstore.bundle.v0.3+json"
        );
        assert_eq!(c.http.calls(), 1);
    }

    #[tokio::test]
    async fn test_get_bundle_retries_server_error() {
        let http = FakeFetcher::scripted(vec![server_error()], ok_bundle);
        let c = client(FakeApi::default(), http);
        c.get_bundle(BUNDLE_URL).await.unwrap();
        assert_eq!(c.http.calls(), 2);
    }

    #[tokio::test]
    async fn test_get_bundle_invalid_content_is_permanent() {
        let c = client(FakeApi::default(), FakeFetcher::always(not_snappy));
        let err = c.get_bundle(BUNDLE_URL).await.unwrap_err();
        assert!(matches!(err, Error::InvalidBundle(_)));
        assert_eq!(c.http.calls(), 1);
    }

    #[tokio::test]
    async fn test_get_bundle_request_failure_retried() {
        let c = client(FakeApi::default(), FakeFetcher::always(connection_reset));
        let err = c.get_bundle(BUNDLE_URL).await.unwrap_err();
        assert!(matches!(err.root(), Error::Transport(_)));
        assert_eq!(c.http.calls(), 4);
    }

    #[tokio::test]
    async fn test_get_bundle_client_error_not_retried() {
        fn not_found() -> Result<HttpResponse> {
            Ok(HttpResponse {
                status: 404,
                body: Vec::new(),
            })
        }
        let c = client(FakeApi::default(), FakeFetcher::always(not_found));
        let err = c.get_bundle(BUNDLE_URL).await.unwrap_err();
        assert!(matches!(err, Error::Http { status: 404, .. }));
        assert_eq!(c.http.calls(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_client_makes_no_requests() {
        let token = CancellationToken::new();
        token.cancel();
        let c = client(FakeApi::user_pages(&[5]), FakeFetcher::always(ok_bundle))
            .with_cancellation(token);
        let err = c.get_by_digest(&repo_params()).await.unwrap_err();
        assert!(matches!(err, Error::Cancelled));
        assert_eq!(c.api.calls(), 0);
    }

    #[tokio::test]
    async fn test_get_trust_domain() {
        let api = FakeApi {
            meta: Some(
                r#"{"domains":{"artifact_attestations":{"trust_domain":"foo"}}}"#.to_string(),
            ),
            ..Default::default()
        };
        let c = client(api, FakeFetcher::always(ok_bundle));
        assert_eq!(c.get_trust_domain().await.unwrap(), "foo");
    }

    #[tokio::test]
    async fn test_get_trust_domain_error() {
        let c = client(FakeApi::default(), FakeFetcher::always(ok_bundle));
        let err = c.get_trust_domain().await.unwrap_err();
        assert!(matches!(err, Error::Http { status: 404, .. }));
    }
}

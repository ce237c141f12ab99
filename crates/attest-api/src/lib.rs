//! Client for the forge's artifact attestation API
//!
//! The client lists attestations by subject digest and downloads the signed
//! bundles they reference. Network access goes through two injectable
//! capabilities so the client can run against in-memory fakes:
//!
//! - [`ApiClient`]: authenticated REST calls with `Link`-header pagination
//! - [`Fetcher`]: plain GETs for bundle URLs
//!
//! Transient failures (transport errors, 5xx) are retried under a
//! [`RetryPolicy`]; everything else surfaces immediately as a typed [`Error`].
//!
//! # Example
//!
//! ```no_run
//! use attest_api::{AttestationClient, ClientConfig, FetchParams, LiveClient};
//!
//! # async fn example() -> Result<(), attest_api::Error> {
//! let client = LiveClient::from_config(&ClientConfig::default().with_token("ghp_example"))?;
//! let params = FetchParams::new("sha256:7d8e...").with_repo("octo-org/octo-repo");
//! let attestations = client.get_by_digest(&params).await?;
//! println!("found {} attestations", attestations.len());
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod http;
pub mod rest;
pub mod retry;

pub use client::{
    AttestationClient, ClientConfig, FetchParams, LiveClient, DEFAULT_LIMIT, MAX_LIMIT,
    MAX_PAGE_SIZE,
};
pub use error::{Error, Result};
pub use http::{Fetcher, HttpResponse, ReqwestFetcher};
pub use rest::{ApiClient, RestClient, RestPage};
pub use retry::{retry, RetryError, RetryPolicy};

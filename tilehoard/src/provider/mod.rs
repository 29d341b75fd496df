//! Upstream tile server access
//!
//! A [`ServerEndpoint`] describes one slippy-map server through a
//! [`UrlTemplate`]. Requests go through the [`AsyncHttpClient`] trait so
//! workers can be driven by a mock client in tests:
//!
//! ```ignore
//! use tilehoard::provider::{AsyncHttpClient, AsyncReqwestClient, ServerEndpoint, UrlTemplate};
//!
//! let client = AsyncReqwestClient::new(Duration::from_secs(30), "tilehoard/0.1")?;
//! let server = ServerEndpoint::new(UrlTemplate::parse("https://tile.example.org/{z}/{x}/{y}.png")?);
//! let body = client.get_with_headers(&server.url_for(&tile), server.headers()).await?;
//! ```

mod endpoint;
mod http;
mod template;
mod types;

pub use endpoint::ServerEndpoint;
pub use http::{AsyncHttpClient, AsyncReqwestClient};
pub use template::{TemplateError, UrlTemplate};
pub use types::ProviderError;

#[cfg(test)]
pub use http::tests::{MockHttpClient, PNG_TILE};

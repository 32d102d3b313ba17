//! Upstream gateways.
//!
//! The composition engine talks to upstream services through the narrow
//! [`FragmentSource`] trait only. A source never fails: transport problems
//! are folded into [`FragmentResponse::failure`] or an empty placeholder.
//!
//! # Module Structure
//!
//! - `fragment` - per-fragment render configuration and assets
//! - `response` - content responses, cookies, placeholders
//! - `registry` - atomically swappable gateway table
//! - `local` - configuration-backed source used by the CLI

mod fragment;
mod local;
mod registry;
mod response;

#[cfg(test)]
pub mod testing;

pub use fragment::{AssetKind, AssetLocation, FragmentAsset, FragmentConfig};
pub use local::{LocalFragment, LocalSource};
pub use registry::{Gateway, GatewayMap, GatewayRegistry};
pub use response::{CookieExpiry, FragmentResponse, Placeholder, ResponseCookie};

use async_trait::async_trait;
use serde_json::Value;

use crate::template::ForwardedAttributes;

/// Arguments of one upstream call.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub gateway: String,
    pub fragment: String,
    /// Effective version after cookie negotiation.
    pub version: String,
    /// Reference attributes after expression evaluation.
    pub attributes: ForwardedAttributes,
    /// Request context as seen by expressions (`req`).
    pub request: Value,
}

#[async_trait]
pub trait FragmentSource: Send + Sync {
    async fn content(&self, request: FetchRequest) -> FragmentResponse;

    async fn placeholder(&self, request: FetchRequest) -> Placeholder;
}

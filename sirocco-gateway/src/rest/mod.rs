//! REST layer: pooled HTTP clients, request building and signing.

mod client;
mod config;
mod pool;
mod signer;

pub use client::{RequestBuilder, RestClient};
pub use config::{RestConfig, RestConfigBuilder};
pub use pool::HttpPool;
pub use signer::{build_query_string, build_signed_query_string, RequestSigner, SignatureType};

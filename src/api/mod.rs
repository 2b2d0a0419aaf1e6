//! Remote service boundary
//!
//! - `types`: wire payloads
//! - `service`: the `IndexService` trait and `ApiError`
//! - `http`: reqwest implementation
//! - `media`: thumbnail / file URL construction

pub mod http;
pub mod media;
pub mod service;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use http::{HttpIndexService, ServiceConfig};
pub use media::MediaUrls;
pub use service::{ApiError, FaceQuery, IndexService, ReferenceImage, SearchQuery};
pub use types::*;

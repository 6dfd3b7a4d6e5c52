//! # HTTP Handlers
//!
//! - [`query`]: listings and lookups read through the cache
//! - [`mutation`]: writes followed by category invalidation
//! - [`admin`]: cache administration and the invalidation event stream

pub mod admin;
pub mod mutation;
pub mod query;

use axum::Json;
use axum::http::HeaderValue;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use fieldops_cache::{Fetched, ReadStrategy};

/// Response header reporting `hit` or `miss`
pub const CACHE_HEADER: &str = "x-cache";

/// JSON body plus the cache origin header
pub(crate) fn cached<T: Serialize>(fetched: Fetched<T>) -> Response {
    let mut response = Json(fetched.value).into_response();
    response.headers_mut().insert(
        CACHE_HEADER,
        HeaderValue::from_static(fetched.origin.as_str()),
    );
    response
}

/// `?refresh=true` bypasses the cached copy and repopulates it
pub(crate) fn read_strategy(refresh: bool) -> ReadStrategy {
    if refresh {
        ReadStrategy::RefreshThrough
    } else {
        ReadStrategy::CacheFirst
    }
}

//! Handshake authorization
//!
//! The server asks an [`Authorize`] implementation whether a handshake request
//! may open a session. The decision is a plain yes/no: a rejection is answered
//! with an empty 401 and no reason is ever sent to the client.

use axum::http::request::Parts;

/// Predicate over the raw handshake request
pub trait Authorize: Send + Sync {
    fn authorize(&self, request: &Parts) -> bool;
}

impl<F> Authorize for F
where
    F: Fn(&Parts) -> bool + Send + Sync,
{
    fn authorize(&self, request: &Parts) -> bool {
        self(request)
    }
}

/// Default policy: every handshake is accepted
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl Authorize for AllowAll {
    fn authorize(&self, _request: &Parts) -> bool {
        true
    }
}

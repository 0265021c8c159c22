//! # HTTP Model
//!
//! The request and response types the dispatch core reads and writes. A host
//! server (see [`crate::server`]) converts its own wire types into a
//! [`Request`], hands it to [`crate::api::ApiServer::handle`] and writes the
//! returned [`Response`] back out.
//!
//! Headers are kept in a [`HeaderVec`]: a stack-allocated vector of
//! `(name, value)` pairs with case-insensitive lookup. Most requests carry
//! fewer than 16 headers, so the common case never touches the heap.

mod range;
mod request;
mod response;

pub use range::{ByteRange, RangeError, RangeSpec};
pub use request::Request;
pub use response::{Body, Readable, Response};

use std::sync::Arc;

use smallvec::SmallVec;

/// Header storage: `(name, value)` pairs, inline up to 16.
pub type HeaderVec = SmallVec<[(Arc<str>, String); 16]>;

/// Case-insensitive header lookup.
#[must_use]
pub fn find_header<'a>(headers: &'a HeaderVec, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}

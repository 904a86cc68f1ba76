//! Provider-facing data: the VK ID endpoint set and the profile shapes it returns.
//!
//! `endpoints` holds validated endpoint URLs (HTTPS-only outside loopback hosts) behind a
//! builder seeded with the production VK ID addresses. `profile` holds the raw `user_info`
//! payload and its normalization into a [`CanonicalIdentity`].

pub mod endpoints;
pub mod profile;

pub use endpoints::*;
pub use profile::*;

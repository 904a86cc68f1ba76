//! Auth-domain identifiers, redacted secrets, and PKCE/state security parameters.

pub mod id;
pub mod pkce;
pub mod secret;

pub use id::*;
pub use pkce::*;
pub use secret::*;

//! URL handling: canonicalization, domain extraction, wildcard domain
//! matching, and content-identity fingerprinting.

mod domain;
mod fingerprint;
mod matcher;
mod normalize;

pub use domain::extract_domain;
pub use fingerprint::fingerprint;
pub use matcher::matches_wildcard;
pub use normalize::normalize_url;

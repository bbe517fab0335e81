//! `lumenr-auth`: authentication boundary.
//!
//! Turns a bearer token into an explicit [`Principal`] that every service
//! operation takes as a parameter. Decoupled from HTTP and storage.

pub mod claims;
pub mod jwt;
pub mod principal;

pub use claims::{JwtClaims, TokenValidationError, validate_claims};
pub use jwt::{Hs256JwtValidator, JwtValidator};
pub use principal::Principal;

use serde::{Deserialize, Serialize};

use lumenr_core::UserId;

use crate::JwtClaims;

/// The authenticated account a request acts for.
///
/// Built once at the transport boundary from verified claims and then passed
/// explicitly into every quote, invoice and conversion operation.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Principal {
    user_id: UserId,
}

impl Principal {
    pub fn new(user_id: UserId) -> Self {
        Self { user_id }
    }

    pub fn from_claims(claims: &JwtClaims) -> Self {
        Self::new(claims.sub)
    }

    /// Owner id used to scope every read and write.
    pub fn user_id(&self) -> UserId {
        self.user_id
    }
}

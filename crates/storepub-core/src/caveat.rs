//! Locate the identity caveat inside a root token.

use crate::error::{PublishError, PublishResult};
use crate::macaroon::Macaroon;
use crate::types::{CaveatId, RootToken};

/// Identifier of the first third-party caveat whose location equals `authority`.
///
/// No match is [`PublishError::CaveatNotFound`]; that is an integration
/// error and is never retried.
pub fn find_caveat(root: &RootToken, authority: &str) -> PublishResult<CaveatId> {
    let macaroon = Macaroon::deserialize(root.as_str())?;

    let caveat_id = macaroon
        .third_party_caveats()
        .find(|c| c.location.as_deref() == Some(authority))
        .map(|c| c.caveat_id.clone())
        .ok_or_else(|| PublishError::CaveatNotFound {
            authority: authority.to_string(),
        })?;

    String::from_utf8(caveat_id)
        .map(CaveatId)
        .map_err(|_| PublishError::InvalidToken {
            message: format!("caveat id for {} is not UTF-8", authority),
        })
}

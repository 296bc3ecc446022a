//! Bind a discharge to its root token, and refresh discharges.

use tracing::debug;

use crate::client::StoreClient;
use crate::error::{PublishError, PublishResult};
use crate::macaroon::Macaroon;
use crate::types::{DischargeResponse, DischargeToken, PresentableCredential, RootToken};

const REFRESH_PATH: &str = "api/v2/tokens/refresh";

/// Build the `Authorization` value for a (root, discharge) pair.
///
/// The discharge signature is rebound to the root signature, so the
/// header is only valid for this exact root token.
pub fn bind(root: &RootToken, discharge: &DischargeToken) -> PublishResult<PresentableCredential> {
    let root_macaroon = Macaroon::deserialize(root.as_str())?;
    let discharge_macaroon = Macaroon::deserialize(discharge.as_str())?;
    let bound = root_macaroon.bind_discharge(&discharge_macaroon);

    Ok(PresentableCredential::new(format!(
        "Macaroon root=\"{}\", discharge=\"{}\"",
        root.as_str(),
        bound.serialize()
    )))
}

impl StoreClient {
    /// Exchange `discharge` for a newer one. Any rejection is `RefreshFailed`.
    pub async fn refresh(&self, discharge: &DischargeToken) -> PublishResult<DischargeToken> {
        let url = self.login_url(REFRESH_PATH);
        let body = serde_json::json!({ "discharge_macaroon": discharge.as_str() });

        let response: DischargeResponse = self
            .http
            .post_json(&url, &body, None)
            .await
            .map_err(|f| PublishError::RefreshFailed {
                message: f.to_string(),
            })?;

        debug!("refreshed discharge");
        Ok(DischargeToken::new(response.discharge_macaroon))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair() -> (RootToken, DischargeToken) {
        let root = Macaroon::mint("dashboard.example", "root", b"root-key")
            .add_third_party_caveat("login.example", "cid", b"vid".to_vec());
        let discharge = Macaroon::mint("login.example", "cid", b"caveat-key")
            .add_first_party_caveat("time-before 2030-01-01T00:00:00Z");
        (
            RootToken::new(root.serialize()),
            DischargeToken::new(discharge.serialize()),
        )
    }

    #[test]
    fn test_bind_header_shape() {
        let (root, discharge) = pair();
        let credential = bind(&root, &discharge).unwrap();
        let header = credential.header_value();
        assert!(header.starts_with(&format!("Macaroon root=\"{}\", discharge=\"", root.as_str())));
        assert!(header.ends_with('"'));
    }

    #[test]
    fn test_bind_is_not_concatenation() {
        let (root, discharge) = pair();
        let credential = bind(&root, &discharge).unwrap();
        assert!(!credential.header_value().contains(discharge.as_str()));
    }

    #[test]
    fn test_bind_deterministic() {
        let (root, discharge) = pair();
        assert_eq!(
            bind(&root, &discharge).unwrap(),
            bind(&root, &discharge).unwrap()
        );
    }

    #[test]
    fn test_bound_discharge_keeps_identity() {
        let (root, discharge) = pair();
        let header = bind(&root, &discharge).unwrap().header_value().to_string();
        let bound = header
            .rsplit("discharge=\"")
            .next()
            .unwrap()
            .trim_end_matches('"');
        let bound = Macaroon::deserialize(bound).unwrap();
        let original = Macaroon::deserialize(discharge.as_str()).unwrap();
        assert_eq!(bound.identifier(), original.identifier());
        assert_eq!(bound.caveats(), original.caveats());
        assert_ne!(bound.signature(), original.signature());
    }

    #[test]
    fn test_bind_rejects_malformed() {
        let (root, _) = pair();
        assert!(matches!(
            bind(&root, &DischargeToken::new("not a macaroon")),
            Err(PublishError::InvalidToken { .. })
        ));
    }
}

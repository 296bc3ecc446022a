//! Root token issuance and caveat discharge.
//!
//! Discharge is a small state machine:
//!
//! ```text
//! AwaitingPrimaryFactor --(TWOFACTOR_REQUIRED)--> AwaitingSecondFactor --> Discharged
//!          |                                               |
//!          +------------------ AuthenticationFailed <------+
//! ```
//!
//! The second factor is asked for at most once per call.

use serde::Serialize;
use tracing::{debug, info};

use crate::client::{HttpFailure, StoreClient};
use crate::error::{PublishError, PublishResult};
use crate::prompt::SecretPrompt;
use crate::types::{
    CaveatId, DischargeResponse, DischargeToken, IdentityErrorBody, IssueResponse, RootToken,
};

const ACL_PATH: &str = "dev/api/acl/";
const DISCHARGE_PATH: &str = "api/v2/tokens/discharge";
const SECOND_FACTOR_CODE: &str = "TWOFACTOR_REQUIRED";

#[derive(Serialize)]
struct DischargeRequest<'a> {
    email: &'a str,
    password: &'a str,
    caveat_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    otp: Option<&'a str>,
}

impl StoreClient {
    /// Ask the store for a new root token carrying the identity caveat.
    pub async fn issue_root_token(&self) -> PublishResult<RootToken> {
        let url = self.dashboard_url(ACL_PATH);
        let body = serde_json::json!({ "permissions": self.config.permissions });

        let response: IssueResponse = self
            .http
            .post_json(&url, &body, None)
            .await
            .map_err(|f| PublishError::TokenIssuance {
                message: f.to_string(),
            })?;

        debug!("issued root token");
        Ok(RootToken::new(response.macaroon))
    }

    /// Exchange login credentials for a discharge of `caveat`.
    pub async fn authenticate(
        &self,
        caveat: &CaveatId,
        prompt: &dyn SecretPrompt,
    ) -> PublishResult<DischargeToken> {
        let email = prompt.ask("Email")?;
        let password = prompt.ask_secret("Password")?;

        match self
            .request_discharge(caveat, &email, &password, None)
            .await
        {
            Ok(discharge) => Ok(discharge),
            Err(failure) if is_second_factor_required(&failure) => {
                info!("second factor required");
                let otp = prompt.ask_secret("Second-factor code")?;
                self.request_discharge(caveat, &email, &password, Some(otp.as_str()))
                    .await
                    .map_err(authentication_failed)
            }
            Err(failure) => Err(authentication_failed(failure)),
        }
    }

    async fn request_discharge(
        &self,
        caveat: &CaveatId,
        email: &str,
        password: &str,
        otp: Option<&str>,
    ) -> Result<DischargeToken, HttpFailure> {
        let url = self.login_url(DISCHARGE_PATH);
        let body = DischargeRequest {
            email,
            password,
            caveat_id: caveat.as_str(),
            otp,
        };

        let response: DischargeResponse = self.http.post_json(&url, &body, None).await?;
        Ok(DischargeToken::new(response.discharge_macaroon))
    }
}

fn is_second_factor_required(failure: &HttpFailure) -> bool {
    failure.is_unauthorized()
        && failure
            .body()
            .and_then(|b| serde_json::from_str::<IdentityErrorBody>(b).ok())
            .and_then(|e| e.code)
            .as_deref()
            == Some(SECOND_FACTOR_CODE)
}

fn authentication_failed(failure: HttpFailure) -> PublishError {
    let message = failure
        .body()
        .and_then(|b| serde_json::from_str::<IdentityErrorBody>(b).ok())
        .and_then(|e| e.message)
        .unwrap_or_else(|| failure.to_string());
    PublishError::AuthenticationFailed { message }
}

use restify_core::UserIdentity;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Health response payload.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "restify/health-response.ts"
)]
pub struct HealthResponse {
    pub status: &'static str,
    pub store: &'static str,
}

/// API representation of the authenticated user.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "restify/user-identity-response.ts"
)]
pub struct UserIdentityResponse {
    pub subject: String,
    pub display_name: String,
    pub email: Option<String>,
    pub roles: Vec<String>,
}

impl From<UserIdentity> for UserIdentityResponse {
    fn from(identity: UserIdentity) -> Self {
        Self {
            subject: identity.subject().to_owned(),
            display_name: identity.display_name().to_owned(),
            email: identity.email().map(ToOwned::to_owned),
            roles: identity.roles().to_vec(),
        }
    }
}

/// Incoming payload for token-guarded session bootstrap.
#[derive(Debug, Deserialize, TS)]
#[ts(
    export,
    export_to = "restify/bootstrap-session-request.ts"
)]
pub struct BootstrapSessionRequest {
    pub subject: String,
    #[serde(default)]
    #[ts(optional)]
    pub display_name: Option<String>,
    #[serde(default)]
    #[ts(optional)]
    pub email: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
    pub token: String,
}

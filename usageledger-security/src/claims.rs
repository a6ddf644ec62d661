//! Bearer token decoding and claims shape.
//!
//! Token issuance and key distribution belong to the platform's identity
//! provider, not this service (§1): signature verification is intentionally
//! skipped and the claims are trusted as presented by the upstream gateway,
//! exactly as the payload is decoded on the other side of that boundary.

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;

use crate::error::{AuthzError, AuthzResult};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct RealmAccess {
    #[serde(default)]
    pub roles: Vec<String>,
}

/// The claims this service reads out of a bearer token. Any other claim in
/// the token is ignored.
#[derive(Debug, Deserialize, Clone)]
pub struct TokenClaims {
    #[serde(default)]
    pub workspaces: Vec<String>,

    #[serde(default)]
    pub workspaces_owned: Vec<String>,

    #[serde(rename = "billing-accounts", default)]
    pub billing_accounts: Vec<String>,

    #[serde(default)]
    pub realm_access: RealmAccess,
}

impl TokenClaims {
    pub fn is_hub_admin(&self) -> bool {
        self.realm_access.roles.iter().any(|r| r == "hub_admin")
    }
}

/// Extract the bearer token from an `Authorization` header value and decode
/// its claims without verifying the signature.
pub fn decode_bearer_token(authorization: Option<&str>) -> AuthzResult<TokenClaims> {
    let header = authorization.ok_or(AuthzError::MissingHeader)?;

    let token = header.strip_prefix("Bearer ").ok_or(AuthzError::MalformedHeader)?;

    let mut validation = Validation::new(Algorithm::RS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    let data = decode::<TokenClaims>(token, &DecodingKey::from_secret(&[]), &validation)
        .map_err(|_| AuthzError::MalformedHeader)?;

    Ok(data.claims)
}

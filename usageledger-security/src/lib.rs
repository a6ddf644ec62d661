//! Bearer token decoding and workspace/account authorization.

pub mod authz;
pub mod claims;
pub mod error;

pub use authz::{account_authz, workspace_authz};
pub use claims::{decode_bearer_token, RealmAccess, TokenClaims};
pub use error::{AuthzError, AuthzResult};

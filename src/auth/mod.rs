//! Bearer token authentication with role-based access control.
//!
//! Dual-token system: short-lived access tokens (5 min by default) and
//! long-lived refresh tokens (2 weeks). Both are recorded in the credential
//! store at issuance, and protected routes reject any token the store no
//! longer considers usable.

mod bearer;
mod claims;
mod errors;
mod extractors;
mod gate;
mod issuer;
mod revocation;
mod state;
mod types;

pub use bearer::bearer_token;
pub use claims::build_claims;
pub use errors::{ApiAuthError, AuthErrorKind};
pub use extractors::{AdminOnly, AnyRole, Auth, ManagerOrCustomer, RoleConstraint};
pub use gate::{ACCESS_GATES, Gate, authenticate, require_access_token};
pub use issuer::{IssuedPair, IssuedToken, TokenIssuer};
pub use revocation::RevocationManager;
pub use state::HasAuthBackend;
pub use types::AuthenticatedUser;

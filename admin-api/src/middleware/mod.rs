mod auth;
mod gate;

pub use auth::{identify, Audience, AuthError, Claims, CurrentPrincipal, TokenVerifier};
pub use gate::{guarded, Gate};

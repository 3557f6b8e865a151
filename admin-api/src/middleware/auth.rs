use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::authz::PrincipalId;
use crate::config::{AuthConfig, TokenAlgorithm};
use crate::error::AppError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,       // Identity provider subject, e.g. "auth0|64f1..."
    pub iss: String,
    pub exp: usize,        // Expiration time
    #[serde(default)]
    pub iat: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<Audience>,
}

/// `aud` may be a single string or a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    One(String),
    Many(Vec<String>),
}

impl Audience {
    pub fn contains(&self, audience: &str) -> bool {
        match self {
            Audience::One(aud) => aud == audience,
            Audience::Many(auds) => auds.iter().any(|aud| aud == audience),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("missing verification key: {0}")]
    MissingKey(&'static str),

    #[error("invalid verification key: {0}")]
    InvalidKey(#[source] jsonwebtoken::errors::Error),

    #[error("invalid token: {0}")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),
}

/// Verifies bearer tokens issued by the external identity provider.
#[derive(Clone)]
pub struct TokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    pub fn from_config(config: &AuthConfig) -> Result<Self, AuthError> {
        let (algorithm, key) = match config.algorithm {
            TokenAlgorithm::Hs256 => {
                let secret = config
                    .secret
                    .as_deref()
                    .ok_or(AuthError::MissingKey("auth.secret"))?;
                (Algorithm::HS256, DecodingKey::from_secret(secret.as_bytes()))
            }
            TokenAlgorithm::Rs256 => {
                let pem = config
                    .public_key_pem
                    .as_deref()
                    .ok_or(AuthError::MissingKey("auth.public_key_pem"))?;
                let key =
                    DecodingKey::from_rsa_pem(pem.as_bytes()).map_err(AuthError::InvalidKey)?;
                (Algorithm::RS256, key)
            }
        };

        let mut validation = Validation::new(algorithm);
        validation.leeway = config.leeway_secs;
        validation.set_issuer(&[&config.issuer]);
        validation.set_audience(&[&config.audience]);
        validation.set_required_spec_claims(&["exp", "sub", "iss", "aud"]);

        Ok(Self { key, validation })
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        Ok(decode::<Claims>(token, &self.key, &self.validation)?.claims)
    }
}

/// The verified caller, stored in request extensions by [`identify`].
///
/// As an extractor it rejects with 401 when no verified caller is present.
#[derive(Debug, Clone)]
pub struct CurrentPrincipal(pub PrincipalId);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentPrincipal
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentPrincipal>()
            .cloned()
            .ok_or(AppError::Unauthorized)
    }
}

/// Attach the caller's identity when the request carries a valid bearer token.
///
/// Never rejects: a missing or invalid token leaves the request anonymous and
/// the authorization gate decides what an anonymous caller may do.
pub async fn identify(
    State(verifier): State<TokenVerifier>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(TypedHeader(Authorization(bearer))) = bearer {
        match verifier.verify(bearer.token()) {
            Ok(claims) => {
                tracing::debug!(principal = %claims.sub, "bearer token verified");
                request
                    .extensions_mut()
                    .insert(CurrentPrincipal(PrincipalId::new(claims.sub)));
            }
            Err(e) => tracing::warn!(error = %e, "rejected bearer token"),
        }
    }

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;

    fn config() -> AuthConfig {
        AuthConfig {
            issuer: "https://issuer.test/".to_string(),
            audience: "calendar-admin-api".to_string(),
            algorithm: TokenAlgorithm::Hs256,
            secret: Some("test-secret".to_string()),
            public_key_pem: None,
            leeway_secs: 0,
        }
    }

    fn mint(claims: serde_json::Value, secret: &str) -> String {
        encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
    }

    fn exp() -> i64 {
        chrono::Utc::now().timestamp() + 600
    }

    #[test]
    fn accepts_valid_token() {
        let verifier = TokenVerifier::from_config(&config()).unwrap();
        let token = mint(
            json!({
                "sub": "auth0|alice",
                "iss": "https://issuer.test/",
                "aud": "calendar-admin-api",
                "exp": exp(),
            }),
            "test-secret",
        );
        let claims = verifier.verify(&token).unwrap();
        assert_eq!(claims.sub, "auth0|alice");
        assert_eq!(claims.aud, Some(Audience::One("calendar-admin-api".to_string())));
    }

    #[test]
    fn accepts_audience_list() {
        let verifier = TokenVerifier::from_config(&config()).unwrap();
        let token = mint(
            json!({
                "sub": "auth0|alice",
                "iss": "https://issuer.test/",
                "aud": ["https://calendar.us.auth0.com/userinfo", "calendar-admin-api"],
                "exp": exp(),
            }),
            "test-secret",
        );
        let claims = verifier.verify(&token).unwrap();
        let aud = claims.aud.expect("aud claim");
        assert!(aud.contains("calendar-admin-api"));
        assert!(!aud.contains("another-api"));
    }

    #[test]
    fn rejects_wrong_audience_issuer_or_signature() {
        let verifier = TokenVerifier::from_config(&config()).unwrap();
        let base = json!({
            "sub": "auth0|alice",
            "iss": "https://issuer.test/",
            "aud": "calendar-admin-api",
            "exp": exp(),
        });

        let mut wrong_aud = base.clone();
        wrong_aud["aud"] = json!("another-api");
        assert!(verifier.verify(&mint(wrong_aud, "test-secret")).is_err());

        let mut wrong_iss = base.clone();
        wrong_iss["iss"] = json!("https://evil.test/");
        assert!(verifier.verify(&mint(wrong_iss, "test-secret")).is_err());

        assert!(verifier.verify(&mint(base, "other-secret")).is_err());
    }

    #[test]
    fn rejects_expired_token() {
        let verifier = TokenVerifier::from_config(&config()).unwrap();
        let token = mint(
            json!({
                "sub": "auth0|alice",
                "iss": "https://issuer.test/",
                "aud": "calendar-admin-api",
                "exp": chrono::Utc::now().timestamp() - 600,
            }),
            "test-secret",
        );
        assert!(matches!(verifier.verify(&token), Err(AuthError::InvalidToken(_))));
    }

    #[test]
    fn rs256_without_key_fails() {
        let mut cfg = config();
        cfg.algorithm = TokenAlgorithm::Rs256;
        assert!(matches!(
            TokenVerifier::from_config(&cfg),
            Err(AuthError::MissingKey("auth.public_key_pem"))
        ));
    }

    #[test]
    fn malformed_rs256_key_is_a_key_error() {
        let mut cfg = config();
        cfg.algorithm = TokenAlgorithm::Rs256;
        cfg.public_key_pem =
            Some("-----BEGIN PUBLIC KEY-----\nnot a key\n-----END PUBLIC KEY-----".to_string());
        assert!(matches!(
            TokenVerifier::from_config(&cfg),
            Err(AuthError::InvalidKey(_))
        ));
    }
}

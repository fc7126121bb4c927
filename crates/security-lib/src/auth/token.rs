//! Session token issuance, verification and refresh.
//!
//! Tokens are HMAC-signed JWTs carrying [`Claims`] with a fixed audience and
//! issuer. Expiry is checked against the engine [`Clock`](crate::clock::Clock)
//! rather than the library's own wall-clock check, with no leeway.

use std::time::Duration;

use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};

use crate::clock::SharedClock;
use crate::config::{parse_ttl, Settings};
use crate::error::{SecurityError, SecurityResult};

/// Tokens closer than this to expiry are renewed by [`TokenIssuer::refresh`]
pub const REFRESH_THRESHOLD: Duration = Duration::from_secs(60 * 60);
/// Shortest lifetime a renewed token gets
pub const MIN_REFRESHED_SPAN: Duration = Duration::from_secs(60 * 60);

/// Identity fields the caller asks to embed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSubject {
    pub user_id: String,
    pub email: String,
    pub role: String,
    pub device_id: Option<String>,
}

/// JWT claims embedded in every session token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    /// User id in the directory
    pub id: String,
    pub email: String,
    /// Role name
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    /// Issued-at (unix seconds)
    pub iat: i64,
    /// Expiry (unix seconds)
    pub exp: i64,
    pub aud: String,
    pub iss: String,
}

impl Claims {
    /// Total lifetime the token was minted with
    pub fn span_secs(&self) -> i64 {
        self.exp - self.iat
    }

    pub fn subject(&self) -> TokenSubject {
        TokenSubject {
            user_id: self.id.clone(),
            email: self.email.clone(),
            role: self.role.clone(),
            device_id: self.device_id.clone(),
        }
    }
}

/// A freshly signed token
#[derive(Debug, Clone)]
pub struct MintedToken {
    pub token: String,
    pub claims: Claims,
}

/// Result of a refresh attempt
#[derive(Debug, Clone)]
pub enum Refresh {
    /// Enough validity left; the original token is kept
    Unchanged { token: String, claims: Claims },
    Renewed(MintedToken),
}

impl Refresh {
    pub fn renewed(&self) -> bool {
        matches!(self, Refresh::Renewed(_))
    }

    pub fn token(&self) -> &str {
        match self {
            Refresh::Unchanged { token, .. } => token,
            Refresh::Renewed(minted) => &minted.token,
        }
    }

    pub fn claims(&self) -> &Claims {
        match self {
            Refresh::Unchanged { claims, .. } => claims,
            Refresh::Renewed(minted) => &minted.claims,
        }
    }
}

/// Mints and checks session tokens; the secret is fixed for the process lifetime.
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    algorithm: Algorithm,
    issuer: String,
    audience: String,
    clock: SharedClock,
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("algorithm", &self.algorithm)
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .finish_non_exhaustive()
    }
}

impl TokenIssuer {
    /// Fails with a configuration error if the secret or algorithm is unusable
    pub fn from_settings(settings: &Settings, clock: SharedClock) -> SecurityResult<Self> {
        let secret = settings.signing_secret()?;
        let algorithm = settings.algorithm()?;
        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            algorithm,
            issuer: settings.token_issuer.clone(),
            audience: settings.token_audience.clone(),
            clock,
        })
    }

    /// Sign a token for `subject` valid for `ttl` (e.g. `"1h"`, `"30d"`)
    pub fn mint(&self, subject: &TokenSubject, ttl: &str) -> SecurityResult<MintedToken> {
        self.mint_for(subject, parse_ttl(ttl)?)
    }

    pub fn mint_for(&self, subject: &TokenSubject, ttl: Duration) -> SecurityResult<MintedToken> {
        let iat = self.clock.now().timestamp();
        // Whole seconds, and never less than one so exp > iat holds
        let exp = i64::try_from(ttl.as_secs().max(1))
            .ok()
            .and_then(|span| iat.checked_add(span))
            .ok_or_else(|| SecurityError::Internal(format!("token lifetime {ttl:?} out of range")))?;
        let claims = Claims {
            id: subject.user_id.clone(),
            email: subject.email.clone(),
            role: subject.role.clone(),
            device_id: subject.device_id.clone(),
            iat,
            exp,
            aud: self.audience.clone(),
            iss: self.issuer.clone(),
        };
        let token = encode(&Header::new(self.algorithm), &claims, &self.encoding_key)
            .map_err(|e| SecurityError::Internal(format!("token signing failed: {e}")))?;
        Ok(MintedToken { token, claims })
    }

    /// Full verification: signature, audience, issuer, then expiry
    pub fn verify(&self, token: &str) -> SecurityResult<Claims> {
        let claims = self.verify_signature(token)?;
        if self.clock.now().timestamp() > claims.exp {
            return Err(SecurityError::TokenExpired);
        }
        Ok(claims)
    }

    /// Signature, audience and issuer only; an expired token still passes.
    ///
    /// Used where a stale but authentic token must still be honoured, such as logout.
    pub fn verify_signature(&self, token: &str) -> SecurityResult<Claims> {
        let mut validation = Validation::new(self.algorithm);
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_audience(&[self.audience.as_str()]);
        validation.set_issuer(&[self.issuer.as_str()]);

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => SecurityError::TokenExpired,
                _ => SecurityError::TokenInvalid,
            })
    }

    /// Read the claims without checking the signature.
    ///
    /// Bookkeeping only (expiry display, diagnostics); never for authorization.
    pub fn decode_unsafe(token: &str) -> Option<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();
        validation.algorithms = vec![Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];

        decode::<Claims>(token, &DecodingKey::from_secret(&[]), &validation)
            .ok()
            .map(|data| data.claims)
    }

    /// Renew a token that is close to expiry.
    ///
    /// With less than [`REFRESH_THRESHOLD`] left, a replacement keeps the original
    /// total span (`exp - iat`), clamped to at least [`MIN_REFRESHED_SPAN`].
    /// Otherwise the original token comes back unchanged.
    pub fn refresh(&self, token: &str) -> SecurityResult<Refresh> {
        let claims = self.verify(token)?;
        let now = self.clock.now().timestamp();
        let remaining = claims.exp - now;

        if remaining >= REFRESH_THRESHOLD.as_secs() as i64 {
            return Ok(Refresh::Unchanged {
                token: token.to_string(),
                claims,
            });
        }

        let span = claims.span_secs().max(MIN_REFRESHED_SPAN.as_secs() as i64);
        let minted = self.mint_for(&claims.subject(), Duration::from_secs(span as u64))?;
        Ok(Refresh::Renewed(minted))
    }
}

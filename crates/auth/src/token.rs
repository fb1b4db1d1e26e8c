// Credential codec: issues and verifies stateless bearer tokens
// Decision: HS256 with a process-wide secret (symmetric key, single issuer)
// Decision: Verification order is signature, then expiry, then claim structure.
//           Claims are first decoded as untyped JSON so a forged or expired token
//           never reaches typed decoding.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::JwtConfig;
use crate::error::TokenError;
use crate::principal::{Principal, Role};

/// Generate a random token identifier (32 hex characters)
fn generate_token_id() -> String {
    let mut rng = rand::thread_rng();
    let bytes: [u8; 16] = rng.gen();
    hex::encode(bytes)
}

/// JWT claims carried by an access token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject (identity, usually an email)
    pub sub: String,
    /// Roles at issue time. Informational only: authentication re-resolves roles.
    pub roles: Vec<Role>,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Unique token ID
    pub jti: String,
}

impl TokenClaims {
    pub fn identity(&self) -> &str {
        &self.sub
    }

    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.iat, 0)
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }
}

/// Token handed to the caller after a successful login
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuedToken {
    pub access_token: String,
    pub token_type: String,
    /// Lifetime in seconds
    pub expires_in: u64,
}

/// Signs and verifies access tokens
#[derive(Clone)]
pub struct TokenCodec {
    config: JwtConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCodec")
            .field("token_ttl", &self.config.token_ttl)
            .finish_non_exhaustive()
    }
}

impl TokenCodec {
    pub fn new(config: JwtConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            config,
            encoding_key,
            decoding_key,
            validation,
        }
    }

    /// Token lifetime in seconds
    pub fn ttl_secs(&self) -> u64 {
        self.config.token_ttl.as_secs()
    }

    /// Issue a token for a principal, valid from now for the configured TTL
    pub fn issue(&self, principal: &Principal) -> Result<IssuedToken, TokenError> {
        self.issue_at(principal, Utc::now())
    }

    pub(crate) fn issue_at(
        &self,
        principal: &Principal,
        issued_at: DateTime<Utc>,
    ) -> Result<IssuedToken, TokenError> {
        let ttl = Duration::from_std(self.config.token_ttl)
            .map_err(|e| TokenError::Signing(e.to_string()))?;
        let exp = issued_at
            .checked_add_signed(ttl)
            .ok_or_else(|| TokenError::Signing("token expiry is out of range".to_string()))?;

        let claims = TokenClaims {
            sub: principal.identity().to_string(),
            roles: principal.roles().to_vec(),
            iat: issued_at.timestamp(),
            exp: exp.timestamp(),
            jti: generate_token_id(),
        };

        let access_token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Signing(e.to_string()))?;

        Ok(IssuedToken {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in: self.ttl_secs(),
        })
    }

    /// Verify a token and return its claims
    pub fn verify(&self, token: &str) -> Result<TokenClaims, TokenError> {
        // Signature and expiry are checked against untyped claims.
        let data = decode::<serde_json::Value>(token, &self.decoding_key, &self.validation)
            .map_err(|e| classify(e.kind()))?;

        let claims: TokenClaims =
            serde_json::from_value(data.claims).map_err(|_| TokenError::Malformed)?;

        if claims.sub.trim().is_empty() || claims.iat > claims.exp || claims.jti.is_empty() {
            return Err(TokenError::Malformed);
        }

        Ok(claims)
    }
}

/// Map a jsonwebtoken failure onto the codec taxonomy
fn classify(kind: &ErrorKind) -> TokenError {
    match kind {
        ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => TokenError::InvalidSignature,
        ErrorKind::ExpiredSignature => TokenError::Expired,
        _ => TokenError::Malformed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration as StdDuration;

    const SECRET: &str = "test-secret-key-for-testing-0123456789";

    fn test_config() -> JwtConfig {
        JwtConfig {
            secret: SECRET.to_string(),
            token_ttl: StdDuration::from_secs(900), // 15 minutes
        }
    }

    fn principal() -> Principal {
        Principal::new("investor@example.com", vec![Role::User, Role::Admin], true)
    }

    /// Sign arbitrary JSON claims with the test secret
    fn sign_raw(claims: serde_json::Value) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap()
    }

    /// Replace one character of the signature segment
    fn tamper_signature(token: &str) -> String {
        let (head, signature) = token.rsplit_once('.').unwrap();
        let mut sig: Vec<char> = signature.chars().collect();
        let mid = sig.len() / 2;
        sig[mid] = if sig[mid] == 'A' { 'B' } else { 'A' };
        format!("{}.{}", head, sig.into_iter().collect::<String>())
    }

    #[test]
    fn test_issue_and_verify_round_trip() {
        let codec = TokenCodec::new(test_config());
        let issued = codec.issue(&principal()).unwrap();

        assert_eq!(issued.token_type, "Bearer");
        assert_eq!(issued.expires_in, 900);

        let claims = codec.verify(&issued.access_token).unwrap();
        assert_eq!(claims.identity(), "investor@example.com");
        assert_eq!(claims.roles, vec![Role::User, Role::Admin]);
        assert_eq!(claims.exp - claims.iat, 900);
        assert_eq!(claims.jti.len(), 32);
    }

    #[test]
    fn test_verify_is_idempotent() {
        let codec = TokenCodec::new(test_config());
        let issued = codec.issue(&principal()).unwrap();

        let first = codec.verify(&issued.access_token).unwrap();
        let second = codec.verify(&issued.access_token).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_tampered_signature_is_invalid_signature() {
        let codec = TokenCodec::new(test_config());
        let issued = codec.issue(&principal()).unwrap();

        let tampered = tamper_signature(&issued.access_token);
        assert_eq!(codec.verify(&tampered), Err(TokenError::InvalidSignature));
    }

    #[test]
    fn test_tampered_expired_token_reports_signature_first() {
        let codec = TokenCodec::new(test_config());
        let issued = codec
            .issue_at(&principal(), Utc::now() - Duration::hours(2))
            .unwrap();

        assert_eq!(codec.verify(&issued.access_token), Err(TokenError::Expired));

        let tampered = tamper_signature(&issued.access_token);
        assert_eq!(codec.verify(&tampered), Err(TokenError::InvalidSignature));
    }

    #[test]
    fn test_forged_payload_is_invalid_signature() {
        let codec = TokenCodec::new(test_config());
        let user = Principal::new("user@example.com", vec![Role::User], true);
        let issued = codec.issue(&user).unwrap();

        let forged_claims = sign_raw(serde_json::json!({
            "sub": "user@example.com",
            "roles": ["ADMIN"],
            "iat": Utc::now().timestamp(),
            "exp": Utc::now().timestamp() + 600,
            "jti": "0123456789abcdef0123456789abcdef",
        }));
        let forged_payload = forged_claims.split('.').nth(1).unwrap();

        let mut parts: Vec<&str> = issued.access_token.split('.').collect();
        parts[1] = forged_payload;
        let forged = parts.join(".");

        assert_eq!(codec.verify(&forged), Err(TokenError::InvalidSignature));
    }

    #[test]
    fn test_token_signed_with_other_secret_is_rejected() {
        let codec = TokenCodec::new(test_config());
        let other = TokenCodec::new(JwtConfig {
            secret: "another-secret-key-that-is-long-enough".to_string(),
            ..test_config()
        });
        let issued = other.issue(&principal()).unwrap();

        assert_eq!(
            codec.verify(&issued.access_token),
            Err(TokenError::InvalidSignature)
        );
    }

    #[test]
    fn test_garbage_is_malformed() {
        let codec = TokenCodec::new(test_config());
        assert_eq!(codec.verify("invalid-token"), Err(TokenError::Malformed));
        assert_eq!(codec.verify(""), Err(TokenError::Malformed));
        assert_eq!(codec.verify("a.b.c"), Err(TokenError::Malformed));
    }

    #[test]
    fn test_signed_token_with_bad_claims_is_malformed() {
        let codec = TokenCodec::new(test_config());
        let now = Utc::now().timestamp();

        let missing_roles = sign_raw(serde_json::json!({
            "sub": "user@example.com",
            "iat": now,
            "exp": now + 600,
            "jti": "abc",
        }));
        assert_eq!(codec.verify(&missing_roles), Err(TokenError::Malformed));

        let missing_exp = sign_raw(serde_json::json!({
            "sub": "user@example.com",
            "roles": [],
            "iat": now,
            "jti": "abc",
        }));
        assert_eq!(codec.verify(&missing_exp), Err(TokenError::Malformed));

        let empty_subject = sign_raw(serde_json::json!({
            "sub": "",
            "roles": [],
            "iat": now,
            "exp": now + 600,
            "jti": "abc",
        }));
        assert_eq!(codec.verify(&empty_subject), Err(TokenError::Malformed));
    }

    #[test]
    fn test_expiry_is_checked_before_claim_structure() {
        let codec = TokenCodec::new(test_config());
        let past = Utc::now().timestamp() - 3600;

        let expired_and_broken = sign_raw(serde_json::json!({
            "sub": "user@example.com",
            "roles": "not-a-list",
            "iat": past - 60,
            "exp": past,
        }));
        assert_eq!(codec.verify(&expired_and_broken), Err(TokenError::Expired));
    }

    #[test]
    fn test_claim_timestamps() {
        let codec = TokenCodec::new(test_config());
        let issued_at = DateTime::from_timestamp(Utc::now().timestamp(), 0).unwrap();
        let issued = codec.issue_at(&principal(), issued_at).unwrap();
        let claims = codec.verify(&issued.access_token).unwrap();

        assert_eq!(claims.issued_at(), Some(issued_at));
        assert_eq!(
            claims.expires_at(),
            Some(issued_at + Duration::seconds(900))
        );
    }

    #[test]
    fn test_unrepresentable_expiry_is_signing_error() {
        let codec = TokenCodec::new(JwtConfig {
            secret: SECRET.to_string(),
            token_ttl: StdDuration::from_secs(10_000_000_000_000),
        });
        assert!(matches!(
            codec.issue(&principal()),
            Err(TokenError::Signing(_))
        ));
    }

    #[test]
    fn test_debug_does_not_print_secret() {
        let codec = TokenCodec::new(test_config());
        assert!(!format!("{:?}", codec).contains(SECRET));
    }
}

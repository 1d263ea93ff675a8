//! Principal derivation from access tokens and profile responses
//!
//! Tokens are decoded without signature verification. The client has no key to
//! verify with; it only reads what the backend put there.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use sourcing_core::{Principal, Role};

/// Identity fields found in JWT claims and in the who-am-I payload
#[derive(Debug, Default, Deserialize)]
struct IdentityFields {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    user_id: Option<Value>,
    #[serde(default)]
    sub: Option<Value>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    is_admin: Option<bool>,
    #[serde(default)]
    is_supplier: Option<bool>,
    /// Numeric date; some issuers emit floats or strings
    #[serde(default)]
    exp: Option<Value>,
}

impl IdentityFields {
    fn identifier(&self) -> Option<String> {
        [&self.user_id, &self.id, &self.sub]
            .into_iter()
            .flatten()
            .find_map(|value| match value {
                Value::String(s) if !s.is_empty() => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
    }

    fn role(&self) -> Role {
        if let Some(role) = self.role.as_deref().and_then(|r| r.parse().ok()) {
            return role;
        }
        if self.is_admin.unwrap_or(false) {
            Role::Admin
        } else if self.is_supplier.unwrap_or(false) {
            Role::Supplier
        } else {
            Role::Buyer
        }
    }

    fn expiry_seconds(&self) -> Option<i64> {
        let seconds = match self.exp.as_ref()? {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64))?,
            Value::String(s) => s.trim().parse::<f64>().ok()?.trunc() as i64,
            _ => return None,
        };
        Some(seconds)
    }

    fn into_principal(self) -> Option<Principal> {
        let id = self.identifier()?;
        let role = self.role();
        Some(Principal {
            id,
            email: self.email.filter(|e| !e.is_empty()),
            role,
        })
    }
}

fn decode_claims(token: &str) -> Option<IdentityFields> {
    let mut parts = token.split('.');
    let (_header, payload) = (parts.next()?, parts.next()?);
    parts.next()?;

    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    identity_fields(&serde_json::from_slice(&bytes).ok()?)
}

fn identity_fields(value: &Value) -> Option<IdentityFields> {
    // serde would happily read a struct out of a JSON array
    if !value.is_object() {
        return None;
    }
    serde_json::from_value(value.clone()).ok()
}

/// Principal encoded in an access token's claims, if it carries one
pub fn principal_from_token(access_token: &str) -> Option<Principal> {
    decode_claims(access_token)?.into_principal()
}

/// Expiry encoded in an access token's `exp` claim
pub fn expiry_from_token(access_token: &str) -> Option<DateTime<Utc>> {
    let exp = decode_claims(access_token)?.expiry_seconds()?;
    DateTime::from_timestamp(exp, 0)
}

/// Principal described by a who-am-I response body
pub fn principal_from_profile(body: &Value) -> Option<Principal> {
    identity_fields(body)?.into_principal()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fake_jwt(claims: Value) -> String {
        let encode = |v: &Value| URL_SAFE_NO_PAD.encode(serde_json::to_vec(v).unwrap());
        format!(
            "{}.{}.{}",
            encode(&json!({"alg": "HS256", "typ": "JWT"})),
            encode(&claims),
            URL_SAFE_NO_PAD.encode(b"sig")
        )
    }

    #[test]
    fn test_principal_from_simplejwt_claims() {
        let token = fake_jwt(json!({
            "token_type": "access",
            "exp": 1_900_000_000,
            "user_id": 42,
            "email": "buyer@example.com"
        }));

        let principal = principal_from_token(&token).unwrap();
        assert_eq!(principal.id, "42");
        assert_eq!(principal.email.as_deref(), Some("buyer@example.com"));
        assert_eq!(principal.role, Role::Buyer);

        let expiry = expiry_from_token(&token).unwrap();
        assert_eq!(expiry.timestamp(), 1_900_000_000);
    }

    #[test]
    fn test_odd_exp_claim_keeps_identity() {
        let token = fake_jwt(json!({"user_id": 9, "exp": 1_900_000_000.75}));
        assert_eq!(principal_from_token(&token).unwrap().id, "9");
        assert_eq!(expiry_from_token(&token).unwrap().timestamp(), 1_900_000_000);

        let token = fake_jwt(json!({"user_id": 9, "exp": "1900000000"}));
        assert_eq!(expiry_from_token(&token).unwrap().timestamp(), 1_900_000_000);

        let token = fake_jwt(json!({"user_id": 9, "exp": {"nested": true}}));
        assert_eq!(principal_from_token(&token).unwrap().id, "9");
        assert!(expiry_from_token(&token).is_none());
    }

    #[test]
    fn test_role_resolution_order() {
        let explicit = fake_jwt(json!({"sub": "u-1", "role": "supplier", "is_admin": true}));
        assert_eq!(principal_from_token(&explicit).unwrap().role, Role::Supplier);

        let admin = fake_jwt(json!({"sub": "u-2", "is_admin": true}));
        assert_eq!(principal_from_token(&admin).unwrap().role, Role::Admin);

        let supplier = fake_jwt(json!({"sub": "u-3", "is_supplier": true}));
        assert_eq!(principal_from_token(&supplier).unwrap().role, Role::Supplier);
    }

    #[test]
    fn test_opaque_tokens_have_no_principal() {
        assert!(principal_from_token("A1").is_none());
        assert!(principal_from_token("a.b").is_none());
        assert!(principal_from_token("a.!!!.c").is_none());
        assert!(expiry_from_token("EXPIRED").is_none());

        let anonymous = fake_jwt(json!({"exp": 1}));
        assert!(principal_from_token(&anonymous).is_none());
    }

    #[test]
    fn test_principal_from_profile() {
        let body = json!({
            "id": 7,
            "email": "ops@example.com",
            "first_name": "Ops",
            "is_admin": true
        });
        let principal = principal_from_profile(&body).unwrap();
        assert_eq!(principal.id, "7");
        assert_eq!(principal.role, Role::Admin);

        assert!(principal_from_profile(&json!({"email": "x@y.z"})).is_none());
        assert!(principal_from_profile(&json!(["not", "an", "object"])).is_none());
    }
}

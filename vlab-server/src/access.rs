//! Caller identity and session access predicates
//!
//! Identity is terminated upstream: the auth provider validates the user's
//! token and forwards the verified id in the `X-User-Id` header. A missing
//! header means an anonymous caller, who is denied everything except public
//! reads. Bot integrations on allow-listed routes supply a `userId` field
//! in the body/query instead, trusted as the integration identity.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use std::convert::Infallible;
use vlab_common::db::models::Session;

/// Header carrying the verified caller id
pub const USER_ID_HEADER: &str = "x-user-id";

/// Resolved caller identity; `None` is anonymous
#[derive(Debug, Clone)]
pub struct Identity(pub Option<String>);

impl Identity {
    /// Effective user id: the verified header identity when present,
    /// otherwise the caller-supplied claim (bot integration carve-out).
    pub fn or_claim(&self, claimed: Option<&str>) -> Option<String> {
        self.0
            .clone()
            .or_else(|| claimed.filter(|s| !s.is_empty()).map(str::to_string))
    }

    pub fn as_deref(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

#[axum::async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Identity {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        Ok(Identity(user_id))
    }
}

/// True iff the session is public or the caller owns it
pub fn can_read(session: &Session, caller: Option<&str>) -> bool {
    session.is_public || caller == Some(session.user_id.as_str())
}

/// True iff the caller owns the session; there is no collaborative write
pub fn can_write(session: &Session, caller: Option<&str>) -> bool {
    caller == Some(session.user_id.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn session(owner: &str, public: bool) -> Session {
        Session {
            id: "s1".into(),
            user_id: owner.into(),
            title: "t".into(),
            description: None,
            is_public: public,
            is_active: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_anonymous_reads_public_only() {
        assert!(can_read(&session("alice", true), None));
        assert!(!can_read(&session("alice", false), None));
    }

    #[test]
    fn test_owner_reads_and_writes() {
        let s = session("alice", false);
        assert!(can_read(&s, Some("alice")));
        assert!(can_write(&s, Some("alice")));
    }

    #[test]
    fn test_non_owner_never_writes() {
        let s = session("alice", true);
        assert!(can_read(&s, Some("bob")));
        assert!(!can_write(&s, Some("bob")));
        assert!(!can_write(&s, None));
    }

    #[test]
    fn test_or_claim_prefers_verified_identity() {
        let ident = Identity(Some("alice".into()));
        assert_eq!(ident.or_claim(Some("bob")), Some("alice".to_string()));

        let anon = Identity(None);
        assert_eq!(anon.or_claim(Some("bot-7")), Some("bot-7".to_string()));
        assert_eq!(anon.or_claim(Some("")), None);
        assert_eq!(anon.or_claim(None), None);
    }
}

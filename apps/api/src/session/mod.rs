//! Session identity and the in-memory session registry.

pub mod store;

pub use store::SessionStore;

/// Sentinel sent as `userId` when a session carries no identity.
pub const ANONYMOUS_USER: &str = "anonymous";

/// Opaque user identifier supplied by whatever sits in front of the API.
///
/// Never interpreted locally; only forwarded on outbound requests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionIdentity(Option<String>);

impl SessionIdentity {
    /// Blank identifiers count as absent.
    pub fn new(user_id: Option<String>) -> Self {
        Self(user_id.filter(|id| !id.trim().is_empty()))
    }

    pub fn user_id(&self) -> &str {
        self.0.as_deref().unwrap_or(ANONYMOUS_USER)
    }

    pub fn is_anonymous(&self) -> bool {
        self.0.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_identity_is_anonymous() {
        let identity = SessionIdentity::new(None);
        assert!(identity.is_anonymous());
        assert_eq!(identity.user_id(), "anonymous");
        assert_eq!(identity, SessionIdentity::default());
    }

    #[test]
    fn test_blank_identity_is_anonymous() {
        assert_eq!(SessionIdentity::new(Some("   ".into())).user_id(), ANONYMOUS_USER);
    }

    #[test]
    fn test_identity_is_passed_through_verbatim() {
        let identity = SessionIdentity::new(Some("1718000000000".into()));
        assert!(!identity.is_anonymous());
        assert_eq!(identity.user_id(), "1718000000000");
    }
}

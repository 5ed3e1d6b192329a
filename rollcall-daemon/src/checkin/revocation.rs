//! Revocation hook for certificate resolution.
//!
//! Nothing in the daemon revokes certificates yet; the hook lets a
//! deployment plug in a denylist without touching the resolver.

/// Answers whether a certificate (by enrollment record id) is revoked.
pub trait RevocationList: Send + Sync {
    fn is_revoked(&self, record_id: &str) -> bool;
}

/// No certificate is ever revoked.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverRevoked;

impl RevocationList for NeverRevoked {
    fn is_revoked(&self, _record_id: &str) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_never_revoked() {
        assert!(!NeverRevoked.is_revoked("E1"));
    }

    #[test]
    fn test_trait_object_dispatch() {
        struct Denylist(&'static str);
        impl RevocationList for Denylist {
            fn is_revoked(&self, record_id: &str) -> bool {
                record_id == self.0
            }
        }

        let lists: Vec<Box<dyn RevocationList>> = vec![Box::new(NeverRevoked), Box::new(Denylist("E1"))];
        assert!(!lists[0].is_revoked("E1"));
        assert!(lists[1].is_revoked("E1"));
        assert!(!lists[1].is_revoked("E2"));
    }
}

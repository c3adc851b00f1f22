//! Participant identity registry for Atria.
//!
//! The registry is the coordinator-wide map of currently-claimed
//! participant identities. Its single job is uniqueness: two processes
//! must never both act under the same (role, id) at the same time.
//!
//! # Concurrency note
//!
//! `Registry` is NOT thread-safe by itself — it uses a plain `HashSet`
//! and takes `&mut self`. This is intentional: the coordinator owns one
//! registry behind a single mutex, so a `claim` call is one critical
//! section and check-and-claim cannot interleave. Keeping the locking at
//! the owner avoids hidden double-locking here.

mod error;

pub use error::RegistryError;

use std::collections::HashSet;

use atria_protocol::{ParticipantId, Role};

/// The coordinator-wide identity-uniqueness map.
///
/// Entries are created by [`claim`](Registry::claim) (or
/// [`reclaim`](Registry::reclaim)) and removed only by an explicit
/// [`release`](Registry::release). There is no expiry: a client that
/// crashes without releasing leaves its claim stranded until the same
/// participant reconnects and reclaims it.
#[derive(Debug, Default)]
pub struct Registry {
    claims: HashSet<(Role, ParticipantId)>,
}

impl Registry {
    /// Creates a new, empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if (role, id) is currently claimed.
    pub fn check(&self, role: Role, id: ParticipantId) -> bool {
        self.claims.contains(&(role, id))
    }

    /// Atomically checks and claims (role, id).
    ///
    /// Callers hold the registry lock for the duration of this call, so
    /// of two concurrent claims for the same identity exactly one
    /// succeeds and the other observes `DuplicateIdentity`.
    ///
    /// # Errors
    /// Returns [`RegistryError::DuplicateIdentity`] if the identity is
    /// already claimed.
    pub fn claim(
        &mut self,
        role: Role,
        id: ParticipantId,
    ) -> Result<(), RegistryError> {
        if !self.claims.insert((role, id)) {
            return Err(RegistryError::DuplicateIdentity(role, id));
        }
        tracing::info!(%role, %id, "identity claimed");
        Ok(())
    }

    /// Claims (role, id) unconditionally, replacing any stranded claim.
    ///
    /// This is the reconnect path: reconnection is re-registration, so a
    /// predecessor that crashed without releasing must not brick the
    /// identity forever. Returns `true` if an existing claim was
    /// replaced.
    pub fn reclaim(&mut self, role: Role, id: ParticipantId) -> bool {
        let replaced = !self.claims.insert((role, id));
        if replaced {
            tracing::info!(%role, %id, "stranded claim replaced on reconnect");
        } else {
            tracing::info!(%role, %id, "identity claimed");
        }
        replaced
    }

    /// Releases a claim. Returns `true` if the claim existed.
    ///
    /// Releasing an absent claim is a no-op: disconnect paths run through
    /// here during cleanup and must be idempotent.
    pub fn release(&mut self, role: Role, id: ParticipantId) -> bool {
        let removed = self.claims.remove(&(role, id));
        if removed {
            tracing::info!(%role, %id, "identity released");
        }
        removed
    }

    /// Returns the number of live claims.
    pub fn len(&self) -> usize {
        self.claims.len()
    }

    /// Returns `true` if there are no live claims.
    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! Unit tests for `Registry`.
    //!
    //! Naming convention: `test_{function}_{scenario}_{expected}`.

    use super::*;

    fn pid(id: u64) -> ParticipantId {
        ParticipantId(id)
    }

    // =====================================================================
    // claim()
    // =====================================================================

    #[test]
    fn test_claim_fresh_identity_succeeds() {
        let mut registry = Registry::new();

        registry
            .claim(Role::Applier, pid(1))
            .expect("fresh claim should succeed");

        assert!(registry.check(Role::Applier, pid(1)));
    }

    #[test]
    fn test_claim_duplicate_identity_returns_error() {
        let mut registry = Registry::new();
        registry.claim(Role::Applier, pid(1)).unwrap();

        let result = registry.claim(Role::Applier, pid(1));

        assert!(
            matches!(
                result,
                Err(RegistryError::DuplicateIdentity(Role::Applier, p)) if p == pid(1)
            ),
            "second claim must observe DuplicateIdentity"
        );
    }

    #[test]
    fn test_claim_same_id_different_role_succeeds() {
        // Claims are keyed on (role, id), so the same numeric id may be
        // claimed once per role.
        let mut registry = Registry::new();
        registry.claim(Role::Applier, pid(1)).unwrap();

        registry
            .claim(Role::Approver, pid(1))
            .expect("different role should be an independent claim");

        assert!(registry.check(Role::Applier, pid(1)));
        assert!(registry.check(Role::Approver, pid(1)));
    }

    // =====================================================================
    // reclaim()
    // =====================================================================

    #[test]
    fn test_reclaim_fresh_identity_reports_no_replacement() {
        let mut registry = Registry::new();

        let replaced = registry.reclaim(Role::Applier, pid(1));

        assert!(!replaced);
        assert!(registry.check(Role::Applier, pid(1)));
    }

    #[test]
    fn test_reclaim_stranded_identity_replaces_claim() {
        // A crash that skipped release leaves the claim in place; the
        // reconnecting incarnation must be able to take it over.
        let mut registry = Registry::new();
        registry.claim(Role::Applier, pid(1)).unwrap();

        let replaced = registry.reclaim(Role::Applier, pid(1));

        assert!(replaced, "reclaim should report the stranded claim");
        assert!(registry.check(Role::Applier, pid(1)));
        assert_eq!(registry.len(), 1, "still exactly one claim");
    }

    // =====================================================================
    // release()
    // =====================================================================

    #[test]
    fn test_release_live_claim_removes_it() {
        let mut registry = Registry::new();
        registry.claim(Role::Applier, pid(1)).unwrap();

        assert!(registry.release(Role::Applier, pid(1)));

        assert!(!registry.check(Role::Applier, pid(1)));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_release_absent_claim_is_noop() {
        let mut registry = Registry::new();

        assert!(!registry.release(Role::Applier, pid(99)));
    }

    #[test]
    fn test_release_then_claim_again_succeeds() {
        // Release → re-claim is the clean disconnect/reconnect cycle.
        let mut registry = Registry::new();
        registry.claim(Role::Applier, pid(1)).unwrap();
        registry.release(Role::Applier, pid(1));

        registry
            .claim(Role::Applier, pid(1))
            .expect("released identity should be claimable again");
    }

    // =====================================================================
    // check() / len()
    // =====================================================================

    #[test]
    fn test_check_unclaimed_identity_returns_false() {
        let registry = Registry::new();
        assert!(!registry.check(Role::Approver, pid(42)));
    }

    #[test]
    fn test_len_tracks_claim_count() {
        let mut registry = Registry::new();
        assert_eq!(registry.len(), 0);

        registry.claim(Role::Applier, pid(1)).unwrap();
        registry.claim(Role::Applier, pid(2)).unwrap();
        assert_eq!(registry.len(), 2);

        registry.release(Role::Applier, pid(1));
        assert_eq!(registry.len(), 1);
    }
}

//! Obligation lifecycle (C6): linearity-tracked promises.
//!
//! Exactly one transition leaves `Reserved`; every arrival state is
//! terminal. A region finalizing with obligations still `Reserved`
//! force-resolves them to `Leaked` via [`Obligation::leak`] so the no-leak
//! invariant (every obligation eventually resolved) holds even when
//! callers forget to commit or abort.

use crate::error::{KernelError, Result};
use crate::transition::{self, ObligationState};
use crate::types::RegionId;

/// An obligation record.
pub struct Obligation {
    state: ObligationState,
    region: RegionId,
}

impl Obligation {
    /// Reserves a new obligation, owned by `region`.
    #[must_use]
    pub fn reserve(region: RegionId) -> Self {
        Self { state: ObligationState::Reserved, region }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> ObligationState {
        self.state
    }

    /// The owning region.
    #[must_use]
    pub fn region(&self) -> RegionId {
        self.region
    }

    /// True once the obligation has left `Reserved`.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.state != ObligationState::Reserved
    }

    fn resolve(&mut self, to: ObligationState) -> Result<()> {
        if self.is_resolved() {
            return Err(KernelError::ObligationAlreadyResolved);
        }
        transition::obligation_transition_check(self.state, to)?;
        self.state = to;
        Ok(())
    }

    /// Resolves successfully: `Reserved -> Committed`.
    pub fn commit(&mut self) -> Result<()> {
        self.resolve(ObligationState::Committed)
    }

    /// Resolves by explicit abort: `Reserved -> Aborted`.
    pub fn abort(&mut self) -> Result<()> {
        self.resolve(ObligationState::Aborted)
    }

    /// Force-resolves an obligation still `Reserved` when its region
    /// finalizes: `Reserved -> Leaked`. A no-op (returns `Ok`) if already
    /// resolved, since leak-sweeping runs over every obligation in a
    /// region regardless of whether it still needs resolving.
    pub fn leak_if_unresolved(&mut self) -> Result<bool> {
        if self.is_resolved() {
            return Ok(false);
        }
        self.resolve(ObligationState::Leaked)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region() -> RegionId {
        RegionId::new_for_test(0, 0)
    }

    #[test]
    fn commit_resolves_reserved() {
        let mut o = Obligation::reserve(region());
        assert!(o.commit().is_ok());
        assert_eq!(o.state(), ObligationState::Committed);
    }

    #[test]
    fn double_resolution_is_rejected() {
        let mut o = Obligation::reserve(region());
        o.commit().unwrap();
        assert_eq!(o.abort(), Err(KernelError::ObligationAlreadyResolved));
    }

    #[test]
    fn leak_sweep_only_touches_unresolved() {
        let mut committed = Obligation::reserve(region());
        committed.commit().unwrap();
        assert_eq!(committed.leak_if_unresolved(), Ok(false));
        assert_eq!(committed.state(), ObligationState::Committed);

        let mut pending = Obligation::reserve(region());
        assert_eq!(pending.leak_if_unresolved(), Ok(true));
        assert_eq!(pending.state(), ObligationState::Leaked);
    }
}

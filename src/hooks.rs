//! Host hooks consumed by the deterministic core (§6): wall clock, logical
//! clock, entropy, and allocator.
//!
//! The wall/logical clock split mirrors the teacher's `time::TimeSource`
//! trait, which already separates a production wall clock from a virtual
//! one so the same driver code runs against either; here the two roles
//! become two distinct traits since deterministic mode requires the
//! logical clock and forbids relying on the wall clock at all.

use crate::error::{KernelError, Result};

/// Wall-clock time source. Used only outside deterministic mode.
pub trait WallClock {
    /// Nanoseconds since an implementation-defined epoch.
    fn now_ns(&self) -> u64;
}

/// Logical (virtual) time source. Required in deterministic mode, where it
/// is the sole source of `now` the kernel consults.
pub trait LogicalClock {
    /// Nanoseconds on the logical clock. Must be monotone non-decreasing
    /// across calls.
    fn logical_now_ns(&self) -> u64;
}

/// Entropy source for tie-break RNG hints. Must be seeded (not relying on
/// OS randomness) in deterministic mode.
pub trait Entropy {
    /// Returns the next pseudo-random value and advances internal state.
    fn random_u64(&mut self) -> u64;
}

/// A [`LogicalClock`] backed by a plain counter, for hosts that drive time
/// explicitly (e.g. scenario replay's `AdvanceTime` op).
#[derive(Debug, Default, Clone, Copy)]
pub struct ManualClock {
    now_ns: u64,
}

impl ManualClock {
    /// Starts the clock at zero.
    #[must_use]
    pub fn new() -> Self {
        Self { now_ns: 0 }
    }

    /// Advances the clock by `delta_ns` and returns the new reading.
    pub fn advance(&mut self, delta_ns: u64) -> u64 {
        self.now_ns = self.now_ns.saturating_add(delta_ns);
        self.now_ns
    }
}

impl LogicalClock for ManualClock {
    fn logical_now_ns(&self) -> u64 {
        self.now_ns
    }
}

/// An [`Entropy`] source backed by [`crate::util::DetRng`].
#[derive(Debug, Clone)]
pub struct DetRngEntropy(crate::util::DetRng);

impl DetRngEntropy {
    /// Seeds entropy deterministically.
    #[must_use]
    pub fn seeded(seed: u64) -> Self {
        Self(crate::util::DetRng::new(seed))
    }
}

impl Entropy for DetRngEntropy {
    fn random_u64(&mut self) -> u64 {
        self.0.next_u64()
    }
}

/// Allocator hook. `alloc`/`realloc` are permission checks, not the actual
/// allocation (the kernel only ever uses arena storage allocated up
/// front); the hook's purpose is to let a host enforce and observe the
/// post-seal allocation-free invariant (§5).
pub trait AllocatorHook {
    /// Requests permission for an allocation of `size` bytes. Returns
    /// [`KernelError::AllocatorSealed`] once sealed.
    fn alloc(&mut self, size: usize) -> Result<()>;

    /// Seals the allocator: every subsequent `alloc` call fails.
    fn seal(&mut self);

    /// True once sealed.
    fn is_sealed(&self) -> bool;
}

/// A counting [`AllocatorHook`] that tracks total bytes requested and
/// enforces the seal.
#[derive(Debug, Default, Clone, Copy)]
pub struct CountingAllocator {
    bytes_requested: u64,
    sealed: bool,
}

impl CountingAllocator {
    /// Creates an unsealed allocator with no requests recorded.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total bytes requested across every successful `alloc` call.
    #[must_use]
    pub fn bytes_requested(&self) -> u64 {
        self.bytes_requested
    }
}

impl AllocatorHook for CountingAllocator {
    fn alloc(&mut self, size: usize) -> Result<()> {
        if self.sealed {
            return Err(KernelError::AllocatorSealed);
        }
        self.bytes_requested = self.bytes_requested.saturating_add(size as u64);
        Ok(())
    }

    fn seal(&mut self) {
        self.sealed = true;
    }

    fn is_sealed(&self) -> bool {
        self.sealed
    }
}

/// The four host hooks, bundled for validation and for the runtime's use.
///
/// `wall_clock` is optional (only consulted outside deterministic mode).
/// `logical_clock` and a seeded `entropy` are mandatory in deterministic
/// mode; [`HostHooks::validate`] is the sole gate for that rule, called
/// once by `RuntimeBuilder::build` before any region is opened.
pub struct HostHooks {
    wall_clock: Option<Box<dyn WallClock>>,
    logical_clock: Option<Box<dyn LogicalClock>>,
    entropy: Option<Box<dyn Entropy>>,
    entropy_seeded: bool,
    allocator: Box<dyn AllocatorHook>,
}

impl HostHooks {
    /// Hooks with no clocks installed, unseeded entropy, and a fresh
    /// [`CountingAllocator`]. Not valid for deterministic mode until a
    /// logical clock and seeded entropy are supplied.
    #[must_use]
    pub fn new() -> Self {
        Self {
            wall_clock: None,
            logical_clock: None,
            entropy: None,
            entropy_seeded: false,
            allocator: Box::new(CountingAllocator::new()),
        }
    }

    /// Installs a wall clock.
    #[must_use]
    pub fn with_wall_clock(mut self, clock: Box<dyn WallClock>) -> Self {
        self.wall_clock = Some(clock);
        self
    }

    /// Installs a logical clock.
    #[must_use]
    pub fn with_logical_clock(mut self, clock: Box<dyn LogicalClock>) -> Self {
        self.logical_clock = Some(clock);
        self
    }

    /// Installs an entropy source. `seeded` must be true for deterministic
    /// mode to validate.
    #[must_use]
    pub fn with_entropy(mut self, entropy: Box<dyn Entropy>, seeded: bool) -> Self {
        self.entropy = Some(entropy);
        self.entropy_seeded = seeded;
        self
    }

    /// Installs an allocator hook, replacing the default counting one.
    #[must_use]
    pub fn with_allocator(mut self, allocator: Box<dyn AllocatorHook>) -> Self {
        self.allocator = allocator;
        self
    }

    /// Validates the hook configuration against `deterministic` mode,
    /// per §6: a missing logical clock or unseeded entropy in
    /// deterministic mode is a [`KernelError::DeterminismViolation`].
    pub fn validate(&self, deterministic: bool) -> Result<()> {
        if deterministic && self.logical_clock.is_none() {
            return Err(KernelError::DeterminismViolation);
        }
        if deterministic && (self.entropy.is_none() || !self.entropy_seeded) {
            return Err(KernelError::DeterminismViolation);
        }
        Ok(())
    }

    /// Wall-clock reading. Only meaningful outside deterministic mode.
    #[must_use]
    pub fn now_ns(&self) -> Option<u64> {
        self.wall_clock.as_ref().map(|c| c.now_ns())
    }

    /// Logical-clock reading.
    #[must_use]
    pub fn logical_now_ns(&self) -> Option<u64> {
        self.logical_clock.as_ref().map(|c| c.logical_now_ns())
    }

    /// Draws the next entropy value, if a source is installed.
    pub fn random_u64(&mut self) -> Option<u64> {
        self.entropy.as_mut().map(|e| e.random_u64())
    }

    /// Requests allocator permission for `size` bytes.
    pub fn alloc(&mut self, size: usize) -> Result<()> {
        self.allocator.alloc(size)
    }

    /// Seals the allocator hook.
    pub fn seal_allocator(&mut self) {
        self.allocator.seal();
    }

    /// True once the allocator hook is sealed.
    #[must_use]
    pub fn is_allocator_sealed(&self) -> bool {
        self.allocator.is_sealed()
    }
}

impl Default for HostHooks {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_mode_requires_logical_clock_and_seeded_entropy() {
        let hooks = HostHooks::new();
        assert_eq!(hooks.validate(true), Err(KernelError::DeterminismViolation));
        assert!(hooks.validate(false).is_ok());
    }

    #[test]
    fn deterministic_mode_rejects_unseeded_entropy() {
        let hooks = HostHooks::new()
            .with_logical_clock(Box::new(ManualClock::new()))
            .with_entropy(Box::new(DetRngEntropy::seeded(1)), false);
        assert_eq!(hooks.validate(true), Err(KernelError::DeterminismViolation));
    }

    #[test]
    fn fully_configured_hooks_validate_in_deterministic_mode() {
        let hooks = HostHooks::new()
            .with_logical_clock(Box::new(ManualClock::new()))
            .with_entropy(Box::new(DetRngEntropy::seeded(7)), true);
        assert!(hooks.validate(true).is_ok());
    }

    #[test]
    fn allocator_rejects_requests_once_sealed() {
        let mut hooks = HostHooks::new();
        assert!(hooks.alloc(64).is_ok());
        hooks.seal_allocator();
        assert_eq!(hooks.alloc(1), Err(KernelError::AllocatorSealed));
    }

    #[test]
    fn manual_clock_advances_monotonically() {
        let mut clock = ManualClock::new();
        assert_eq!(clock.advance(10), 10);
        assert_eq!(clock.advance(5), 15);
        assert_eq!(clock.logical_now_ns(), 15);
    }
}

//! Runtime configuration (§4.11, §6): safety profile, platform profile,
//! resource ceilings, and the `RuntimeBuilder` that assembles a
//! [`Runtime`](crate::runtime::Runtime) from a [`Config`] plus
//! [`HostHooks`](crate::hooks::HostHooks).

use serde::{Deserialize, Serialize};

use crate::error::{KernelError, Result};
use crate::hooks::HostHooks;
use crate::runtime::Runtime;

/// Compile/runtime selection among profiles enforcing the same observable
/// semantics at different diagnostic cost (§6). No profile changes
/// observable behavior; `Debug` adds ghost-protocol/linearity monitoring
/// and a bounded violation ring buffer on top.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SafetyProfile {
    /// Every check from `Hardened`, plus ghost protocol/linearity
    /// monitors and a bounded violation ring buffer.
    Debug,
    /// Transition legality, handle generation validation, resource
    /// exhaustion checks, null-argument validation, allocator seal, and
    /// deterministic-mode policy, all enforced.
    Hardened,
    /// Same enforcement as `Hardened`; the name exists so a deployment
    /// can opt into the minimal diagnostic surface without the crate
    /// special-casing anything semantically.
    Release,
}

/// Wait policy for an idle scheduler worker's backoff tail (§5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WaitPolicy {
    /// Never park; keep spinning/yielding.
    Spin,
    /// Yield to the host scheduler but never block.
    Yield,
    /// Park with a timeout derived from the next timed-lane deadline.
    Park,
}

/// Fixed ceilings per resource kind (§5). Exceeding any yields
/// [`KernelError::ResourceExhausted`] without partial state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceCeilings {
    /// Maximum live regions.
    pub max_regions: u16,
    /// Maximum live tasks.
    pub max_tasks: u16,
    /// Maximum live obligations.
    pub max_obligations: u16,
    /// Maximum live timers.
    pub max_timers: u16,
    /// Per-region cleanup stack capacity.
    pub cleanup_capacity: usize,
    /// Per-region capture arena byte capacity.
    pub capture_capacity: usize,
}

impl Default for ResourceCeilings {
    fn default() -> Self {
        Self {
            max_regions: 1024,
            max_tasks: 4096,
            max_obligations: 4096,
            max_timers: 1024,
            cleanup_capacity: 16,
            capture_capacity: 4096,
        }
    }
}

/// Top-level runtime configuration, assembled by [`RuntimeBuilder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Safety profile.
    pub safety_profile: SafetyProfile,
    /// Platform wait policy.
    pub wait_policy: WaitPolicy,
    /// Deterministic mode: requires a logical clock and seeded entropy
    /// (enforced by [`HostHooks::validate`]).
    pub deterministic: bool,
    /// Resource ceilings.
    pub resource_ceilings: ResourceCeilings,
    /// Telemetry depth: 0 disables per-event tracing call sites even when
    /// the `tracing-integration` feature is enabled; higher values emit
    /// progressively more detail.
    pub telemetry_depth: u8,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            safety_profile: SafetyProfile::Hardened,
            wait_policy: WaitPolicy::Park,
            deterministic: true,
            resource_ceilings: ResourceCeilings::default(),
            telemetry_depth: 1,
        }
    }
}

/// Assembles a [`Config`] and [`HostHooks`] into a validated [`Runtime`].
///
/// `build()` calls [`HostHooks::validate`] and returns
/// [`KernelError::DeterminismViolation`] for invalid combinations before
/// any region is opened, matching the teacher's builder convention of
/// validating eagerly rather than deferring to first use.
pub struct RuntimeBuilder {
    config: Config,
    hooks: HostHooks,
}

impl RuntimeBuilder {
    /// Starts from default configuration and empty hooks.
    #[must_use]
    pub fn new() -> Self {
        Self { config: Config::default(), hooks: HostHooks::new() }
    }

    /// Overrides the safety profile.
    #[must_use]
    pub fn safety_profile(mut self, profile: SafetyProfile) -> Self {
        self.config.safety_profile = profile;
        self
    }

    /// Overrides the wait policy.
    #[must_use]
    pub fn wait_policy(mut self, policy: WaitPolicy) -> Self {
        self.config.wait_policy = policy;
        self
    }

    /// Overrides deterministic mode.
    #[must_use]
    pub fn deterministic(mut self, deterministic: bool) -> Self {
        self.config.deterministic = deterministic;
        self
    }

    /// Overrides resource ceilings.
    #[must_use]
    pub fn resource_ceilings(mut self, ceilings: ResourceCeilings) -> Self {
        self.config.resource_ceilings = ceilings;
        self
    }

    /// Overrides telemetry depth.
    #[must_use]
    pub fn telemetry_depth(mut self, depth: u8) -> Self {
        self.config.telemetry_depth = depth;
        self
    }

    /// Replaces the host hooks entirely.
    #[must_use]
    pub fn hooks(mut self, hooks: HostHooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// Loads a [`Config`] from a TOML file, replacing any prior
    /// configuration set on this builder. Gated behind the `config-file`
    /// feature, like the teacher's equivalent file-loading path.
    #[cfg(feature = "config-file")]
    pub fn from_file(mut self, path: impl AsRef<std::path::Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|_| KernelError::InvalidArgument)?;
        self.config = toml::from_str(&text).map_err(|_| KernelError::InvalidArgument)?;
        Ok(self)
    }

    /// Validates hooks against the configured determinism mode and
    /// constructs the runtime.
    pub fn build(self) -> Result<Runtime> {
        self.hooks.validate(self.config.deterministic)?;
        Ok(Runtime::new(self.config, self.hooks))
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

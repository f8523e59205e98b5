//! # Bevy Hit React Core
//!
//! Engine-agnostic core of the hit reaction system. A [`HitReactComponent`] receives impacts on
//! individual bones, spreads each impulse over nearby bones of the skeleton and blends a
//! physically simulated pose into the animated pose with a per-bone weight that rises on impact
//! and decays back to zero.
//!
//! How each bone reacts is authored as [`BoneProfile`]s grouped by gameplay tag in a
//! [`ProfileRegistry`]. Registries are usually loaded from `*.hitreact.ron` files:
//! ```ron
//! (
//!     profiles: [
//!         (tag: "HitReact.Torso", bone: "spine_01", max_weight: 0.8, decay_rate: 2.0, radius: 0.5),
//!         (tag: "HitReact.Head", bone: "neck_01", max_weight: 0.6, cooldown: 0.2),
//!     ],
//! )
//! ```
//!
//! [`HitReactComponent`]: component::HitReactComponent
//! [`BoneProfile`]: profile::BoneProfile
//! [`ProfileRegistry`]: registry::ProfileRegistry

pub mod blend;
pub mod component;
pub mod errors;
pub mod event;
pub mod hierarchy;
pub mod id;
pub mod interpolation;
pub mod notify;
pub mod profile;
pub mod propagation;
pub mod registry;
pub mod settings;

pub mod prelude {
    pub use super::blend::{
        BlendPhase, BlendWeightController, BoneBlendState, ImpulseResult, SuppressReason,
        toggle::{BlendCurve, BlendParams, GlobalToggle, ToggleParams, ToggleState},
    };
    pub use super::component::{
        BlendSnapshot, BoneWeight, DropReason, HitOutcome, HitReactComponent, PhysicsPoseSource,
    };
    pub use super::errors::{
        ConfigurationError, DuplicateProfileError, HitReactWarning, RegistryError,
    };
    pub use super::event::{
        AbilityEvent, AbilityHitBridge, DirectHitSource, HitEvent, HitEventSource,
        HitImpulseKind, RadialFalloff,
    };
    pub use super::hierarchy::BoneHierarchy;
    pub use super::id::{BoneId, HitReactTag};
    pub use super::interpolation::InterpolateLinear;
    pub use super::notify::{CollectingNotifier, HitReactNotifier, NoopNotifier};
    pub use super::profile::{BoneProfile, FalloffCurve, SubsequentImpulse};
    pub use super::propagation::{ImpulsePropagator, PropagatedImpulse, PropagatedImpulses};
    pub use super::registry::{ProfileLibrarySerial, ProfileRegistry, ProfileSet};
    pub use super::settings::{BoneLimits, HitReactSettings, MaxHandling};
}

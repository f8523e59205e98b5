//! # Bevy Hit React
//!
//! Physical hit reactions for skeletal characters in [Bevy](https://bevyengine.org/).
//!
//! Add the [`HitReactPlugin`](plugin::HitReactPlugin), provide a profile registry and request
//! hit reactions on a character with a [`HitReactConfig`](components::HitReactConfig):
//! ```ignore
//! app.add_plugins(HitReactPlugin::default());
//!
//! let library = asset_server.load("characters/knight.hitreact.ron");
//! commands.insert_resource(HitReactLibraryHandle(library));
//! commands.spawn((knight_scene, HitReactConfig::default()));
//! ```
//! The skeleton is read from the named descendants of the entity once its scene has finished
//! spawning.
//!
//! Hits are delivered with the [`ApplyHitReact`](components::ApplyHitReact) event, or through a
//! [`HitReactSource`](components::HitReactSource) component. Every frame the resulting weights
//! are published in [`PhysicsBlendWeights`](components::PhysicsBlendWeights).
//!
//! With the `physics_avian` feature, bones mapped to rigid bodies in
//! [`HitReactBodies`](physics_avian::HitReactBodies) have their simulated pose sampled from
//! avian3d automatically.

pub mod assets;
pub mod components;
pub mod errors;
#[cfg(feature = "physics_avian")]
pub mod physics_avian;
pub mod plugin;
pub mod systems;

pub use bevy_hit_react_core as core;

pub mod prelude {
    pub use super::assets::{HitReactLibrary, HitReactLibraryHandle, HitReactRegistry};
    pub use super::components::{
        ApplyHitReact, HitReact, HitReactConfig, HitReactSource, PhysicsBlendWeights,
        SetHitReactEnabled,
    };
    pub use super::errors::AssetLoaderError;
    #[cfg(feature = "physics_avian")]
    pub use super::physics_avian::HitReactBodies;
    pub use super::plugin::{HitReactPlugin, HitReactSet};
    pub use bevy_hit_react_core::prelude::*;
}

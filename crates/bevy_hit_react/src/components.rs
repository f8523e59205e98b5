use bevy::{
    ecs::{component::Component, entity::Entity, event::Event, observer::On, system::Query},
    log::debug,
    prelude::{Deref, DerefMut},
};
use bevy_hit_react_core::{
    component::{BlendSnapshot, HitReactComponent},
    event::{HitEvent, HitEventSource},
    hierarchy::BoneHierarchy,
    settings::HitReactSettings,
};

/// Requests hit reactions for this entity.
///
/// Once a [`HitReactRegistry`](crate::assets::HitReactRegistry) is available a [`HitReact`] is
/// created from this configuration. Without an explicit hierarchy the bone hierarchy is read
/// from the named descendants of the entity, using their current local translations as the
/// rest pose.
#[derive(Component, Debug, Clone, Default)]
pub struct HitReactConfig {
    pub settings: HitReactSettings,
    pub hierarchy: Option<BoneHierarchy>,
}

/// Attached hit reaction state of a character.
#[derive(Component, Deref, DerefMut)]
#[require(PhysicsBlendWeights)]
pub struct HitReact(pub HitReactComponent);

/// Physics weights published by the last update, for the animation pipeline to consume.
#[derive(Component, Debug, Clone, Default, Deref)]
pub struct PhysicsBlendWeights(pub BlendSnapshot);

/// An event source pumped into the entity's [`HitReact`] once per update.
#[derive(Component, Debug, Clone, Default, Deref, DerefMut)]
pub struct HitReactSource<S: HitEventSource + Send + Sync + 'static>(pub S);

/// Delivers a hit to the [`HitReact`] of `entity`.
#[derive(Event, Debug, Clone)]
pub struct ApplyHitReact {
    pub entity: Entity,
    pub hit: HitEvent,
}

impl ApplyHitReact {
    pub fn observe(input: On<ApplyHitReact>, mut hit_reacts: Query<&mut HitReact>) {
        let Ok(mut hit_react) = hit_reacts.get_mut(input.entity) else {
            debug!("Dropping hit for {}: no hit react attached", input.entity);
            return;
        };
        let outcome = hit_react.on_hit(&input.hit);
        debug!("Hit on {} for {}: {outcome:?}", input.hit.bone, input.entity);
    }
}

/// Enables or disables hit reactions of `entity`, see [`HitReactComponent::set_enabled`].
#[derive(Event, Debug, Clone, Copy)]
pub struct SetHitReactEnabled {
    pub entity: Entity,
    pub enabled: bool,
    pub interpolate: bool,
}

impl SetHitReactEnabled {
    pub fn observe(input: On<SetHitReactEnabled>, mut hit_reacts: Query<&mut HitReact>) {
        if let Ok(mut hit_react) = hit_reacts.get_mut(input.entity) {
            hit_react.set_enabled(input.enabled, input.interpolate);
        }
    }
}

use avian3d::prelude::{Position, Rotation};
use bevy::{
    ecs::{component::Component, entity::Entity, system::Query},
    platform::collections::HashMap,
    prelude::{Deref, DerefMut},
    transform::components::Transform,
};
use bevy_hit_react_core::{component::PhysicsPoseSource, id::BoneId};

use crate::components::HitReact;

/// Rigid bodies simulating each bone of a character.
#[derive(Component, Debug, Clone, Default, Deref, DerefMut)]
pub struct HitReactBodies(pub HashMap<BoneId, Entity>);

struct AvianPose<'a, F> {
    bodies: &'a HitReactBodies,
    lookup: F,
}

impl<F> PhysicsPoseSource for AvianPose<'_, F>
where
    F: Fn(Entity) -> Option<Transform>,
{
    fn bone_transform(&self, bone: &BoneId) -> Option<Transform> {
        (self.lookup)(*self.bodies.get(bone)?)
    }
}

/// Copies the world-space pose of each simulated bone's rigid body into its hit reaction.
pub fn sample_physics_poses_avian(
    mut hit_reacts: Query<(&mut HitReact, &HitReactBodies)>,
    rigid_bodies: Query<(&Position, &Rotation)>,
) {
    for (mut hit_react, bodies) in &mut hit_reacts {
        hit_react.sample_physics(&AvianPose {
            bodies,
            lookup: |entity| {
                let (position, rotation) = rigid_bodies.get(entity).ok()?;
                Some(Transform::from_translation(position.0).with_rotation(rotation.0))
            },
        });
    }
}

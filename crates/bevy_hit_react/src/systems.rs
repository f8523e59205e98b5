use bevy::{
    ecs::{
        entity::Entity,
        hierarchy::Children,
        name::Name,
        query::Without,
        system::{Commands, Query, Res},
    },
    log::{debug, error, warn},
    platform::collections::HashSet,
    scene::{SceneInstance, SceneRoot, SceneSpawner},
    time::Time,
    transform::components::Transform,
};
use bevy_hit_react_core::{
    component::HitReactComponent, errors::ConfigurationError, event::HitEventSource,
    hierarchy::BoneHierarchy, id::BoneId,
};

use crate::{
    assets::HitReactRegistry,
    components::{HitReact, HitReactConfig, HitReactSource, PhysicsBlendWeights},
};

/// Builds a bone hierarchy from the named descendants of `root`.
///
/// Unnamed entities are skipped: their named descendants hang from the nearest named ancestor
/// and their transforms count toward the bone length. Only the first entity with a given name
/// becomes a bone, later ones are skipped like unnamed entities.
pub fn hierarchy_from_entities(
    root: Entity,
    children_query: &Query<&Children>,
    node_query: &Query<(Option<&Name>, Option<&Transform>)>,
) -> Result<BoneHierarchy, ConfigurationError> {
    let mut bones: Vec<(BoneId, Option<BoneId>, f32)> = vec![];
    let mut seen: HashSet<BoneId> = HashSet::default();
    // Entity, nearest named ancestor and the transform accumulated since that ancestor
    let mut pending: Vec<(Entity, Option<BoneId>, Transform)> = children_query
        .get(root)
        .map(|children| {
            children
                .into_iter()
                .rev()
                .map(|&child| (child, None, Transform::IDENTITY))
                .collect()
        })
        .unwrap_or_default();

    while let Some((entity, parent, offset)) = pending.pop() {
        let (name, local) = node_query.get(entity).unwrap_or_default();
        let offset = offset.mul_transform(local.copied().unwrap_or_default());

        let bone = match name.map(|name| BoneId::new(name.as_str())) {
            Some(bone) if seen.contains(&bone) => {
                warn!("Skipping {entity}: bone name {bone} is already taken");
                None
            }
            other => other,
        };
        let (child_parent, child_offset) = match bone {
            Some(bone) => {
                let length = if parent.is_some() {
                    offset.translation.length()
                } else {
                    0.
                };
                seen.insert(bone.clone());
                bones.push((bone.clone(), parent, length));
                (Some(bone), Transform::IDENTITY)
            }
            None => (parent, offset),
        };

        if let Ok(children) = children_query.get(entity) {
            for &child in children.into_iter().rev() {
                pending.push((child, child_parent.clone(), child_offset));
            }
        }
    }

    let mut hierarchy = BoneHierarchy::new();
    for (bone, parent, length) in bones {
        hierarchy.add_bone(bone, parent, length)?;
    }
    Ok(hierarchy)
}

fn scene_is_ready(spawner: Option<&SceneSpawner>, instance: Option<&SceneInstance>) -> bool {
    match (spawner, instance) {
        (Some(spawner), Some(instance)) => spawner.instance_is_ready(**instance),
        _ => false,
    }
}

/// Creates and attaches a [`HitReact`] for every new [`HitReactConfig`].
///
/// Entities spawning a scene wait until the scene instance is ready, and entities without any
/// named descendant wait until one shows up.
#[allow(clippy::type_complexity)]
pub fn attach_hit_reacts(
    mut commands: Commands,
    registry: Option<Res<HitReactRegistry>>,
    scene_spawner: Option<Res<SceneSpawner>>,
    configs: Query<
        (
            Entity,
            &HitReactConfig,
            Option<&SceneRoot>,
            Option<&SceneInstance>,
        ),
        Without<HitReact>,
    >,
    children_query: Query<&Children>,
    node_query: Query<(Option<&Name>, Option<&Transform>)>,
) {
    let Some(registry) = registry else {
        return;
    };

    for (entity, config, scene_root, scene_instance) in &configs {
        if scene_root.is_some() && !scene_is_ready(scene_spawner.as_deref(), scene_instance) {
            continue;
        }

        let hierarchy = match &config.hierarchy {
            Some(hierarchy) => Ok(hierarchy.clone()),
            None => match hierarchy_from_entities(entity, &children_query, &node_query) {
                Ok(hierarchy) if hierarchy.is_empty() => {
                    debug!("Waiting for bones under {entity}");
                    continue;
                }
                other => other,
            },
        };
        let component = hierarchy.and_then(|hierarchy| {
            let mut component =
                HitReactComponent::create(registry.0.clone(), config.settings.clone())?;
            component.attach(hierarchy);
            Ok(component)
        });

        match component {
            Ok(component) => {
                debug!("Attaching hit reactions to {entity}");
                commands.entity(entity).insert(HitReact(component));
            }
            Err(err) => {
                error!("Cannot attach hit reactions to {entity}: {err}");
                commands.entity(entity).remove::<HitReactConfig>();
            }
        }
    }
}

/// Drains every [`HitReactSource<S>`] into the hit reaction of the same entity.
pub fn pump_hit_sources<S: HitEventSource + Send + Sync + 'static>(
    mut query: Query<(&mut HitReact, &mut HitReactSource<S>)>,
) {
    for (mut hit_react, mut source) in &mut query {
        hit_react.pump(&mut source.0);
    }
}

pub fn tick_hit_reacts(
    time: Res<Time>,
    mut query: Query<(&mut HitReact, &mut PhysicsBlendWeights)>,
) {
    let dt = time.delta_secs();
    for (mut hit_react, mut weights) in &mut query {
        let snapshot = hit_react.tick(dt);
        weights.0.clone_from(snapshot);
    }
}

#[cfg(test)]
mod test {
    use std::{sync::Arc, time::Duration};

    use bevy::{
        ecs::{hierarchy::ChildOf, system::RunSystemOnce, world::World},
        math::Vec3,
    };
    use bevy_hit_react_core::{
        event::{DirectHitSource, HitEvent},
        profile::BoneProfile,
        registry::ProfileRegistry,
        settings::HitReactSettings,
    };

    use super::*;
    use crate::components::{ApplyHitReact, SetHitReactEnabled};

    fn registry() -> HitReactRegistry {
        let mut registry = ProfileRegistry::new();
        registry
            .register(
                "HitReact",
                BoneProfile {
                    max_weight: 0.8,
                    decay_rate: 2.,
                    radius: 2.,
                    ..BoneProfile::new("HitReact", "spine")
                },
            )
            .unwrap();
        HitReactRegistry(Arc::new(registry))
    }

    fn spawn_character(world: &mut World) -> Entity {
        let character = world.spawn(HitReactConfig::default()).id();
        let spine = world
            .spawn((Name::new("spine"), Transform::default(), ChildOf(character)))
            .id();
        // Unnamed helper entities do not break the chain
        let socket = world
            .spawn((Transform::from_xyz(0., 0.5, 0.), ChildOf(spine)))
            .id();
        let chest = world
            .spawn((
                Name::new("chest"),
                Transform::from_xyz(0., 1., 0.),
                ChildOf(socket),
            ))
            .id();
        world.spawn((
            Name::new("neck"),
            Transform::from_xyz(0., 1., 0.),
            ChildOf(chest),
        ));
        character
    }

    fn attached_world() -> (World, Entity) {
        let mut world = World::new();
        world.insert_resource(registry());
        world.insert_resource(Time::<()>::default());
        world.add_observer(ApplyHitReact::observe);
        world.add_observer(SetHitReactEnabled::observe);
        let character = spawn_character(&mut world);
        world.run_system_once(attach_hit_reacts).unwrap();
        (world, character)
    }

    fn advance(world: &mut World, seconds: f32) {
        world
            .resource_mut::<Time>()
            .advance_by(Duration::from_secs_f32(seconds));
        world.run_system_once(tick_hit_reacts).unwrap();
    }

    #[test]
    fn test_attach_waits_for_registry() {
        let mut world = World::new();
        let character = spawn_character(&mut world);
        world.run_system_once(attach_hit_reacts).unwrap();
        assert!(world.get::<HitReact>(character).is_none());

        world.insert_resource(registry());
        world.run_system_once(attach_hit_reacts).unwrap();
        let hit_react = world.get::<HitReact>(character).unwrap();
        let hierarchy = hit_react.hierarchy().unwrap();
        assert_eq!(hierarchy.len(), 3);
        assert_eq!(
            hierarchy.parent(&"chest".into()).map(|p| p.as_str()),
            Some("spine")
        );
        assert_eq!(hierarchy.length(&"chest".into()), Some(1.5));
        assert_eq!(hierarchy.length(&"neck".into()), Some(1.));
        assert!(world.get::<PhysicsBlendWeights>(character).is_some());
    }

    #[test]
    fn test_attach_waits_for_bones() {
        let mut world = World::new();
        world.insert_resource(registry());
        let character = world.spawn(HitReactConfig::default()).id();
        world.run_system_once(attach_hit_reacts).unwrap();
        assert!(world.get::<HitReact>(character).is_none());
        assert!(world.get::<HitReactConfig>(character).is_some());

        let spine = world
            .spawn((Name::new("spine"), Transform::default(), ChildOf(character)))
            .id();
        world.spawn((
            Name::new("chest"),
            Transform::from_xyz(0., 1., 0.),
            ChildOf(spine),
        ));
        world.run_system_once(attach_hit_reacts).unwrap();

        let mut hit_react = world.get_mut::<HitReact>(character).unwrap();
        assert_eq!(hit_react.hierarchy().unwrap().len(), 2);
        let outcome = hit_react.on_hit(&HitEvent::new("chest", Vec3::X, "HitReact"));
        assert!(outcome.is_applied());
    }

    #[test]
    fn test_attach_waits_for_scene() {
        let mut world = World::new();
        world.insert_resource(registry());
        let character = world
            .spawn((HitReactConfig::default(), SceneRoot::default()))
            .id();
        world.spawn((Name::new("spine"), Transform::default(), ChildOf(character)));

        world.run_system_once(attach_hit_reacts).unwrap();
        assert!(world.get::<HitReact>(character).is_none());
        assert!(world.get::<HitReactConfig>(character).is_some());
    }

    #[test]
    fn test_duplicate_bone_names_are_skipped() {
        let mut world = World::new();
        let character = world.spawn_empty().id();
        let spine = world
            .spawn((Name::new("spine"), Transform::default(), ChildOf(character)))
            .id();
        let first = world
            .spawn((
                Name::new("hand"),
                Transform::from_xyz(1., 0., 0.),
                ChildOf(spine),
            ))
            .id();
        let second = world
            .spawn((
                Name::new("hand"),
                Transform::from_xyz(0., 1., 0.),
                ChildOf(first),
            ))
            .id();
        world.spawn((
            Name::new("finger"),
            Transform::from_xyz(0., 1., 0.),
            ChildOf(second),
        ));

        let hierarchy = world
            .run_system_once(
                move |children: Query<&Children>,
                      nodes: Query<(Option<&Name>, Option<&Transform>)>| {
                    hierarchy_from_entities(character, &children, &nodes)
                },
            )
            .unwrap()
            .unwrap();
        assert_eq!(hierarchy.len(), 3);
        assert_eq!(
            hierarchy.parent(&"finger".into()).map(|p| p.as_str()),
            Some("hand")
        );
        assert_eq!(hierarchy.length(&"finger".into()), Some(2.));
    }

    #[test]
    fn test_invalid_config_is_removed() {
        let mut world = World::new();
        world.insert_resource(registry());
        let character = world
            .spawn(HitReactConfig {
                settings: HitReactSettings {
                    epsilon: -1.,
                    ..Default::default()
                },
                hierarchy: None,
            })
            .id();
        world.run_system_once(attach_hit_reacts).unwrap();
        assert!(world.get::<HitReact>(character).is_none());
        assert!(world.get::<HitReactConfig>(character).is_none());
    }

    #[test]
    fn test_observed_hit_is_published_by_tick() {
        let (mut world, character) = attached_world();
        world.trigger(ApplyHitReact {
            entity: character,
            hit: HitEvent::new("chest", Vec3::new(0., 0., -1.), "HitReact"),
        });
        advance(&mut world, 1.);

        let weights = world.get::<PhysicsBlendWeights>(character).unwrap();
        assert_eq!(weights.len(), 3);
        assert!((weights.weight(&"chest".into()) - 0.8 * (-2f32).exp()).abs() < 1e-4);
        assert!((weights.weight(&"neck".into()) - 0.5 * (-2f32).exp()).abs() < 1e-4);
    }

    #[test]
    fn test_disable_event() {
        let (mut world, character) = attached_world();
        world.trigger(SetHitReactEnabled {
            entity: character,
            enabled: false,
            interpolate: false,
        });
        world.trigger(ApplyHitReact {
            entity: character,
            hit: HitEvent::new("chest", Vec3::X, "HitReact"),
        });
        advance(&mut world, 0.1);
        assert!(world.get::<PhysicsBlendWeights>(character).unwrap().is_empty());
    }

    #[test]
    fn test_direct_source_is_pumped() {
        let (mut world, character) = attached_world();
        let mut source = DirectHitSource::new();
        source.push(HitEvent::new("neck", Vec3::X * 0.5, "HitReact"));
        world
            .entity_mut(character)
            .insert(HitReactSource(source));

        world
            .run_system_once(pump_hit_sources::<DirectHitSource>)
            .unwrap();
        advance(&mut world, 0.);

        let weights = world.get::<PhysicsBlendWeights>(character).unwrap();
        assert_eq!(weights.weight(&"neck".into()), 0.5);
        assert!(
            world
                .get::<HitReactSource<DirectHitSource>>(character)
                .unwrap()
                .is_empty()
        );
    }
}

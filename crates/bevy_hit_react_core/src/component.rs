use std::sync::Arc;

use bevy::{
    log::{debug, warn},
    math::Vec3,
    platform::collections::HashMap,
    transform::components::Transform,
};

use crate::{
    blend::{
        BlendWeightController, ControllerParams,
        toggle::{GlobalToggle, ToggleState},
    },
    errors::{ConfigurationError, HitReactWarning},
    event::{HitEvent, HitEventSource, HitImpulseKind},
    hierarchy::BoneHierarchy,
    id::BoneId,
    interpolation::InterpolateLinear,
    notify::{HitReactNotifier, NoopNotifier},
    propagation::{ImpulsePropagator, PropagatedImpulse, PropagatedImpulses},
    registry::ProfileRegistry,
    settings::HitReactSettings,
};

/// Read-only access to the simulated pose of each bone.
pub trait PhysicsPoseSource {
    fn bone_transform(&self, bone: &BoneId) -> Option<Transform>;
}

impl PhysicsPoseSource for HashMap<BoneId, Transform> {
    fn bone_transform(&self, bone: &BoneId) -> Option<Transform> {
        self.get(bone).copied()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DropReason {
    NotAttached,
    ToggledOff,
    GlobalCooldown,
    /// Radial impulse without a positive radius
    InvalidImpulse,
    UnknownBone,
    NoProfile,
    /// Every reached bone rejected its impulse (cooldown, bone limit or negligible strength)
    Suppressed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitOutcome {
    /// Number of bones whose blend state changed
    Applied { bones: usize },
    Dropped(DropReason),
}

impl HitOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, HitOutcome::Applied { .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoneWeight {
    pub bone: BoneId,
    pub weight: f32,
    pub physics_transform: Transform,
}

/// Per-bone physics weights published by a tick. Bones not listed blend with weight zero.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlendSnapshot {
    entries: Vec<BoneWeight>,
}

impl BlendSnapshot {
    pub fn iter(&self) -> impl Iterator<Item = &BoneWeight> {
        self.entries.iter()
    }

    pub fn get(&self, bone: &BoneId) -> Option<&BoneWeight> {
        self.entries.iter().find(|entry| &entry.bone == bone)
    }

    pub fn weight(&self, bone: &BoneId) -> f32 {
        self.get(bone).map(|entry| entry.weight).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Final local transform of `bone`: the animated pose moved toward the physics pose by the
    /// bone's weight.
    pub fn blend(&self, bone: &BoneId, animated: &Transform) -> Transform {
        match self.get(bone) {
            Some(entry) => animated.interpolate_linear(&entry.physics_transform, entry.weight),
            None => *animated,
        }
    }

    fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Hit reaction state of one skeletal character.
///
/// Lifecycle is explicit: [`HitReactComponent::create`] validates the configuration,
/// [`HitReactComponent::attach`] binds the component to a skeleton and
/// [`HitReactComponent::detach`] releases all per-bone state. All calls for one component must
/// come from the same update loop; [`HitReactComponent::tick`] runs once per animation update.
pub struct HitReactComponent {
    registry: Arc<ProfileRegistry>,
    settings: HitReactSettings,
    propagator: ImpulsePropagator,
    controller: BlendWeightController,
    toggle: GlobalToggle,
    hierarchy: Option<BoneHierarchy>,
    bone_positions: HashMap<BoneId, Vec3>,
    clock: f64,
    last_accepted_hit: Option<f64>,
    snapshot: BlendSnapshot,
    notifier: Box<dyn HitReactNotifier>,
}

impl HitReactComponent {
    pub fn create(
        registry: Arc<ProfileRegistry>,
        settings: HitReactSettings,
    ) -> Result<Self, ConfigurationError> {
        settings.validate()?;
        Ok(Self {
            registry,
            propagator: ImpulsePropagator::new(
                settings.impulse_threshold,
                settings.max_propagation_depth,
            ),
            controller: BlendWeightController::new(ControllerParams::from(&settings)),
            toggle: GlobalToggle::new(settings.toggle),
            hierarchy: None,
            bone_positions: HashMap::default(),
            clock: 0.,
            last_accepted_hit: None,
            snapshot: BlendSnapshot::default(),
            notifier: Box::new(NoopNotifier),
            settings,
        })
    }

    pub fn with_notifier(mut self, notifier: impl HitReactNotifier + 'static) -> Self {
        self.notifier = Box::new(notifier);
        self
    }

    /// Binds the component to a skeleton, creating an idle blend state for every bone that is
    /// not blacklisted. Attaching again replaces the previous skeleton and its state.
    pub fn attach(&mut self, hierarchy: BoneHierarchy) {
        let simulated = hierarchy
            .iter()
            .filter(|bone| !self.settings.is_blacklisted(bone))
            .cloned();
        self.controller.populate(simulated);
        debug!(
            "Hit reactions attached to {} bones ({} simulated)",
            hierarchy.len(),
            self.controller.len()
        );
        self.hierarchy = Some(hierarchy);
        self.bone_positions.clear();
        self.last_accepted_hit = None;
        self.snapshot.clear();
    }

    pub fn detach(&mut self) {
        self.hierarchy = None;
        self.bone_positions.clear();
        self.controller.clear();
        self.last_accepted_hit = None;
        self.snapshot.clear();
    }

    pub fn is_attached(&self) -> bool {
        self.hierarchy.is_some()
    }

    pub fn hierarchy(&self) -> Option<&BoneHierarchy> {
        self.hierarchy.as_ref()
    }

    pub fn registry(&self) -> &Arc<ProfileRegistry> {
        &self.registry
    }

    pub fn settings(&self) -> &HitReactSettings {
        &self.settings
    }

    pub fn controller(&self) -> &BlendWeightController {
        &self.controller
    }

    /// Seconds accumulated by [`HitReactComponent::tick`] since creation
    pub fn clock(&self) -> f64 {
        self.clock
    }

    /// Weights published by the most recent tick.
    pub fn snapshot(&self) -> &BlendSnapshot {
        &self.snapshot
    }

    fn warn(&self, warning: HitReactWarning) {
        warn!("{warning}");
        self.notifier.notify(&warning);
    }

    fn propagate(&self, hierarchy: &BoneHierarchy, hit: &HitEvent) -> Option<PropagatedImpulses> {
        let propagated = self.propagator.propagate(
            hierarchy,
            self.registry.resolve(&hit.tag),
            &hit.bone,
            hit.impulse,
        );
        if propagated.is_some() {
            return propagated;
        }
        let fallback = self.settings.fallback_tag.as_ref()?;
        self.propagator.propagate(
            hierarchy,
            self.registry.resolve(fallback),
            &hit.bone,
            hit.impulse,
        )
    }

    /// Impulse received by a propagated entry once the hit's impulse kind is taken into account.
    ///
    /// Radial hits measure distance from the bone's last sampled position to the hit location.
    /// Bones never sampled are assumed to lie at their hierarchy distance from the hit bone.
    fn shape_impulse(&self, hit: &HitEvent, entry: &PropagatedImpulse) -> Vec3 {
        let HitImpulseKind::Radial { radius, falloff } = hit.kind else {
            return entry.impulse;
        };
        let offset = self
            .bone_positions
            .get(&entry.bone)
            .map(|position| *position - hit.world_location);
        let distance = offset.map_or(entry.distance, Vec3::length);
        let direction = offset
            .and_then(Vec3::try_normalize)
            .unwrap_or_else(|| entry.impulse.normalize_or_zero());
        direction * entry.impulse.length() * falloff.scale(distance, radius)
    }

    pub fn on_hit(&mut self, hit: &HitEvent) -> HitOutcome {
        let Some(hierarchy) = &self.hierarchy else {
            debug!("Dropping hit on {}: component is not attached", hit.bone);
            return HitOutcome::Dropped(DropReason::NotAttached);
        };
        if !self.toggle.state().targets_enabled() {
            debug!("Dropping hit on {}: hit reactions are disabled", hit.bone);
            return HitOutcome::Dropped(DropReason::ToggledOff);
        }
        if let Some(last) = self.last_accepted_hit
            && self.clock - last < self.settings.global_cooldown as f64
        {
            debug!("Dropping hit on {}: global cooldown", hit.bone);
            return HitOutcome::Dropped(DropReason::GlobalCooldown);
        }
        if !hit.kind.is_valid() {
            debug!("Dropping hit on {}: invalid impulse {:?}", hit.bone, hit.kind);
            return HitOutcome::Dropped(DropReason::InvalidImpulse);
        }
        if !hierarchy.contains(&hit.bone) {
            self.warn(HitReactWarning::UnknownBone {
                bone: hit.bone.clone(),
            });
            return HitOutcome::Dropped(DropReason::UnknownBone);
        }
        let Some(propagated) = self.propagate(hierarchy, hit) else {
            self.warn(HitReactWarning::MissingProfile {
                tag: hit.tag.clone(),
                bone: hit.bone.clone(),
            });
            return HitOutcome::Dropped(DropReason::NoProfile);
        };

        let now = self.clock;
        let impulses: Vec<_> = propagated
            .iter()
            .map(|entry| (&entry.bone, self.shape_impulse(hit, entry), &entry.profile))
            .collect();
        let applied = self.controller.apply_hit(impulses, now);

        if applied == 0 {
            debug!("Hit on {} changed no bone", hit.bone);
            return HitOutcome::Dropped(DropReason::Suppressed);
        }
        self.last_accepted_hit = Some(now);
        HitOutcome::Applied { bones: applied }
    }

    /// Advances the component by `dt` seconds and publishes the resulting weights.
    pub fn tick(&mut self, dt: f32) -> &BlendSnapshot {
        let dt = if dt.is_finite() { dt.max(0.) } else { 0. };
        self.clock += dt as f64;

        if self.toggle.tick(dt) {
            self.controller.reset();
        }
        self.controller.tick(dt);
        for warning in self.controller.drain_warnings() {
            self.notifier.notify(&warning);
        }

        let alpha = self.toggle.alpha();
        self.snapshot.entries.clear();
        self.snapshot
            .entries
            .extend(self.controller.iter_active().map(|(bone, state)| BoneWeight {
                bone: bone.clone(),
                weight: state.current_weight() * alpha,
                physics_transform: *state.physics_transform(),
            }));

        &self.snapshot
    }

    /// Returns every bone to pure animation immediately and forgets cooldown history.
    pub fn reset(&mut self) {
        self.controller.reset();
        self.last_accepted_hit = None;
        self.snapshot.clear();
    }

    /// Records the current physics pose of every simulating bone, and the position of every
    /// bone the source knows about for radial hits.
    pub fn sample_physics(&mut self, source: &dyn PhysicsPoseSource) {
        if let Some(hierarchy) = &self.hierarchy {
            for bone in hierarchy.iter() {
                if let Some(transform) = source.bone_transform(bone) {
                    self.bone_positions.insert(bone.clone(), transform.translation);
                }
            }
        }

        let active: Vec<BoneId> = self
            .controller
            .iter_active()
            .map(|(bone, _)| bone.clone())
            .collect();
        for bone in active {
            if let Some(transform) = source.bone_transform(&bone) {
                self.controller.set_physics_transform(&bone, transform);
            }
        }
    }

    pub fn set_enabled(&mut self, enabled: bool, interpolate: bool) {
        if self.toggle.set_enabled(enabled, interpolate) {
            self.controller.reset();
        }
    }

    pub fn toggle_state(&self) -> ToggleState {
        self.toggle.state()
    }

    pub fn toggle_alpha(&self) -> f32 {
        self.toggle.alpha()
    }

    /// Applies the source's pending toggle request, then every pending hit in arrival order.
    /// Returns the number of hits that were applied.
    pub fn pump(&mut self, source: &mut dyn HitEventSource) -> usize {
        if let Some(enabled) = source.take_toggle_request() {
            self.set_enabled(enabled, true);
        }
        let mut applied = 0;
        source.drain(&mut |hit| {
            if self.on_hit(&hit).is_applied() {
                applied += 1;
            }
        });
        applied
    }
}

#[cfg(test)]
mod test {
    use bevy::math::Vec3;

    use super::*;
    use crate::{event::RadialFalloff, notify::CollectingNotifier, profile::BoneProfile};

    fn component() -> HitReactComponent {
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
        let mut hierarchy = BoneHierarchy::new();
        hierarchy.add_bone("spine", None, 0.).unwrap();
        hierarchy.add_bone("chest", Some("spine".into()), 1.).unwrap();
        hierarchy.add_bone("neck", Some("chest".into()), 1.).unwrap();

        let mut component =
            HitReactComponent::create(Arc::new(registry), HitReactSettings::default()).unwrap();
        component.attach(hierarchy);
        component
    }

    #[test]
    fn test_create_rejects_invalid_settings() {
        let settings = HitReactSettings {
            max_propagation_depth: 0,
            ..Default::default()
        };
        assert!(HitReactComponent::create(Arc::new(ProfileRegistry::new()), settings).is_err());
    }

    #[test]
    fn test_detached_component_drops_hits() {
        let mut component = component();
        component.detach();
        assert!(!component.is_attached());
        assert_eq!(
            component.on_hit(&HitEvent::new("chest", Vec3::X, "HitReact")),
            HitOutcome::Dropped(DropReason::NotAttached)
        );
        assert!(component.tick(0.1).is_empty());
    }

    #[test]
    fn test_missing_profile_is_notified() {
        let notifier = CollectingNotifier::new();
        let mut component = component().with_notifier(notifier.clone());
        let outcome = component.on_hit(&HitEvent::new("chest", Vec3::X, "Other"));
        assert_eq!(outcome, HitOutcome::Dropped(DropReason::NoProfile));
        assert_eq!(
            notifier.take(),
            vec![HitReactWarning::MissingProfile {
                tag: "Other".into(),
                bone: "chest".into()
            }]
        );
    }

    #[test]
    fn test_fallback_tag() {
        let mut component = component();
        component.settings.fallback_tag = Some("HitReact".into());
        let outcome = component.on_hit(&HitEvent::new("chest", Vec3::X, "Other"));
        assert_eq!(outcome, HitOutcome::Applied { bones: 3 });
    }

    #[test]
    fn test_global_cooldown() {
        let mut component = component();
        component.settings.global_cooldown = 0.5;
        let hit = HitEvent::new("chest", Vec3::X, "HitReact");
        assert!(component.on_hit(&hit).is_applied());
        component.tick(0.25);
        assert_eq!(
            component.on_hit(&hit),
            HitOutcome::Dropped(DropReason::GlobalCooldown)
        );
        component.tick(0.25);
        assert!(component.on_hit(&hit).is_applied());
    }

    #[test]
    fn test_snapshot_blends_toward_physics_pose() {
        let mut component = component();
        component.on_hit(&HitEvent::new("chest", Vec3::X, "HitReact"));
        component.tick(0.);

        let mut physics: HashMap<BoneId, Transform> = HashMap::default();
        physics.insert(BoneId::new("chest"), Transform::from_xyz(1., 0., 0.));
        component.sample_physics(&physics);
        let snapshot = component.tick(0.);

        let chest = BoneId::new("chest");
        assert_eq!(snapshot.weight(&chest), 0.8);
        let blended = snapshot.blend(&chest, &Transform::IDENTITY);
        assert!((blended.translation.x - 0.8).abs() < 1e-6);
        let untouched = snapshot.blend(&"head".into(), &Transform::IDENTITY);
        assert_eq!(untouched, Transform::IDENTITY);
    }

    fn target(component: &HitReactComponent, bone: &str) -> f32 {
        component
            .controller()
            .state(&bone.into())
            .map(|state| state.target_weight())
            .unwrap_or_default()
    }

    #[test]
    fn test_radial_hit_uses_sampled_positions() {
        let mut component = component();
        let mut physics: HashMap<BoneId, Transform> = HashMap::default();
        for (bone, height) in [("spine", 0.), ("chest", 1.), ("neck", 2.)] {
            physics.insert(BoneId::new(bone), Transform::from_xyz(0., height, 0.));
        }
        component.sample_physics(&physics);

        let hit = HitEvent::new("chest", Vec3::new(0., 0., -1.), "HitReact")
            .at(Vec3::new(0., 2., 0.))
            .radial(1.5, RadialFalloff::Linear);
        assert_eq!(component.on_hit(&hit), HitOutcome::Applied { bones: 2 });

        // The spine is out of the blast radius
        assert_eq!(target(&component, "spine"), 0.);
        assert!((target(&component, "chest") - 1. / 3.).abs() < 1e-6);
        assert_eq!(target(&component, "neck"), 0.5);

        let chest = component.controller().state(&"chest".into()).unwrap();
        assert!(chest.target_impulse().normalize().abs_diff_eq(Vec3::NEG_Y, 1e-6));
        let neck = component.controller().state(&"neck".into()).unwrap();
        assert_eq!(neck.target_impulse(), Vec3::new(0., 0., -0.5));
    }

    #[test]
    fn test_radial_hit_without_positions_uses_hierarchy_distance() {
        let mut component = component();
        let hit = HitEvent::new("chest", Vec3::new(0., 0., -1.), "HitReact")
            .radial(1.5, RadialFalloff::Linear);
        assert_eq!(component.on_hit(&hit), HitOutcome::Applied { bones: 3 });
        assert_eq!(target(&component, "chest"), 0.8);
        assert!((target(&component, "spine") - 0.5 / 3.).abs() < 1e-6);
        assert!((target(&component, "neck") - 0.5 / 3.).abs() < 1e-6);
    }

    #[test]
    fn test_radial_hit_requires_radius() {
        let mut component = component();
        let hit = HitEvent::new("chest", Vec3::X, "HitReact").radial(0., RadialFalloff::Constant);
        assert_eq!(
            component.on_hit(&hit),
            HitOutcome::Dropped(DropReason::InvalidImpulse)
        );
        assert_eq!(component.controller().active_count(), 0);
    }

    #[test]
    fn test_disable_resets_and_drops_hits() {
        let mut component = component();
        let hit = HitEvent::new("chest", Vec3::X, "HitReact");
        component.on_hit(&hit);
        component.tick(0.1);

        component.set_enabled(false, true);
        assert_eq!(component.toggle_state(), ToggleState::Disabling);
        assert_eq!(
            component.on_hit(&hit),
            HitOutcome::Dropped(DropReason::ToggledOff)
        );
        component.tick(0.3);
        assert_eq!(component.toggle_state(), ToggleState::Disabled);
        assert_eq!(component.controller().active_count(), 0);

        component.set_enabled(true, false);
        assert!(component.on_hit(&hit).is_applied());
    }
}

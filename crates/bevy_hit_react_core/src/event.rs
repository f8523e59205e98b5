use std::collections::VecDeque;

use bevy::{log::debug, math::Vec3};
use serde::{Deserialize, Serialize};

use crate::id::{BoneId, HitReactTag};

/// How strength decreases with distance from a radial impulse's origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RadialFalloff {
    #[default]
    Linear,
    Constant,
}

impl RadialFalloff {
    /// Strength multiplier at `distance` from the origin, zero at and beyond `radius`.
    pub fn scale(self, distance: f32, radius: f32) -> f32 {
        if distance.is_nan() || distance >= radius {
            return 0.;
        }
        match self {
            RadialFalloff::Linear => 1. - distance.max(0.) / radius,
            RadialFalloff::Constant => 1.,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum HitImpulseKind {
    /// The impulse vector is applied as is
    #[default]
    Linear,
    /// Every reached bone is pushed away from the hit's world location with the impulse's
    /// strength, attenuated by its distance to that location
    Radial { radius: f32, falloff: RadialFalloff },
}

impl HitImpulseKind {
    pub fn is_valid(&self) -> bool {
        match self {
            HitImpulseKind::Linear => true,
            HitImpulseKind::Radial { radius, .. } => radius.is_finite() && *radius > 0.,
        }
    }
}

/// An impact on a single bone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HitEvent {
    pub bone: BoneId,
    pub world_location: Vec3,
    pub impulse: Vec3,
    #[serde(default)]
    pub kind: HitImpulseKind,
    pub tag: HitReactTag,
}

impl HitEvent {
    pub fn new(bone: impl Into<BoneId>, impulse: Vec3, tag: impl Into<HitReactTag>) -> Self {
        Self {
            bone: bone.into(),
            world_location: Vec3::ZERO,
            impulse,
            kind: HitImpulseKind::Linear,
            tag: tag.into(),
        }
    }

    pub fn at(mut self, world_location: Vec3) -> Self {
        self.world_location = world_location;
        self
    }

    /// Turns the hit into a radial impulse centered on its world location.
    pub fn radial(mut self, radius: f32, falloff: RadialFalloff) -> Self {
        self.kind = HitImpulseKind::Radial { radius, falloff };
        self
    }
}

/// Where hit events come from.
///
/// A component drains its source once per update, in arrival order, see
/// [`HitReactComponent::pump`](crate::component::HitReactComponent::pump).
pub trait HitEventSource {
    /// Hands every pending event to `sink`, oldest first.
    fn drain(&mut self, sink: &mut dyn FnMut(HitEvent));

    /// A pending request to enable (`true`) or disable (`false`) hit reactions, consumed on read.
    fn take_toggle_request(&mut self) -> Option<bool> {
        None
    }
}

/// Queue fed directly by gameplay code or collision callbacks.
#[derive(Debug, Clone, Default)]
pub struct DirectHitSource {
    queue: VecDeque<HitEvent>,
    toggle_request: Option<bool>,
}

impl DirectHitSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, hit: HitEvent) {
        self.queue.push_back(hit);
    }

    pub fn request_enabled(&mut self, enabled: bool) {
        self.toggle_request = Some(enabled);
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

impl HitEventSource for DirectHitSource {
    fn drain(&mut self, sink: &mut dyn FnMut(HitEvent)) {
        for hit in self.queue.drain(..) {
            sink(hit);
        }
    }

    fn take_toggle_request(&mut self) -> Option<bool> {
        self.toggle_request.take()
    }
}

/// Event emitted by an ability system: an event tag plus the hit it describes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbilityEvent {
    pub event_tag: HitReactTag,
    pub payload: HitEvent,
}

/// Adapts ability-system events and owner tags into hit events and toggle requests.
///
/// Only events whose tag matches the trigger tag become hits. Owner tags decide whether hit
/// reactions are enabled: any disable tag turns them off unless an enable tag is also present.
#[derive(Debug, Clone)]
pub struct AbilityHitBridge {
    trigger_tag: HitReactTag,
    disable_tags: Vec<HitReactTag>,
    enable_tags: Vec<HitReactTag>,
    owner_tags: Vec<HitReactTag>,
    pending: VecDeque<AbilityEvent>,
    enabled: bool,
    toggle_request: Option<bool>,
}

impl AbilityHitBridge {
    pub fn new(trigger_tag: impl Into<HitReactTag>) -> Self {
        Self {
            trigger_tag: trigger_tag.into(),
            disable_tags: Vec::new(),
            enable_tags: Vec::new(),
            owner_tags: Vec::new(),
            pending: VecDeque::new(),
            enabled: true,
            toggle_request: None,
        }
    }

    pub fn with_disable_tags(mut self, tags: impl IntoIterator<Item = HitReactTag>) -> Self {
        self.disable_tags = tags.into_iter().collect();
        self.reevaluate();
        self
    }

    pub fn with_enable_tags(mut self, tags: impl IntoIterator<Item = HitReactTag>) -> Self {
        self.enable_tags = tags.into_iter().collect();
        self.reevaluate();
        self
    }

    pub fn trigger_tag(&self) -> &HitReactTag {
        &self.trigger_tag
    }

    pub fn handle_event(&mut self, event: AbilityEvent) {
        if event.event_tag.matches(&self.trigger_tag) {
            self.pending.push_back(event);
        } else {
            debug!(
                "Ignoring ability event {:?}, it does not match trigger {:?}",
                event.event_tag, self.trigger_tag
            );
        }
    }

    pub fn add_owner_tag(&mut self, tag: impl Into<HitReactTag>) {
        let tag = tag.into();
        if !self.owner_tags.contains(&tag) {
            self.owner_tags.push(tag);
            self.reevaluate();
        }
    }

    pub fn remove_owner_tag(&mut self, tag: &HitReactTag) {
        let before = self.owner_tags.len();
        self.owner_tags.retain(|owned| owned != tag);
        if self.owner_tags.len() != before {
            self.reevaluate();
        }
    }

    fn owner_has_any(&self, tags: &[HitReactTag]) -> bool {
        self.owner_tags
            .iter()
            .any(|owned| tags.iter().any(|tag| owned.matches(tag)))
    }

    fn reevaluate(&mut self) {
        let enabled =
            self.owner_has_any(&self.enable_tags) || !self.owner_has_any(&self.disable_tags);
        if enabled != self.enabled {
            self.enabled = enabled;
            self.toggle_request = Some(enabled);
        }
    }
}

impl HitEventSource for AbilityHitBridge {
    fn drain(&mut self, sink: &mut dyn FnMut(HitEvent)) {
        for event in self.pending.drain(..) {
            sink(event.payload);
        }
    }

    fn take_toggle_request(&mut self) -> Option<bool> {
        self.toggle_request.take()
    }
}

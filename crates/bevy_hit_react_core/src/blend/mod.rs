pub mod toggle;

use std::sync::Arc;

use bevy::{
    log::error,
    math::Vec3,
    transform::components::Transform,
};
use indexmap::IndexMap;

use crate::{
    errors::HitReactWarning,
    id::BoneId,
    profile::BoneProfile,
    settings::{BoneLimits, HitReactSettings, MaxHandling},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BlendPhase {
    /// Bone follows animation only
    #[default]
    Idle,
    /// Weight moving up toward its target
    Rising,
    /// Weight held at its target for the profile's hold time
    Holding,
    /// Weight decaying exponentially toward zero
    Decaying,
}

/// Physical blend state of a single bone.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BoneBlendState {
    phase: BlendPhase,
    current_weight: f32,
    target_weight: f32,
    target_impulse: Vec3,
    last_hit_timestamp: Option<f64>,
    physics_transform: Transform,
    profile: Option<Arc<BoneProfile>>,
    hold_remaining: f32,
    activation: u64,
    hit_serial: u64,
}

impl BoneBlendState {
    pub fn phase(&self) -> BlendPhase {
        self.phase
    }

    pub fn current_weight(&self) -> f32 {
        self.current_weight
    }

    pub fn target_weight(&self) -> f32 {
        self.target_weight
    }

    pub fn target_impulse(&self) -> Vec3 {
        self.target_impulse
    }

    pub fn last_hit_timestamp(&self) -> Option<f64> {
        self.last_hit_timestamp
    }

    pub fn physics_transform(&self) -> &Transform {
        &self.physics_transform
    }

    pub fn profile(&self) -> Option<&Arc<BoneProfile>> {
        self.profile.as_ref()
    }

    pub fn is_active(&self) -> bool {
        self.phase != BlendPhase::Idle
    }

    /// Whether an impulse arriving at `now` falls inside the cooldown window of `profile`.
    pub fn is_blocked(&self, profile: &BoneProfile, now: f64) -> bool {
        self.last_hit_timestamp
            .is_some_and(|last| now - last < profile.cooldown as f64)
    }

    fn go_idle(&mut self) {
        self.phase = BlendPhase::Idle;
        self.current_weight = 0.;
        self.target_weight = 0.;
        self.target_impulse = Vec3::ZERO;
        self.hold_remaining = 0.;
        self.profile = None;
    }

    fn finish_rise(&mut self, hold_time: f32) {
        self.current_weight = self.target_weight;
        if hold_time > 0. && self.hold_remaining > 0. {
            self.phase = BlendPhase::Holding;
        } else {
            self.start_decay();
        }
    }

    fn start_decay(&mut self) {
        self.phase = BlendPhase::Decaying;
        self.target_weight = 0.;
        self.hold_remaining = 0.;
    }

    /// Advances the state by `dt` seconds. Time left over once a phase completes flows into
    /// the next one.
    fn advance(&mut self, dt: f32, epsilon: f32) {
        let mut remaining = dt;
        loop {
            let Some(profile) = self.profile.clone() else {
                self.go_idle();
                return;
            };
            match self.phase {
                BlendPhase::Idle => return,
                BlendPhase::Rising => {
                    let gap = self.target_weight - self.current_weight;
                    if gap <= 0. || profile.rise_time <= 0. {
                        self.finish_rise(profile.hold_time);
                        continue;
                    }
                    let rate = profile.max_weight / profile.rise_time;
                    let needed = gap / rate;
                    if remaining >= needed {
                        remaining -= needed;
                        self.finish_rise(profile.hold_time);
                    } else {
                        self.current_weight += rate * remaining;
                        return;
                    }
                }
                BlendPhase::Holding => {
                    if remaining >= self.hold_remaining {
                        remaining -= self.hold_remaining;
                        self.start_decay();
                    } else {
                        self.hold_remaining -= remaining;
                        return;
                    }
                }
                BlendPhase::Decaying => {
                    self.current_weight *= (-profile.decay_rate * remaining).exp();
                    if self.current_weight <= epsilon {
                        self.go_idle();
                    }
                    return;
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ImpulseResult {
    /// The bone now rises toward `target`
    Accepted { target: f32 },
    /// The bone was within its cooldown window; a scaled-down impulse was applied
    Attenuated { target: f32 },
    Suppressed(SuppressReason),
}

impl ImpulseResult {
    pub fn is_applied(&self) -> bool {
        !matches!(self, ImpulseResult::Suppressed(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SuppressReason {
    UnknownBone,
    Cooldown,
    BoneLimit,
    Negligible,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ControllerParams {
    pub epsilon: f32,
    pub blocked_impulse_scale: f32,
    pub bone_limits: BoneLimits,
}

impl From<&HitReactSettings> for ControllerParams {
    fn from(settings: &HitReactSettings) -> Self {
        Self {
            epsilon: settings.epsilon,
            blocked_impulse_scale: settings.blocked_impulse_scale,
            bone_limits: settings.bone_limits.clone(),
        }
    }
}

/// Integrates impulses into per-bone blend weights and decays them back to zero over time.
#[derive(Debug, Clone)]
pub struct BlendWeightController {
    params: ControllerParams,
    states: IndexMap<BoneId, BoneBlendState>,
    next_activation: u64,
    /// Serial of the hit currently being applied, zero otherwise
    hit_serial: u64,
    last_hit_serial: u64,
    warnings: Vec<HitReactWarning>,
}

impl BlendWeightController {
    pub fn new(params: ControllerParams) -> Self {
        Self {
            params,
            states: IndexMap::new(),
            next_activation: 0,
            hit_serial: 0,
            last_hit_serial: 0,
            warnings: Vec::new(),
        }
    }

    /// Creates an idle state for each bone, replacing any previous ones.
    pub fn populate(&mut self, bones: impl IntoIterator<Item = BoneId>) {
        self.states = bones
            .into_iter()
            .map(|bone| (bone, BoneBlendState::default()))
            .collect();
        self.next_activation = 0;
    }

    pub fn clear(&mut self) {
        self.states.clear();
        self.warnings.clear();
    }

    pub fn contains(&self, bone: &BoneId) -> bool {
        self.states.contains_key(bone)
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn state(&self, bone: &BoneId) -> Option<&BoneBlendState> {
        self.states.get(bone)
    }

    /// Current weight of `bone`, zero for bones that are not simulated.
    pub fn weight(&self, bone: &BoneId) -> f32 {
        self.states
            .get(bone)
            .map(|state| state.current_weight)
            .unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&BoneId, &BoneBlendState)> {
        self.states.iter()
    }

    pub fn iter_active(&self) -> impl Iterator<Item = (&BoneId, &BoneBlendState)> {
        self.states.iter().filter(|(_, state)| state.is_active())
    }

    pub fn active_count(&self) -> usize {
        self.iter_active().count()
    }

    pub fn set_physics_transform(&mut self, bone: &BoneId, transform: Transform) -> bool {
        match self.states.get_mut(bone) {
            Some(state) => {
                state.physics_transform = transform;
                true
            }
            None => false,
        }
    }

    pub fn apply_impulse(
        &mut self,
        bone: &BoneId,
        impulse: Vec3,
        profile: &Arc<BoneProfile>,
        now: f64,
    ) -> ImpulseResult {
        let impulse = if impulse.is_finite() {
            impulse
        } else {
            Vec3::ZERO
        };
        let Some(state) = self.states.get(bone) else {
            return ImpulseResult::Suppressed(SuppressReason::UnknownBone);
        };

        let since_last = state.last_hit_timestamp.map(|last| now - last);
        let blocked = state.is_blocked(profile, now);
        let mut magnitude = impulse.length() * profile.subsequent_scalar(since_last);
        if blocked {
            magnitude *= self.params.blocked_impulse_scale;
        }
        if !magnitude.is_finite() || magnitude <= self.params.epsilon {
            return ImpulseResult::Suppressed(if blocked {
                SuppressReason::Cooldown
            } else {
                SuppressReason::Negligible
            });
        }

        let activating = !state.is_active();
        if activating && !self.make_room() {
            return ImpulseResult::Suppressed(SuppressReason::BoneLimit);
        }
        let activation = self.next_activation;
        let Some(state) = self.states.get_mut(bone) else {
            return ImpulseResult::Suppressed(SuppressReason::UnknownBone);
        };

        if activating {
            state.activation = activation;
            self.next_activation += 1;
        }
        state.current_weight = state.current_weight.min(profile.max_weight);
        let candidate = (state.current_weight + magnitude).min(profile.max_weight);
        state.target_weight = state.target_weight.max(candidate).min(profile.max_weight);
        state.phase = BlendPhase::Rising;
        state.hold_remaining = profile.hold_time;
        state.target_impulse = impulse;
        state.profile = Some(profile.clone());
        state.hit_serial = self.hit_serial;

        let target = state.target_weight;
        if blocked {
            ImpulseResult::Attenuated { target }
        } else {
            state.last_hit_timestamp = Some(now);
            ImpulseResult::Accepted { target }
        }
    }

    /// Applies every impulse of a single hit, strongest first, and returns how many bones
    /// changed. Bones already driven by this hit are never evicted to make room for its weaker
    /// impulses.
    pub fn apply_hit<'a>(
        &mut self,
        impulses: impl IntoIterator<Item = (&'a BoneId, Vec3, &'a Arc<BoneProfile>)>,
        now: f64,
    ) -> usize {
        let mut impulses: Vec<_> = impulses.into_iter().collect();
        impulses.sort_by(|a, b| b.1.length().total_cmp(&a.1.length()));

        self.last_hit_serial += 1;
        self.hit_serial = self.last_hit_serial;
        let applied = impulses
            .into_iter()
            .filter(|(bone, impulse, profile)| {
                self.apply_impulse(bone, *impulse, profile, now)
                    .is_applied()
            })
            .count();
        self.hit_serial = 0;
        applied
    }

    /// Frees a simulation slot if the bone limit allows it. Returns `false` when a new bone may
    /// not start simulating.
    fn make_room(&mut self) -> bool {
        let Some(max) = self.params.bone_limits.max_active_bones else {
            return true;
        };
        if self.active_count() < max {
            return true;
        }
        match self.params.bone_limits.handling {
            MaxHandling::PreventNewest => false,
            MaxHandling::RemoveOldest => {
                let current_hit = self.hit_serial;
                let oldest = self
                    .states
                    .values_mut()
                    .filter(|state| {
                        state.is_active() && (current_hit == 0 || state.hit_serial != current_hit)
                    })
                    .min_by_key(|state| state.activation);
                match oldest {
                    Some(state) => {
                        state.go_idle();
                        true
                    }
                    None => false,
                }
            }
        }
    }

    pub fn tick(&mut self, dt: f32) {
        let dt = if dt.is_finite() { dt.max(0.) } else { 0. };
        let epsilon = self.params.epsilon;
        for (bone, state) in self.states.iter_mut() {
            state.advance(dt, epsilon);
            if let Some(warning) = guard_weight(bone, state) {
                error!("{warning}");
                self.warnings.push(warning);
            }
        }
    }

    /// Every bone back to idle with zero weight. Cooldown history is forgotten as well.
    pub fn reset(&mut self) {
        for state in self.states.values_mut() {
            state.go_idle();
            state.last_hit_timestamp = None;
        }
        self.next_activation = 0;
    }

    /// Warnings raised since the last call, oldest first.
    pub fn drain_warnings(&mut self) -> std::vec::Drain<'_, HitReactWarning> {
        self.warnings.drain(..)
    }
}

/// Clamps a weight that left `[0, max_weight]` or stopped being finite.
pub(crate) fn guard_weight(bone: &BoneId, state: &mut BoneBlendState) -> Option<HitReactWarning> {
    let max_weight = state
        .profile
        .as_ref()
        .map(|profile| profile.max_weight)
        .unwrap_or(0.);
    let value = state.current_weight;
    if value.is_finite() && (0. ..=max_weight).contains(&value) {
        return None;
    }
    state.current_weight = if value.is_finite() {
        value.clamp(0., max_weight)
    } else {
        0.
    };
    Some(HitReactWarning::Divergence {
        bone: bone.clone(),
        value,
    })
}

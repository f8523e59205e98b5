use std::{collections::VecDeque, sync::Arc};

use bevy::math::Vec3;
use indexmap::IndexMap;

use crate::{
    hierarchy::BoneHierarchy, id::BoneId, profile::BoneProfile, registry::ProfileSet,
};

/// Impulse that reached a bone after attenuation.
#[derive(Debug, Clone, PartialEq)]
pub struct PropagatedImpulse {
    pub bone: BoneId,
    pub impulse: Vec3,
    /// Hierarchy distance from the hit bone
    pub distance: f32,
    /// Profile covering the receiving bone
    pub profile: Arc<BoneProfile>,
}

/// Sparse result of a propagation: only bones whose impulse exceeds the threshold, in
/// discovery order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropagatedImpulses {
    entries: Vec<PropagatedImpulse>,
}

impl PropagatedImpulses {
    pub fn iter(&self) -> impl Iterator<Item = &PropagatedImpulse> {
        self.entries.iter()
    }

    pub fn get(&self, bone: &BoneId) -> Option<&PropagatedImpulse> {
        self.entries.iter().find(|entry| &entry.bone == bone)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl IntoIterator for PropagatedImpulses {
    type Item = PropagatedImpulse;
    type IntoIter = std::vec::IntoIter<PropagatedImpulse>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

#[derive(Debug, Clone, Copy)]
struct Reached {
    distance: f32,
    depth: usize,
}

/// Spreads an impulse applied to one bone over its neighbourhood in the bone hierarchy.
///
/// The radius and falloff curve are taken from the profile covering the hit bone. Each reached
/// bone then scales its share by the `impulse_scale` of its own covering profile. Bones without
/// a covering profile still conduct the impulse but receive none.
#[derive(Debug, Clone, Copy)]
pub struct ImpulsePropagator {
    pub impulse_threshold: f32,
    pub max_depth: usize,
}

impl Default for ImpulsePropagator {
    fn default() -> Self {
        Self {
            impulse_threshold: 1e-3,
            max_depth: 32,
        }
    }
}

impl ImpulsePropagator {
    pub fn new(impulse_threshold: f32, max_depth: usize) -> Self {
        Self {
            impulse_threshold,
            max_depth,
        }
    }

    /// Returns `None` when no profile in `profiles` covers the hit bone.
    pub fn propagate(
        &self,
        hierarchy: &BoneHierarchy,
        profiles: &ProfileSet,
        hit_bone: &BoneId,
        impulse: Vec3,
    ) -> Option<PropagatedImpulses> {
        let source = profiles.profile_for(hit_bone, hierarchy)?;
        let impulse = if impulse.is_finite() {
            impulse
        } else {
            Vec3::ZERO
        };
        let direction = impulse.normalize_or_zero();
        let magnitude = impulse.length();

        let reached = self.reach(hierarchy, hit_bone, source.radius);

        let entries = reached
            .into_iter()
            .filter_map(|(bone, reached)| {
                let profile = profiles.profile_for(&bone, hierarchy)?;
                let strength =
                    magnitude * source.falloff_at(reached.distance) * profile.impulse_scale;
                (strength > self.impulse_threshold).then(|| PropagatedImpulse {
                    impulse: direction * strength,
                    distance: reached.distance,
                    profile: profile.clone(),
                    bone,
                })
            })
            .collect();

        Some(PropagatedImpulses { entries })
    }

    /// Shortest hierarchy distance to every bone within `radius` of `start`.
    ///
    /// Paths are relaxed breadth first; a bone reached again through a shorter path is
    /// revisited. Since falloff curves never increase with distance, the shortest path also
    /// carries the strongest impulse.
    fn reach(
        &self,
        hierarchy: &BoneHierarchy,
        start: &BoneId,
        radius: f32,
    ) -> IndexMap<BoneId, Reached> {
        let mut reached = IndexMap::new();
        if !hierarchy.contains(start) {
            return reached;
        }

        reached.insert(
            start.clone(),
            Reached {
                distance: 0.,
                depth: 0,
            },
        );
        let mut queue = VecDeque::from([start.clone()]);

        while let Some(bone) = queue.pop_front() {
            let Some(&current) = reached.get(&bone) else {
                continue;
            };
            if current.depth >= self.max_depth {
                continue;
            }
            for (neighbor, length) in hierarchy.neighbors(&bone) {
                let distance = current.distance + length;
                if distance > radius {
                    continue;
                }
                let candidate = Reached {
                    distance,
                    depth: current.depth + 1,
                };
                let improves = match reached.get(neighbor) {
                    None => true,
                    Some(existing) => {
                        distance < existing.distance
                            || (distance == existing.distance && candidate.depth < existing.depth)
                    }
                };
                if improves {
                    reached.insert(neighbor.clone(), candidate);
                    queue.push_back(neighbor.clone());
                }
            }
        }

        reached
    }
}

use bevy::math::Vec3;
use indexmap::IndexMap;
use std::fmt::Debug;

use crate::{errors::ConfigurationError, id::BoneId};

#[derive(Debug, Clone)]
struct BoneNode {
    parent: Option<BoneId>,
    children: Vec<BoneId>,
    /// Rest-pose length of the segment connecting this bone to its parent
    length: f32,
    /// Redundant connections to other bones, with their rest-pose lengths
    links: Vec<(BoneId, f32)>,
}

/// Rest-pose skeleton topology used for impulse propagation.
///
/// Distances are measured along the hierarchy as the sum of rest-pose bone lengths, so they do
/// not depend on the current pose. Bones are kept in insertion order, which makes every
/// traversal over the hierarchy deterministic.
#[derive(Default, Clone)]
pub struct BoneHierarchy {
    bones: IndexMap<BoneId, BoneNode>,
}

impl BoneHierarchy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a bone. Parents must be added before their children.
    pub fn add_bone(
        &mut self,
        bone: impl Into<BoneId>,
        parent: Option<BoneId>,
        length: f32,
    ) -> Result<(), ConfigurationError> {
        let bone = bone.into();
        if self.bones.contains_key(&bone) {
            return Err(ConfigurationError::DuplicateBone(bone));
        }
        if !length.is_finite() || length < 0. {
            return Err(ConfigurationError::InvalidBoneLength { bone, length });
        }
        if let Some(parent) = &parent {
            let Some(parent_node) = self.bones.get_mut(parent) else {
                return Err(ConfigurationError::UnknownParent {
                    bone,
                    parent: parent.clone(),
                });
            };
            parent_node.children.push(bone.clone());
        }

        self.bones.insert(
            bone,
            BoneNode {
                parent,
                children: vec![],
                length,
                links: vec![],
            },
        );

        Ok(())
    }

    /// Builds a hierarchy from rest-pose local translations; each bone's length is the length
    /// of its translation relative to the parent.
    pub fn from_rest_translations<I, B>(bones: I) -> Result<Self, ConfigurationError>
    where
        I: IntoIterator<Item = (B, Option<B>, Vec3)>,
        B: Into<BoneId>,
    {
        let mut hierarchy = Self::new();
        for (bone, parent, local_translation) in bones {
            let parent = parent.map(Into::into);
            let length = if parent.is_some() {
                local_translation.length()
            } else {
                0.
            };
            hierarchy.add_bone(bone, parent, length)?;
        }
        Ok(hierarchy)
    }

    /// Adds an extra connection between two existing bones, e.g. when a clavicle is also
    /// authored as connected to the spine. Propagation may reach a bone through several paths.
    pub fn add_link(
        &mut self,
        a: &BoneId,
        b: &BoneId,
        length: f32,
    ) -> Result<(), ConfigurationError> {
        if !length.is_finite() || length < 0. {
            return Err(ConfigurationError::InvalidBoneLength {
                bone: b.clone(),
                length,
            });
        }
        for bone in [a, b] {
            if !self.bones.contains_key(bone) {
                return Err(ConfigurationError::UnknownBone(bone.clone()));
            }
        }
        if let Some(node) = self.bones.get_mut(a) {
            node.links.push((b.clone(), length));
        }
        if let Some(node) = self.bones.get_mut(b) {
            node.links.push((a.clone(), length));
        }
        Ok(())
    }

    pub fn contains(&self, bone: &BoneId) -> bool {
        self.bones.contains_key(bone)
    }

    pub fn len(&self) -> usize {
        self.bones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bones.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BoneId> {
        self.bones.keys()
    }

    pub fn parent(&self, bone: &BoneId) -> Option<&BoneId> {
        self.bones.get(bone)?.parent.as_ref()
    }

    pub fn children(&self, bone: &BoneId) -> &[BoneId] {
        self.bones
            .get(bone)
            .map(|node| node.children.as_slice())
            .unwrap_or_default()
    }

    pub fn length(&self, bone: &BoneId) -> Option<f32> {
        self.bones.get(bone).map(|node| node.length)
    }

    /// The bone itself followed by its parent, grandparent and so on up to the root.
    pub fn ancestors_inclusive<'a>(
        &'a self,
        bone: &BoneId,
    ) -> impl Iterator<Item = &'a BoneId> + use<'a> {
        let start = self.bones.get_key_value(bone).map(|(id, _)| id);
        std::iter::successors(start, move |current| self.parent(current))
    }

    /// All bones directly connected to `bone` together with the rest length of the connecting
    /// segment: parent, children and extra links.
    pub fn neighbors<'a>(
        &'a self,
        bone: &BoneId,
    ) -> impl Iterator<Item = (&'a BoneId, f32)> + use<'a> {
        let node = self.bones.get(bone);

        let parent = node.and_then(|node| node.parent.as_ref().map(|p| (p, node.length)));
        let children = node.into_iter().flat_map(move |node| {
            node.children
                .iter()
                .filter_map(move |child| Some((child, self.length(child)?)))
        });
        let links = node
            .into_iter()
            .flat_map(|node| node.links.iter().map(|(other, length)| (other, *length)));

        parent.into_iter().chain(children).chain(links)
    }

    fn indent(f: &mut std::fmt::Formatter<'_>, level: u32) -> std::fmt::Result {
        if level == 0 {
            return Ok(());
        }
        for _ in 0..(level - 1) {
            write!(f, "┃ ")?;
        }
        write!(f, "┣━")?;
        Ok(())
    }

    fn fmt_level(
        &self,
        f: &mut std::fmt::Formatter<'_>,
        level: u32,
        bone: &BoneId,
    ) -> std::fmt::Result {
        Self::indent(f, level)?;
        writeln!(f, "{:?} ({})", bone, self.length(bone).unwrap_or_default())?;
        for child in self.children(bone) {
            self.fmt_level(f, level + 1, child)?;
        }
        Ok(())
    }
}

impl Debug for BoneHierarchy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Bone hierarchy:")?;
        for (root, _) in self.bones.iter().filter(|(_, node)| node.parent.is_none()) {
            self.fmt_level(f, 0, root)?;
        }
        Ok(())
    }
}

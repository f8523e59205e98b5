use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{
    errors::{DuplicateProfileError, RegistryError},
    hierarchy::BoneHierarchy,
    id::{BoneId, HitReactTag},
    profile::BoneProfile,
};

/// Profiles registered under one tag, in registration order.
#[derive(Debug, Clone, Default)]
pub struct ProfileSet {
    profiles: IndexMap<BoneId, Arc<BoneProfile>>,
}

impl ProfileSet {
    pub fn get(&self, bone: &BoneId) -> Option<&Arc<BoneProfile>> {
        self.profiles.get(bone)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<BoneProfile>> {
        self.profiles.values()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// Profile governing `bone`: the profile authored for the bone itself or, failing that, for
    /// its nearest ancestor whose profile includes descendants.
    pub fn profile_for(
        &self,
        bone: &BoneId,
        hierarchy: &BoneHierarchy,
    ) -> Option<&Arc<BoneProfile>> {
        hierarchy
            .ancestors_inclusive(bone)
            .filter_map(|ancestor| Some((ancestor, self.profiles.get(ancestor)?)))
            .find(|(ancestor, profile)| *ancestor == bone || profile.include_descendants)
            .map(|(_, profile)| profile)
    }
}

/// Serialized shape of a profile library, as found in `*.hitreact.ron` files.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileLibrarySerial {
    #[serde(default)]
    pub profiles: Vec<BoneProfile>,
}

/// Maps gameplay tags to the set of bone profiles authored for them.
///
/// Populated once at load time and then shared read-only, typically as an
/// `Arc<ProfileRegistry>`.
#[derive(Debug, Clone, Default)]
pub struct ProfileRegistry {
    sets: IndexMap<HitReactTag, ProfileSet>,
    empty: ProfileSet,
}

impl ProfileRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates and stores `profile` under `tag`. The profile's own tag is overwritten.
    pub fn register(
        &mut self,
        tag: impl Into<HitReactTag>,
        mut profile: BoneProfile,
    ) -> Result<(), RegistryError> {
        let tag = tag.into();
        profile.validate()?;
        let set = self.sets.entry(tag.clone()).or_default();
        if set.profiles.contains_key(&profile.bone) {
            return Err(DuplicateProfileError {
                tag,
                bone: profile.bone,
            }
            .into());
        }
        profile.tag = tag;
        set.profiles.insert(profile.bone.clone(), Arc::new(profile));
        Ok(())
    }

    /// Like [`ProfileRegistry::register`], but replaces an existing profile for the same bone.
    /// Returns the replaced profile, if any.
    pub fn register_override(
        &mut self,
        tag: impl Into<HitReactTag>,
        mut profile: BoneProfile,
    ) -> Result<Option<Arc<BoneProfile>>, RegistryError> {
        let tag = tag.into();
        profile.validate()?;
        profile.tag = tag.clone();
        let set = self.sets.entry(tag).or_default();
        Ok(set
            .profiles
            .insert(profile.bone.clone(), Arc::new(profile)))
    }

    /// Profiles registered under exactly `tag`. Unknown tags yield an empty set.
    pub fn lookup(&self, tag: &HitReactTag) -> &ProfileSet {
        self.sets.get(tag).unwrap_or(&self.empty)
    }

    /// Profiles for `tag` or its closest parent tag that has any.
    pub fn resolve(&self, tag: &HitReactTag) -> &ProfileSet {
        let mut current = Some(tag.clone());
        while let Some(tag) = current {
            if let Some(set) = self.sets.get(&tag)
                && !set.is_empty()
            {
                return set;
            }
            current = tag.parent();
        }
        &self.empty
    }

    pub fn tags(&self) -> impl Iterator<Item = &HitReactTag> {
        self.sets.keys()
    }

    pub fn from_serial(serial: ProfileLibrarySerial) -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        for profile in serial.profiles {
            registry.register(profile.tag.clone(), profile)?;
        }
        Ok(registry)
    }

    pub fn from_ron(source: &[u8]) -> Result<Self, RegistryError> {
        let serial: ProfileLibrarySerial = ron::de::from_bytes(source)?;
        Self::from_serial(serial)
    }

    pub fn to_serial(&self) -> ProfileLibrarySerial {
        ProfileLibrarySerial {
            profiles: self
                .sets
                .values()
                .flat_map(|set| set.iter().map(|profile| profile.as_ref().clone()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::errors::ConfigurationError;

    fn hierarchy() -> BoneHierarchy {
        let mut hierarchy = BoneHierarchy::new();
        hierarchy.add_bone("pelvis", None, 0.).unwrap();
        hierarchy.add_bone("spine", Some("pelvis".into()), 0.2).unwrap();
        hierarchy.add_bone("chest", Some("spine".into()), 0.3).unwrap();
        hierarchy.add_bone("neck", Some("chest".into()), 0.2).unwrap();
        hierarchy
    }

    #[test]
    fn test_duplicate_registration_is_rejected() {
        let mut registry = ProfileRegistry::new();
        registry
            .register("HitReact", BoneProfile::new("HitReact", "chest"))
            .unwrap();
        let result = registry.register("HitReact", BoneProfile::new("HitReact", "chest"));
        assert!(matches!(
            result,
            Err(RegistryError::Duplicate(DuplicateProfileError { .. }))
        ));

        let replaced = registry
            .register_override(
                "HitReact",
                BoneProfile {
                    max_weight: 0.9,
                    ..BoneProfile::new("HitReact", "chest")
                },
            )
            .unwrap();
        assert!(replaced.is_some());
        assert_eq!(
            registry
                .lookup(&"HitReact".into())
                .get(&"chest".into())
                .unwrap()
                .max_weight,
            0.9
        );
    }

    #[test]
    fn test_invalid_profile_is_rejected() {
        let mut registry = ProfileRegistry::new();
        let result = registry.register(
            "HitReact",
            BoneProfile {
                max_weight: -0.1,
                ..BoneProfile::new("HitReact", "chest")
            },
        );
        assert!(matches!(
            result,
            Err(RegistryError::Configuration(
                ConfigurationError::MaxWeightOutOfRange { .. }
            ))
        ));
        assert!(registry.lookup(&"HitReact".into()).is_empty());
    }

    #[test]
    fn test_unknown_tag_yields_empty_set() {
        let registry = ProfileRegistry::new();
        assert!(registry.lookup(&"HitReact.Nothing".into()).is_empty());
        assert!(registry.resolve(&"HitReact.Nothing".into()).is_empty());
    }

    #[test]
    fn test_resolve_walks_up_tag_hierarchy() {
        let mut registry = ProfileRegistry::new();
        registry
            .register("HitReact", BoneProfile::new("HitReact", "spine"))
            .unwrap();
        registry
            .register("HitReact.Head", BoneProfile::new("HitReact.Head", "neck"))
            .unwrap();

        let set = registry.resolve(&"HitReact.Torso.Upper".into());
        assert!(set.get(&"spine".into()).is_some());
        let set = registry.resolve(&"HitReact.Head.Left".into());
        assert!(set.get(&"neck".into()).is_some());
        assert!(registry.lookup(&"HitReact.Torso.Upper".into()).is_empty());
    }

    #[test]
    fn test_profile_for_prefers_nearest_covering_ancestor() {
        let hierarchy = hierarchy();
        let mut registry = ProfileRegistry::new();
        registry
            .register("HitReact", BoneProfile::new("HitReact", "pelvis"))
            .unwrap();
        registry
            .register(
                "HitReact",
                BoneProfile {
                    include_descendants: false,
                    ..BoneProfile::new("HitReact", "chest")
                },
            )
            .unwrap();

        let set = registry.lookup(&"HitReact".into());
        let bone_of = |bone: &str| {
            set.profile_for(&bone.into(), &hierarchy)
                .map(|p| p.bone.as_str().to_string())
        };
        assert_eq!(bone_of("spine").as_deref(), Some("pelvis"));
        assert_eq!(bone_of("chest").as_deref(), Some("chest"));
        assert_eq!(bone_of("neck").as_deref(), Some("pelvis"));
        assert_eq!(bone_of("tail"), None);
    }

    #[test]
    fn test_library_from_ron() {
        let source = r#"(
            profiles: [
                (tag: "HitReact", bone: "spine", max_weight: 0.6, radius: 0.4),
                (tag: "HitReact.Head", bone: "neck", falloff: Exponential(sharpness: 2.0)),
            ],
        )"#;
        let registry = ProfileRegistry::from_ron(source.as_bytes()).unwrap();
        assert_eq!(registry.tags().count(), 2);
        assert_eq!(
            registry
                .lookup(&"HitReact".into())
                .get(&"spine".into())
                .unwrap()
                .max_weight,
            0.6
        );
        assert_eq!(registry.to_serial().profiles.len(), 2);

        assert!(matches!(
            ProfileRegistry::from_ron(b"(profiles: [(tag: 3)])"),
            Err(RegistryError::RonSpannedError(_))
        ));
    }
}

use thiserror::Error;

use crate::id::{BoneId, HitReactTag};

/// Authoring data that cannot be used. Reported at load time, never clamped.
#[non_exhaustive]
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigurationError {
    #[error("max weight {value} of the profile for {bone} is outside [0, 1]")]
    MaxWeightOutOfRange { bone: BoneId, value: f32 },
    #[error("decay rate {value} of the profile for {bone} must be positive")]
    DecayRateNotPositive { bone: BoneId, value: f32 },
    #[error("{field} of the profile for {bone} must be finite and non-negative, got {value}")]
    NegativeOrNonFinite {
        bone: BoneId,
        field: &'static str,
        value: f32,
    },
    #[error("falloff curve of the profile for {bone} must be non-increasing with distance")]
    FalloffNotMonotonic { bone: BoneId },
    #[error("bone {0} is already part of the hierarchy")]
    DuplicateBone(BoneId),
    #[error("parent {parent} of bone {bone} is not part of the hierarchy")]
    UnknownParent { bone: BoneId, parent: BoneId },
    #[error("bone {0} is not part of the hierarchy")]
    UnknownBone(BoneId),
    #[error("bone {bone} has invalid rest length {length}")]
    InvalidBoneLength { bone: BoneId, length: f32 },
    #[error("invalid setting {field}: {reason}")]
    InvalidSetting {
        field: &'static str,
        reason: String,
    },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("a profile for {bone} is already registered under {tag}")]
pub struct DuplicateProfileError {
    pub tag: HitReactTag,
    pub bone: BoneId,
}

/// Possible errors produced when populating a [`ProfileRegistry`](crate::registry::ProfileRegistry)
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Duplicate(#[from] DuplicateProfileError),
    #[error("Could not parse RON: {0}")]
    RonSpannedError(#[from] ron::error::SpannedError),
}

/// Non-fatal conditions met while processing hits. The offending event or value is dropped or
/// corrected and simulation continues.
#[derive(Debug, Clone, PartialEq)]
pub enum HitReactWarning {
    /// A hit referenced a bone that the attached skeleton does not have
    UnknownBone { bone: BoneId },
    /// Neither the hit tag, its parents nor the fallback tag have any profile covering the bone
    MissingProfile { tag: HitReactTag, bone: BoneId },
    /// A blend weight left `[0, max_weight]`; it has been clamped back
    Divergence { bone: BoneId, value: f32 },
}

impl std::fmt::Display for HitReactWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HitReactWarning::UnknownBone { bone } => {
                write!(f, "hit on unknown bone {bone} was dropped")
            }
            HitReactWarning::MissingProfile { tag, bone } => {
                write!(f, "no profile under {tag} covers bone {bone}, hit was dropped")
            }
            HitReactWarning::Divergence { bone, value } => {
                write!(f, "blend weight of {bone} diverged to {value} and was clamped")
            }
        }
    }
}

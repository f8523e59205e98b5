use serde::{Deserialize, Serialize};

use crate::{
    blend::toggle::{BlendCurve, BlendParams, ToggleParams},
    errors::ConfigurationError,
    id::{BoneId, HitReactTag},
};

/// What to do when a hit would simulate more bones than allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum MaxHandling {
    /// Return the bone that started simulating first to animation
    #[default]
    RemoveOldest,
    /// Leave the extra bone on pure animation
    PreventNewest,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoneLimits {
    pub max_active_bones: Option<usize>,
    pub handling: MaxHandling,
}

impl Default for BoneLimits {
    fn default() -> Self {
        Self {
            max_active_bones: Some(16),
            handling: MaxHandling::default(),
        }
    }
}

/// Per-component configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HitReactSettings {
    /// Weights at or below this value snap to zero and the bone returns to idle
    pub epsilon: f32,
    /// Propagated impulses at or below this magnitude are discarded
    pub impulse_threshold: f32,
    /// Multiplier for impulses arriving while a bone is within its cooldown window
    pub blocked_impulse_scale: f32,
    /// Minimum time in seconds between two accepted hits on the whole component
    pub global_cooldown: f32,
    pub max_propagation_depth: usize,
    pub bone_limits: BoneLimits,
    /// Bones that are never simulated
    pub blacklisted_bones: Vec<BoneId>,
    /// Tag tried when the hit tag resolves to no profile covering the hit bone
    pub fallback_tag: Option<HitReactTag>,
    pub toggle: ToggleParams,
}

impl Default for HitReactSettings {
    fn default() -> Self {
        Self {
            epsilon: 1e-3,
            impulse_threshold: 1e-3,
            blocked_impulse_scale: 0.,
            global_cooldown: 0.,
            max_propagation_depth: 32,
            bone_limits: BoneLimits::default(),
            blacklisted_bones: vec!["root".into(), "pelvis".into()],
            fallback_tag: None,
            toggle: ToggleParams {
                blend_in: BlendParams::new(0.25, BlendCurve::HermiteCubic),
                blend_out: BlendParams::new(0.25, BlendCurve::HermiteCubic),
            },
        }
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigurationError {
    ConfigurationError::InvalidSetting {
        field,
        reason: reason.into(),
    }
}

fn check_non_negative(field: &'static str, value: f32) -> Result<(), ConfigurationError> {
    if value.is_finite() && value >= 0. {
        Ok(())
    } else {
        Err(invalid(
            field,
            format!("must be finite and non-negative, got {value}"),
        ))
    }
}

impl HitReactSettings {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        check_non_negative("epsilon", self.epsilon)?;
        check_non_negative("impulse_threshold", self.impulse_threshold)?;
        check_non_negative("global_cooldown", self.global_cooldown)?;
        check_non_negative("toggle.blend_in.time", self.toggle.blend_in.time)?;
        check_non_negative("toggle.blend_out.time", self.toggle.blend_out.time)?;
        if !(0. ..=1.).contains(&self.blocked_impulse_scale) {
            return Err(invalid(
                "blocked_impulse_scale",
                format!("must be in [0, 1], got {}", self.blocked_impulse_scale),
            ));
        }
        if self.max_propagation_depth == 0 {
            return Err(invalid("max_propagation_depth", "must be at least 1"));
        }
        if self.bone_limits.max_active_bones == Some(0) {
            return Err(invalid(
                "bone_limits.max_active_bones",
                "use None to disable the limit",
            ));
        }
        Ok(())
    }

    pub fn is_blacklisted(&self, bone: &BoneId) -> bool {
        self.blacklisted_bones.contains(bone)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert_eq!(HitReactSettings::default().validate(), Ok(()));
    }

    #[test]
    fn test_partial_settings_from_ron() {
        let settings: HitReactSettings = ron::from_str(
            r#"(
                global_cooldown: 0.1,
                bone_limits: (max_active_bones: None),
                blacklisted_bones: ["root"],
            )"#,
        )
        .unwrap();
        assert_eq!(settings.global_cooldown, 0.1);
        assert_eq!(settings.bone_limits.max_active_bones, None);
        assert_eq!(settings.bone_limits.handling, MaxHandling::RemoveOldest);
        assert_eq!(settings.epsilon, 1e-3);
        assert!(!settings.is_blacklisted(&"pelvis".into()));
    }

    #[test]
    fn test_invalid_settings() {
        let settings = HitReactSettings {
            blocked_impulse_scale: 2.,
            ..Default::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(ConfigurationError::InvalidSetting {
                field: "blocked_impulse_scale",
                ..
            })
        ));

        let settings = HitReactSettings {
            epsilon: f32::NAN,
            ..Default::default()
        };
        assert!(settings.validate().is_err());
    }
}

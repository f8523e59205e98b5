use serde::{Deserialize, Serialize};

use crate::{
    errors::ConfigurationError,
    id::{BoneId, HitReactTag},
};

/// Attenuation of a propagated impulse as a function of normalised hierarchy distance
/// (`distance / radius`, in `[0, 1]`). Every curve must be non-increasing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub enum FalloffCurve {
    #[default]
    Linear,
    Constant,
    Exponential {
        sharpness: f32,
    },
    /// Authored curve as `(normalised distance, factor)` keys, linearly interpolated and held
    /// constant past the first and last key.
    Keyed(Vec<(f32, f32)>),
}

impl FalloffCurve {
    pub fn evaluate(&self, t: f32) -> f32 {
        let t = t.clamp(0., 1.);
        match self {
            FalloffCurve::Linear => 1. - t,
            FalloffCurve::Constant => 1.,
            FalloffCurve::Exponential { sharpness } => (-sharpness * t).exp(),
            FalloffCurve::Keyed(keys) => Self::sample_keys(keys, t),
        }
    }

    fn sample_keys(keys: &[(f32, f32)], t: f32) -> f32 {
        let Some(&(first_t, first_v)) = keys.first() else {
            return 1.;
        };
        if t <= first_t {
            return first_v;
        }
        for window in keys.windows(2) {
            let (t0, v0) = window[0];
            let (t1, v1) = window[1];
            if t <= t1 {
                let span = t1 - t0;
                if span <= f32::EPSILON {
                    return v1;
                }
                return v0 + (v1 - v0) * ((t - t0) / span);
            }
        }
        keys.last().map(|(_, v)| *v).unwrap_or(first_v)
    }

    pub fn validate(&self, bone: &BoneId) -> Result<(), ConfigurationError> {
        match self {
            FalloffCurve::Linear | FalloffCurve::Constant => Ok(()),
            FalloffCurve::Exponential { sharpness } => {
                non_negative(bone, "falloff sharpness", *sharpness)
            }
            FalloffCurve::Keyed(keys) => {
                for &(t, v) in keys {
                    non_negative(bone, "falloff key time", t)?;
                    non_negative(bone, "falloff key value", v)?;
                }
                let monotonic = keys
                    .windows(2)
                    .all(|w| w[0].0 <= w[1].0 && w[0].1 >= w[1].1);
                if monotonic {
                    Ok(())
                } else {
                    Err(ConfigurationError::FalloffNotMonotonic { bone: bone.clone() })
                }
            }
        }
    }
}

/// Scales hits that land shortly after the previous accepted hit on the same bone.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SubsequentImpulse {
    /// Applies when the previous hit was less than this many seconds ago
    pub elapsed: f32,
    pub scalar: f32,
}

/// Authored hit reaction parameters for one bone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoneProfile {
    pub tag: HitReactTag,
    pub bone: BoneId,
    #[serde(default = "default_max_weight")]
    pub max_weight: f32,
    #[serde(default = "default_decay_rate")]
    pub decay_rate: f32,
    #[serde(default = "default_impulse_scale")]
    pub impulse_scale: f32,
    #[serde(default)]
    pub radius: f32,
    #[serde(default)]
    pub falloff: FalloffCurve,
    #[serde(default)]
    pub cooldown: f32,
    #[serde(default)]
    pub rise_time: f32,
    #[serde(default)]
    pub hold_time: f32,
    #[serde(default)]
    pub subsequent_impulse_scalars: Vec<SubsequentImpulse>,
    #[serde(default = "default_include_descendants")]
    pub include_descendants: bool,
}

fn default_max_weight() -> f32 {
    0.4
}

fn default_decay_rate() -> f32 {
    4.
}

fn default_impulse_scale() -> f32 {
    1.
}

fn default_include_descendants() -> bool {
    true
}

fn non_negative(bone: &BoneId, field: &'static str, value: f32) -> Result<(), ConfigurationError> {
    if value.is_finite() && value >= 0. {
        Ok(())
    } else {
        Err(ConfigurationError::NegativeOrNonFinite {
            bone: bone.clone(),
            field,
            value,
        })
    }
}

impl BoneProfile {
    pub fn new(tag: impl Into<HitReactTag>, bone: impl Into<BoneId>) -> Self {
        Self {
            tag: tag.into(),
            bone: bone.into(),
            max_weight: default_max_weight(),
            decay_rate: default_decay_rate(),
            impulse_scale: default_impulse_scale(),
            radius: 0.,
            falloff: FalloffCurve::default(),
            cooldown: 0.,
            rise_time: 0.,
            hold_time: 0.,
            subsequent_impulse_scalars: Vec::new(),
            include_descendants: default_include_descendants(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let bone = &self.bone;
        if !(0. ..=1.).contains(&self.max_weight) {
            return Err(ConfigurationError::MaxWeightOutOfRange {
                bone: bone.clone(),
                value: self.max_weight,
            });
        }
        if !self.decay_rate.is_finite() || self.decay_rate <= 0. {
            return Err(ConfigurationError::DecayRateNotPositive {
                bone: bone.clone(),
                value: self.decay_rate,
            });
        }
        non_negative(bone, "impulse_scale", self.impulse_scale)?;
        non_negative(bone, "radius", self.radius)?;
        non_negative(bone, "cooldown", self.cooldown)?;
        non_negative(bone, "rise_time", self.rise_time)?;
        non_negative(bone, "hold_time", self.hold_time)?;
        for scalar in &self.subsequent_impulse_scalars {
            non_negative(bone, "subsequent impulse elapsed", scalar.elapsed)?;
            non_negative(bone, "subsequent impulse scalar", scalar.scalar)?;
        }
        self.falloff.validate(bone)
    }

    /// Falloff factor at the given hierarchy distance from the hit bone, zero past the radius.
    pub fn falloff_at(&self, distance: f32) -> f32 {
        if distance <= 0. {
            return self.falloff.evaluate(0.);
        }
        if distance > self.radius || self.radius <= 0. {
            return 0.;
        }
        self.falloff.evaluate(distance / self.radius)
    }

    /// Scalar applied to a hit arriving `since_last` seconds after the previous accepted hit.
    pub fn subsequent_scalar(&self, since_last: Option<f64>) -> f32 {
        let Some(since_last) = since_last else {
            return 1.;
        };
        self.subsequent_impulse_scalars
            .iter()
            .find(|entry| since_last < entry.elapsed as f64)
            .map(|entry| entry.scalar)
            .unwrap_or(1.)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_linear_falloff_reaches_zero_at_radius() {
        let profile = BoneProfile {
            radius: 2.,
            ..BoneProfile::new("HitReact", "chest")
        };
        assert_eq!(profile.falloff_at(0.), 1.);
        assert_eq!(profile.falloff_at(1.), 0.5);
        assert_eq!(profile.falloff_at(2.), 0.);
        assert_eq!(profile.falloff_at(2.5), 0.);
    }

    #[test]
    fn test_keyed_falloff_interpolates() {
        let curve = FalloffCurve::Keyed(vec![(0., 1.), (0.5, 0.8), (1., 0.)]);
        assert!((curve.evaluate(0.25) - 0.9).abs() < 1e-6);
        assert!((curve.evaluate(0.75) - 0.4).abs() < 1e-6);
        assert!(curve.validate(&"chest".into()).is_ok());

        let rising = FalloffCurve::Keyed(vec![(0., 0.5), (1., 1.)]);
        assert_eq!(
            rising.validate(&"chest".into()),
            Err(ConfigurationError::FalloffNotMonotonic {
                bone: "chest".into()
            })
        );
    }

    #[test]
    fn test_validation_rejects_instead_of_clamping() {
        let profile = BoneProfile {
            max_weight: 1.5,
            ..BoneProfile::new("HitReact", "chest")
        };
        assert!(matches!(
            profile.validate(),
            Err(ConfigurationError::MaxWeightOutOfRange { .. })
        ));

        let profile = BoneProfile {
            decay_rate: 0.,
            ..BoneProfile::new("HitReact", "chest")
        };
        assert!(matches!(
            profile.validate(),
            Err(ConfigurationError::DecayRateNotPositive { .. })
        ));

        let profile = BoneProfile {
            impulse_scale: f32::INFINITY,
            ..BoneProfile::new("HitReact", "chest")
        };
        assert!(matches!(
            profile.validate(),
            Err(ConfigurationError::NegativeOrNonFinite {
                field: "impulse_scale",
                ..
            })
        ));
    }

    #[test]
    fn test_subsequent_scalar_picks_first_matching_entry() {
        let profile = BoneProfile {
            subsequent_impulse_scalars: vec![
                SubsequentImpulse {
                    elapsed: 0.1,
                    scalar: 0.25,
                },
                SubsequentImpulse {
                    elapsed: 0.5,
                    scalar: 0.5,
                },
            ],
            ..BoneProfile::new("HitReact", "chest")
        };
        assert_eq!(profile.subsequent_scalar(None), 1.);
        assert_eq!(profile.subsequent_scalar(Some(0.05)), 0.25);
        assert_eq!(profile.subsequent_scalar(Some(0.3)), 0.5);
        assert_eq!(profile.subsequent_scalar(Some(1.0)), 1.);
    }

    #[test]
    fn test_profile_defaults_from_ron() {
        let profile: BoneProfile =
            ron::from_str(r#"(tag: "HitReact.Torso", bone: "spine_01", radius: 0.5)"#).unwrap();
        assert_eq!(profile.max_weight, 0.4);
        assert_eq!(profile.radius, 0.5);
        assert_eq!(profile.falloff, FalloffCurve::Linear);
        assert!(profile.include_descendants);
    }
}

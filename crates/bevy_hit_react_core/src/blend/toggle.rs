use std::f32::consts::PI;

use serde::{Deserialize, Serialize};

/// Easing applied to blend progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum BlendCurve {
    Linear,
    #[default]
    HermiteCubic,
    Sinusoidal,
}

impl BlendCurve {
    pub fn ease(&self, t: f32) -> f32 {
        let t = t.clamp(0., 1.);
        match self {
            BlendCurve::Linear => t,
            BlendCurve::HermiteCubic => t * t * (3. - 2. * t),
            BlendCurve::Sinusoidal => 0.5 - 0.5 * (PI * t).cos(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BlendParams {
    pub time: f32,
    pub curve: BlendCurve,
}

impl BlendParams {
    pub fn new(time: f32, curve: BlendCurve) -> Self {
        Self { time, curve }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ToggleParams {
    pub blend_in: BlendParams,
    pub blend_out: BlendParams,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToggleState {
    Disabled,
    Disabling,
    Enabling,
    Enabled,
}

impl ToggleState {
    /// Whether the toggle is enabled or on its way there.
    pub fn targets_enabled(&self) -> bool {
        matches!(self, ToggleState::Enabled | ToggleState::Enabling)
    }
}

/// Component-wide master blend. Published weights are multiplied by [`GlobalToggle::alpha`].
#[derive(Debug, Clone)]
pub struct GlobalToggle {
    params: ToggleParams,
    state: ToggleState,
    alpha: f32,
    /// Alpha when the current transition started
    from: f32,
    elapsed: f32,
}

impl GlobalToggle {
    pub fn new(params: ToggleParams) -> Self {
        Self {
            params,
            state: ToggleState::Enabled,
            alpha: 1.,
            from: 1.,
            elapsed: 0.,
        }
    }

    pub fn state(&self) -> ToggleState {
        self.state
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    /// Starts a transition toward `enabled`. Returns `true` if the toggle became
    /// [`ToggleState::Disabled`] right away.
    pub fn set_enabled(&mut self, enabled: bool, interpolate: bool) -> bool {
        if enabled == self.state.targets_enabled() {
            return false;
        }
        let params = if enabled {
            self.params.blend_in
        } else {
            self.params.blend_out
        };
        if !interpolate || params.time <= 0. {
            self.finish(enabled);
            return !enabled;
        }
        self.state = if enabled {
            ToggleState::Enabling
        } else {
            ToggleState::Disabling
        };
        self.from = self.alpha;
        self.elapsed = 0.;
        false
    }

    fn finish(&mut self, enabled: bool) {
        if enabled {
            self.state = ToggleState::Enabled;
            self.alpha = 1.;
        } else {
            self.state = ToggleState::Disabled;
            self.alpha = 0.;
        }
        self.from = self.alpha;
        self.elapsed = 0.;
    }

    /// Advances a running transition. Returns `true` on the tick the toggle becomes
    /// [`ToggleState::Disabled`].
    pub fn tick(&mut self, dt: f32) -> bool {
        let (params, enabling) = match self.state {
            ToggleState::Enabling => (self.params.blend_in, true),
            ToggleState::Disabling => (self.params.blend_out, false),
            ToggleState::Enabled | ToggleState::Disabled => return false,
        };

        self.elapsed += dt.max(0.);
        let progress = if params.time > 0. {
            self.elapsed / params.time
        } else {
            1.
        };
        if progress >= 1. {
            self.finish(enabling);
            return !enabling;
        }

        let eased = params.curve.ease(progress);
        self.alpha = if enabling {
            self.from + (1. - self.from) * eased
        } else {
            self.from * (1. - eased)
        };
        false
    }
}

use bevy::{
    app::{App, Plugin, Update},
    asset::AssetApp,
    ecs::{
        intern::Interned,
        schedule::{IntoScheduleConfigs, ScheduleLabel, SystemSet},
    },
};
use bevy_hit_react_core::event::{AbilityHitBridge, DirectHitSource};

#[cfg(feature = "physics_avian")]
use crate::physics_avian::sample_physics_poses_avian;
use crate::{
    assets::{HitReactLibrary, install_hit_react_library, loader::HitReactLibraryLoader},
    components::{ApplyHitReact, HitReact, SetHitReactEnabled},
    systems::{attach_hit_reacts, pump_hit_sources, tick_hit_reacts},
};

/// Adds hit reactions to an app
pub struct HitReactPlugin {
    /// Schedule running the per-frame update. Should be the schedule the animation pipeline
    /// reads [`PhysicsBlendWeights`](crate::components::PhysicsBlendWeights) in, or an
    /// earlier one.
    pub schedule: Interned<dyn ScheduleLabel>,
}

impl Default for HitReactPlugin {
    fn default() -> Self {
        Self {
            schedule: Update.intern(),
        }
    }
}

#[derive(Clone, Debug, Copy, PartialEq, Eq, Hash, SystemSet)]
pub enum HitReactSet {
    /// Installs loaded libraries and attaches new hit reactions
    Attach,
    /// Drains hit event sources
    Pump,
    /// Reads the physics pose of simulating bones
    Sample,
    /// Advances blend weights and publishes them
    Tick,
}

impl Plugin for HitReactPlugin {
    fn build(&self, app: &mut App) {
        self.register_assets(app);
        self.register_component_hooks(app);

        app.configure_sets(
            self.schedule,
            (
                HitReactSet::Attach,
                HitReactSet::Pump,
                HitReactSet::Sample,
                HitReactSet::Tick,
            )
                .chain(),
        );

        app.add_systems(
            self.schedule,
            (install_hit_react_library, attach_hit_reacts)
                .chain()
                .in_set(HitReactSet::Attach),
        );

        app.add_systems(
            self.schedule,
            (
                pump_hit_sources::<DirectHitSource>,
                pump_hit_sources::<AbilityHitBridge>,
            )
                .chain()
                .in_set(HitReactSet::Pump),
        );

        #[cfg(feature = "physics_avian")]
        app.add_systems(
            self.schedule,
            sample_physics_poses_avian.in_set(HitReactSet::Sample),
        );

        app.add_systems(self.schedule, tick_hit_reacts.in_set(HitReactSet::Tick));

        app.add_observer(ApplyHitReact::observe);
        app.add_observer(SetHitReactEnabled::observe);
    }
}

impl HitReactPlugin {
    /// Registers asset types and their loaders
    fn register_assets(&self, app: &mut App) {
        app.init_asset::<HitReactLibrary>()
            .init_asset_loader::<HitReactLibraryLoader>();
    }

    fn register_component_hooks(&self, app: &mut App) {
        app.world_mut()
            .register_component_hooks::<HitReact>()
            .on_replace(|mut world, context| {
                if let Some(mut hit_react) = world.get_mut::<HitReact>(context.entity) {
                    hit_react.detach();
                }
            });
    }
}

pub mod loader;

use std::sync::Arc;

use bevy::{
    asset::{Asset, Assets, Handle},
    ecs::{
        resource::Resource,
        system::{Commands, Res},
    },
    log::info,
    reflect::TypePath,
};
use bevy_hit_react_core::registry::ProfileRegistry;

/// Profile library loaded from a `*.hitreact.ron` file.
#[derive(Asset, TypePath, Debug, Clone)]
pub struct HitReactLibrary {
    pub registry: Arc<ProfileRegistry>,
}

/// Registry used by components attached from now on.
///
/// Either insert one built in code, or insert a [`HitReactLibraryHandle`] and the registry is
/// installed once the library finishes loading.
#[derive(Resource, Debug, Clone)]
pub struct HitReactRegistry(pub Arc<ProfileRegistry>);

#[derive(Resource, Debug, Clone)]
pub struct HitReactLibraryHandle(pub Handle<HitReactLibrary>);

/// Installs the library behind [`HitReactLibraryHandle`] as the [`HitReactRegistry`], and again
/// whenever the asset is reloaded. Already attached components keep the registry they were
/// created with.
pub fn install_hit_react_library(
    mut commands: Commands,
    handle: Option<Res<HitReactLibraryHandle>>,
    installed: Option<Res<HitReactRegistry>>,
    libraries: Res<Assets<HitReactLibrary>>,
) {
    let Some(handle) = handle else {
        return;
    };
    let Some(library) = libraries.get(&handle.0) else {
        return;
    };
    if installed.is_some_and(|installed| Arc::ptr_eq(&installed.0, &library.registry)) {
        return;
    }

    info!(
        "Installing hit react library with {} tags",
        library.registry.tags().count()
    );
    commands.insert_resource(HitReactRegistry(library.registry.clone()));
}

use std::sync::Arc;

use bevy::{
    asset::{AssetLoader, LoadContext, io::Reader},
    reflect::TypePath,
};
use bevy_hit_react_core::registry::{ProfileLibrarySerial, ProfileRegistry};

use super::HitReactLibrary;
use crate::errors::AssetLoaderError;

#[derive(Default, TypePath)]
pub struct HitReactLibraryLoader;

impl AssetLoader for HitReactLibraryLoader {
    type Asset = HitReactLibrary;
    type Settings = ();
    type Error = AssetLoaderError;

    async fn load(
        &self,
        reader: &mut dyn Reader,
        _settings: &Self::Settings,
        _load_context: &mut LoadContext<'_>,
    ) -> Result<Self::Asset, Self::Error> {
        let mut bytes = vec![];
        reader.read_to_end(&mut bytes).await?;
        let serial: ProfileLibrarySerial = ron::de::from_bytes(&bytes)?;
        let registry = ProfileRegistry::from_serial(serial)?;

        Ok(HitReactLibrary {
            registry: Arc::new(registry),
        })
    }

    fn extensions(&self) -> &[&str] {
        &["hitreact.ron"]
    }
}

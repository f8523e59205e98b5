use bevy_hit_react_core::errors::RegistryError;
use thiserror::Error;

/// Possible errors that can be produced by the profile library loader
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum AssetLoaderError {
    /// An [IO](std::io) Error
    #[error("Could not load profile library: {0}")]
    Io(#[from] std::io::Error),
    /// A [RON](ron) Error
    #[error("Could not parse RON: {0}")]
    RonSpannedError(#[from] ron::error::SpannedError),
    #[error("Invalid profile library: {0}")]
    Registry(#[from] RegistryError),
}

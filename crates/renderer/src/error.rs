//! Error types for frame rendering.

use prism_resources::ResourceError;
use prism_rhi::RhiError;
use thiserror::Error;

/// Error type for renderer operations.
///
/// Any error returned from a frame aborts that frame.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error(transparent)]
    Rhi(#[from] RhiError),

    #[error(transparent)]
    Resource(#[from] ResourceError),

    /// An entity refers to a model the registry does not hold.
    #[error("Entity '{entity}' refers to unknown model {model}")]
    UnknownModel { entity: String, model: usize },

    /// The offscreen target was used before it was sized.
    #[error("Frame target has not been created")]
    TargetNotReady,
}

/// Result type alias for renderer operations.
pub type RenderResult<T> = Result<T, RenderError>;

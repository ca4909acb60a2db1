// Error - taxonomy shared by the core and the entry point layer
//
// Everything fallible returns [`Result`]; the C boundary converts the error
// into a status code through the single `From<MirvError> for vk::Result`
// mapping below.

use ash::vk;
use thiserror::Error;

use crate::object::ObjectType;

/// Status code for recognised but unsupported features (custom allocators).
pub const ERROR_NOT_IMPLEMENTED: vk::Result = vk::Result::from_raw(-2_000_000_000);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MirvError {
    #[error("invalid request: {0}")]
    Validation(&'static str),
    #[error("requested layer is not present")]
    LayerNotPresent,
    #[error("requested extension is not present")]
    ExtensionNotPresent,
    #[error("requested device feature is not present")]
    FeatureNotPresent,
    #[error("api version {0:#x} is not supported")]
    IncompatibleDriver(u32),
    #[error("handle does not name a live {0:?}")]
    InvalidHandle(ObjectType),
    #[error("out of memory")]
    OutOfMemory,
    #[error("initialization failed: {0}")]
    InitializationFailed(String),
    #[error("{0} is not implemented")]
    NotImplemented(&'static str),
}

pub type Result<T, E = MirvError> = std::result::Result<T, E>;

impl From<MirvError> for vk::Result {
    fn from(err: MirvError) -> Self {
        match err {
            MirvError::Validation(_) | MirvError::InvalidHandle(_) => {
                vk::Result::ERROR_VALIDATION_FAILED_EXT
            }
            MirvError::LayerNotPresent => vk::Result::ERROR_LAYER_NOT_PRESENT,
            MirvError::ExtensionNotPresent => vk::Result::ERROR_EXTENSION_NOT_PRESENT,
            MirvError::FeatureNotPresent => vk::Result::ERROR_FEATURE_NOT_PRESENT,
            MirvError::IncompatibleDriver(_) => vk::Result::ERROR_INCOMPATIBLE_DRIVER,
            MirvError::OutOfMemory => vk::Result::ERROR_OUT_OF_HOST_MEMORY,
            MirvError::InitializationFailed(_) => vk::Result::ERROR_INITIALIZATION_FAILED,
            MirvError::NotImplemented(_) => ERROR_NOT_IMPLEMENTED,
        }
    }
}

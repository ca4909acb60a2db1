// Backend slots that are not realized on this build.

use std::sync::Arc;

use super::InstanceBackend;
use crate::config::BackendConfig;

#[cfg(not(all(windows, feature = "d3d12")))]
pub fn probe_d3d12(_: &BackendConfig) -> Option<Arc<dyn InstanceBackend>> {
    log::debug!("D3D12 backend not compiled in (needs Windows and the `d3d12` feature)");
    None
}

pub fn probe_metal(_: &BackendConfig) -> Option<Arc<dyn InstanceBackend>> {
    None
}

pub fn probe_vulkan(_: &BackendConfig) -> Option<Arc<dyn InstanceBackend>> {
    None
}

// Backend module - native platform abstraction
//
// Each backend discovers adapters on one native driver family and realizes
// devices and queues on them. The core only sees these traits.

#[cfg(all(windows, feature = "d3d12"))]
pub mod d3d12;
pub mod null;
mod stub;

use ash::vk;
use std::fmt;
use std::sync::Arc;

use crate::config::BackendConfig;
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    D3D12,
    Metal,
    Vulkan,
    Null,
}

/// Descriptive data captured once, when an adapter is discovered.
#[derive(Clone)]
pub struct AdapterDesc {
    pub properties: vk::PhysicalDeviceProperties,
    pub queue_families: Vec<vk::QueueFamilyProperties>,
}

/// An adapter that passed the backend's capability probe.
pub struct DiscoveredAdapter {
    pub desc: AdapterDesc,
    pub adapter: Box<dyn Adapter>,
}

/// One native platform backend, probed at most once per instance.
pub trait InstanceBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Adapters usable by this backend. Adapters failing the capability
    /// probe are skipped, not reported.
    fn enumerate_adapters(&self) -> Vec<DiscoveredAdapter>;
}

pub trait Adapter: Send + Sync {
    /// Instantiates the native device object for this adapter.
    fn create_device(&self) -> Result<Box<dyn NativeDevice>>;
}

pub trait NativeDevice: Send + Sync {
    /// Realizes `count` native queues for `family`, in order.
    ///
    /// Out-of-memory must be reported as `MirvError::OutOfMemory`; any other
    /// native failure as `MirvError::InitializationFailed`.
    fn create_queues(
        &self,
        family: &vk::QueueFamilyProperties,
        count: u32,
        priorities: &[f32],
    ) -> Result<Vec<Box<dyn NativeQueue>>>;
}

pub trait NativeQueue: Send + Sync + fmt::Debug {
    fn kind(&self) -> QueueKind;
}

/// Native queue flavour a queue family maps onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueKind {
    Direct,
    Compute,
    Copy,
}

impl QueueKind {
    /// The most capable native queue kind covering `flags`.
    pub fn for_flags(flags: vk::QueueFlags) -> Option<Self> {
        if flags.contains(vk::QueueFlags::GRAPHICS) {
            Some(QueueKind::Direct)
        } else if flags.contains(vk::QueueFlags::COMPUTE) {
            Some(QueueKind::Compute)
        } else if flags.contains(vk::QueueFlags::TRANSFER) {
            Some(QueueKind::Copy)
        } else {
            None
        }
    }

    pub fn queue_flags(self) -> vk::QueueFlags {
        match self {
            QueueKind::Direct => {
                vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER
            }
            QueueKind::Compute => vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER,
            QueueKind::Copy => vk::QueueFlags::TRANSFER,
        }
    }
}

/// Direct, compute and copy families, in that order.
pub fn standard_queue_families(queue_count: u32) -> Vec<vk::QueueFamilyProperties> {
    [QueueKind::Direct, QueueKind::Compute, QueueKind::Copy]
        .into_iter()
        .map(|kind| vk::QueueFamilyProperties {
            queue_flags: kind.queue_flags(),
            queue_count,
            // 0 means timestamps are unsupported
            timestamp_valid_bits: 0,
            min_image_transfer_granularity: vk::Extent3D {
                width: 1,
                height: 1,
                depth: 1,
            },
        })
        .collect()
}

/// Copies `name` into a fixed-size, NUL-terminated device name field.
pub fn write_device_name(dst: &mut [std::ffi::c_char; vk::MAX_PHYSICAL_DEVICE_NAME_SIZE], name: &str) {
    dst.fill(0);
    for (d, b) in dst
        .iter_mut()
        .zip(name.bytes().take(vk::MAX_PHYSICAL_DEVICE_NAME_SIZE - 1))
    {
        *d = b as std::ffi::c_char;
    }
}

type Probe = fn(&BackendConfig) -> Option<Arc<dyn InstanceBackend>>;

const PROBES: [(BackendKind, Probe); 4] = [
    (BackendKind::D3D12, probe_d3d12),
    (BackendKind::Metal, stub::probe_metal),
    (BackendKind::Vulkan, stub::probe_vulkan),
    (BackendKind::Null, null::probe),
];

#[cfg(all(windows, feature = "d3d12"))]
fn probe_d3d12(config: &BackendConfig) -> Option<Arc<dyn InstanceBackend>> {
    d3d12::probe(config)
}

#[cfg(not(all(windows, feature = "d3d12")))]
fn probe_d3d12(config: &BackendConfig) -> Option<Arc<dyn InstanceBackend>> {
    stub::probe_d3d12(config)
}

/// Probes every enabled backend, in order, keeping the ones that came up.
pub fn probe_all(config: &BackendConfig) -> Vec<Arc<dyn InstanceBackend>> {
    PROBES
        .iter()
        .filter(|(kind, _)| config.is_enabled(*kind))
        .filter_map(|(kind, probe)| {
            let backend = probe(config);
            match &backend {
                Some(_) => log::info!("{:?} backend available", kind),
                None => log::debug!("{:?} backend unavailable", kind),
            }
            backend
        })
        .collect()
}

// Null backend - synthetic adapters with no native driver behind them
//
// Mirrors the D3D12 backend's adapter and queue-family layout so the whole
// core can run on any machine. Every knob comes from `[backends.null]`.

use ash::vk;
use parking_lot::Mutex;
use std::sync::Arc;

use super::{
    standard_queue_families, write_device_name, Adapter, AdapterDesc, BackendKind,
    DiscoveredAdapter, InstanceBackend, NativeDevice, NativeQueue, QueueKind,
};
use crate::config::{BackendConfig, NullBackendConfig};
use crate::error::{MirvError, Result};

/// PCI vendor id reported by synthetic adapters.
pub const NULL_VENDOR_ID: u32 = 0x10005;

pub fn probe(config: &BackendConfig) -> Option<Arc<dyn InstanceBackend>> {
    Some(Arc::new(NullBackend {
        config: config.null.clone(),
    }))
}

pub struct NullBackend {
    config: NullBackendConfig,
}

impl InstanceBackend for NullBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Null
    }

    fn enumerate_adapters(&self) -> Vec<DiscoveredAdapter> {
        let total = self.config.adapters + self.config.unsupported_adapters;
        (0..total)
            .filter_map(|index| {
                // Unsupported adapters come last and fail the feature probe.
                if index >= self.config.adapters {
                    log::warn!("Skipping null adapter {}: feature level probe failed", index);
                    return None;
                }
                Some(DiscoveredAdapter {
                    desc: describe(index, &self.config),
                    adapter: Box::new(NullAdapter {
                        config: self.config.clone(),
                    }),
                })
            })
            .collect()
    }
}

fn describe(index: u32, config: &NullBackendConfig) -> AdapterDesc {
    let mut properties = vk::PhysicalDeviceProperties {
        api_version: vk::API_VERSION_1_0,
        driver_version: 1,
        vendor_id: NULL_VENDOR_ID,
        device_id: index,
        device_type: vk::PhysicalDeviceType::CPU,
        ..Default::default()
    };
    write_device_name(&mut properties.device_name, &format!("Null Adapter {}", index));

    AdapterDesc {
        properties,
        queue_families: standard_queue_families(config.queues_per_family),
    }
}

struct NullAdapter {
    config: NullBackendConfig,
}

impl Adapter for NullAdapter {
    fn create_device(&self) -> Result<Box<dyn NativeDevice>> {
        if self.config.fail_device_creation {
            return Err(MirvError::InitializationFailed(
                "null device creation disabled by config".to_string(),
            ));
        }
        Ok(Box::new(NullDevice {
            remaining_budget: Mutex::new(self.config.queue_budget),
        }))
    }
}

struct NullDevice {
    remaining_budget: Mutex<Option<u32>>,
}

impl NativeDevice for NullDevice {
    fn create_queues(
        &self,
        family: &vk::QueueFamilyProperties,
        count: u32,
        _priorities: &[f32],
    ) -> Result<Vec<Box<dyn NativeQueue>>> {
        let kind = QueueKind::for_flags(family.queue_flags).ok_or_else(|| {
            MirvError::InitializationFailed(format!(
                "no native queue kind for {:?}",
                family.queue_flags
            ))
        })?;

        (0..count as usize)
            .map(|_| {
                let mut budget = self.remaining_budget.lock();
                if let Some(remaining) = budget.as_mut() {
                    if *remaining == 0 {
                        return Err(MirvError::OutOfMemory);
                    }
                    *remaining -= 1;
                }
                Ok(Box::new(NullQueue { kind }) as Box<dyn NativeQueue>)
            })
            .collect()
    }
}

#[derive(Debug)]
pub struct NullQueue {
    kind: QueueKind,
}

impl NativeQueue for NullQueue {
    fn kind(&self) -> QueueKind {
        self.kind
    }
}

// D3D12 backend - DXGI adapter discovery, D3D12 devices and command queues
//
// Queue families: direct (graphics|compute|transfer), compute
// (compute|transfer) and copy (transfer), matching the three D3D12 command
// list types one to one.

use ash::vk;
use std::sync::Arc;

use windows::core::ComInterface;
use windows::Win32::Foundation::E_OUTOFMEMORY;
use windows::Win32::Graphics::Direct3D::D3D_FEATURE_LEVEL_12_0;
use windows::Win32::Graphics::Direct3D12::{
    D3D12CreateDevice, ID3D12CommandQueue, ID3D12Device, D3D12_COMMAND_LIST_TYPE,
    D3D12_COMMAND_LIST_TYPE_COMPUTE, D3D12_COMMAND_LIST_TYPE_COPY,
    D3D12_COMMAND_LIST_TYPE_DIRECT, D3D12_COMMAND_QUEUE_DESC, D3D12_COMMAND_QUEUE_FLAG_NONE,
    D3D12_COMMAND_QUEUE_PRIORITY_HIGH, D3D12_COMMAND_QUEUE_PRIORITY_NORMAL,
};
use windows::Win32::Graphics::Dxgi::{
    CreateDXGIFactory1, IDXGIAdapter1, IDXGIDevice, IDXGIFactory1, DXGI_ADAPTER_DESC1,
    DXGI_ADAPTER_FLAG_SOFTWARE,
};

use super::{
    standard_queue_families, write_device_name, Adapter, AdapterDesc, BackendKind,
    DiscoveredAdapter, InstanceBackend, NativeDevice, NativeQueue, QueueKind,
};
use crate::config::BackendConfig;
use crate::error::{MirvError, Result};

/// D3D12 places no per-type limit on command queues.
const QUEUES_PER_FAMILY: u32 = u32::MAX;

/// Wrapper asserting thread-safety for D3D12/DXGI interfaces.
///
/// SAFETY: DXGI factories and adapters, D3D12 devices and command queues are
/// free-threaded objects; their methods may be called from any thread.
#[derive(Debug, Clone)]
struct FreeThreaded<T>(T);

unsafe impl<T> Send for FreeThreaded<T> {}
unsafe impl<T> Sync for FreeThreaded<T> {}

pub fn probe(_: &BackendConfig) -> Option<Arc<dyn InstanceBackend>> {
    match unsafe { CreateDXGIFactory1::<IDXGIFactory1>() } {
        Ok(factory) => Some(Arc::new(D3d12Backend {
            factory: FreeThreaded(factory),
        })),
        Err(e) => {
            log::warn!("CreateDXGIFactory1 failed: {}", e);
            None
        }
    }
}

pub struct D3d12Backend {
    factory: FreeThreaded<IDXGIFactory1>,
}

impl InstanceBackend for D3d12Backend {
    fn kind(&self) -> BackendKind {
        BackendKind::D3D12
    }

    fn enumerate_adapters(&self) -> Vec<DiscoveredAdapter> {
        let mut found = Vec::new();
        for index in 0.. {
            // Fails with DXGI_ERROR_NOT_FOUND past the last adapter.
            let Ok(adapter) = (unsafe { self.factory.0.EnumAdapters1(index) }) else {
                break;
            };

            let supported = unsafe {
                D3D12CreateDevice(
                    &adapter,
                    D3D_FEATURE_LEVEL_12_0,
                    std::ptr::null_mut::<Option<ID3D12Device>>(),
                )
            }
            .is_ok();
            if !supported {
                log::warn!("Skipping DXGI adapter {}: no feature level 12.0", index);
                continue;
            }

            let desc = match unsafe { adapter.GetDesc1() } {
                Ok(desc) => desc,
                Err(e) => {
                    log::warn!("Skipping DXGI adapter {}: GetDesc1 failed: {}", index, e);
                    continue;
                }
            };
            let umd_version = unsafe { adapter.CheckInterfaceSupport(&IDXGIDevice::IID) }.unwrap_or(0);

            found.push(DiscoveredAdapter {
                desc: describe(&desc, umd_version),
                adapter: Box::new(D3d12Adapter {
                    adapter: FreeThreaded(adapter),
                }),
            });
        }
        found
    }
}

fn describe(desc: &DXGI_ADAPTER_DESC1, umd_version: i64) -> AdapterDesc {
    let umd_version = umd_version as u64;
    let (high, low) = ((umd_version >> 32) as u32, umd_version as u32);

    let device_type = if desc.Flags & DXGI_ADAPTER_FLAG_SOFTWARE.0 as u32 != 0 {
        vk::PhysicalDeviceType::CPU
    } else if desc.DedicatedVideoMemory != 0 {
        vk::PhysicalDeviceType::DISCRETE_GPU
    } else {
        vk::PhysicalDeviceType::INTEGRATED_GPU
    };

    let mut properties = vk::PhysicalDeviceProperties {
        api_version: vk::API_VERSION_1_0,
        driver_version: if high != 0 { high } else { low },
        vendor_id: desc.VendorId,
        device_id: desc.DeviceId,
        device_type,
        ..Default::default()
    };
    let len = desc
        .Description
        .iter()
        .position(|&c| c == 0)
        .unwrap_or(desc.Description.len());
    write_device_name(
        &mut properties.device_name,
        &String::from_utf16_lossy(&desc.Description[..len]),
    );

    AdapterDesc {
        properties,
        queue_families: standard_queue_families(QUEUES_PER_FAMILY),
    }
}

struct D3d12Adapter {
    adapter: FreeThreaded<IDXGIAdapter1>,
}

impl Adapter for D3d12Adapter {
    fn create_device(&self) -> Result<Box<dyn NativeDevice>> {
        let mut device: Option<ID3D12Device> = None;
        unsafe { D3D12CreateDevice(&self.adapter.0, D3D_FEATURE_LEVEL_12_0, &mut device) }
            .map_err(|e| MirvError::InitializationFailed(format!("D3D12CreateDevice: {}", e)))?;
        let device = device.ok_or_else(|| {
            MirvError::InitializationFailed("D3D12CreateDevice returned no device".to_string())
        })?;
        Ok(Box::new(D3d12Device {
            device: FreeThreaded(device),
        }))
    }
}

struct D3d12Device {
    device: FreeThreaded<ID3D12Device>,
}

fn list_type(kind: QueueKind) -> D3D12_COMMAND_LIST_TYPE {
    match kind {
        QueueKind::Direct => D3D12_COMMAND_LIST_TYPE_DIRECT,
        QueueKind::Compute => D3D12_COMMAND_LIST_TYPE_COMPUTE,
        QueueKind::Copy => D3D12_COMMAND_LIST_TYPE_COPY,
    }
}

impl NativeDevice for D3d12Device {
    fn create_queues(
        &self,
        family: &vk::QueueFamilyProperties,
        count: u32,
        priorities: &[f32],
    ) -> Result<Vec<Box<dyn NativeQueue>>> {
        let kind = QueueKind::for_flags(family.queue_flags).ok_or_else(|| {
            MirvError::InitializationFailed(format!(
                "no D3D12 command list type for {:?}",
                family.queue_flags
            ))
        })?;

        (0..count as usize)
            .map(|i| {
                let priority = if priorities.get(i).copied().unwrap_or(0.0) > 0.5 {
                    D3D12_COMMAND_QUEUE_PRIORITY_HIGH
                } else {
                    D3D12_COMMAND_QUEUE_PRIORITY_NORMAL
                };
                let desc = D3D12_COMMAND_QUEUE_DESC {
                    Type: list_type(kind),
                    Priority: priority.0,
                    Flags: D3D12_COMMAND_QUEUE_FLAG_NONE,
                    NodeMask: 0,
                };
                let queue = unsafe {
                    self.device
                        .0
                        .CreateCommandQueue::<ID3D12CommandQueue>(&desc)
                }
                .map_err(|e| {
                    if e.code() == E_OUTOFMEMORY {
                        MirvError::OutOfMemory
                    } else {
                        MirvError::InitializationFailed(format!("CreateCommandQueue: {}", e))
                    }
                })?;
                Ok(Box::new(D3d12Queue {
                    kind,
                    _native: FreeThreaded(queue),
                }) as Box<dyn NativeQueue>)
            })
            .collect()
    }
}

#[derive(Debug)]
struct D3d12Queue {
    kind: QueueKind,
    _native: FreeThreaded<ID3D12CommandQueue>,
}

impl NativeQueue for D3d12Queue {
    fn kind(&self) -> QueueKind {
        self.kind
    }
}

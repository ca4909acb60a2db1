// =============================================================================
// MIRV - Vulkan entry points over native platform graphics backends
// =============================================================================
//
// ARCHITECTURE OVERVIEW:
// ┌─────────────────────────────────────────────────────────────────┐
// │  icd (extern "system" vk* functions)                            │
// │    └── create_info (caller structs -> owned requests)           │
// │    └── handles (u64 handle <-> Arc<dyn Object>)                 │
// │          └── Instance -> PhysicalDevice -> Device -> Queue      │
// │                └── backend (D3D12 | Metal | Vulkan | Null)      │
// └─────────────────────────────────────────────────────────────────┘
//
// Objects are published into the handle table only once fully built, so a
// handle never names a half-constructed object.
//
// =============================================================================

pub mod backend;
pub mod command_pool;
pub mod config;
pub mod create_info;
pub mod device;
pub mod enumerate;
pub mod error;
pub mod handles;
pub mod icd;
pub mod instance;
pub mod object;
pub mod physical_device;
pub mod queue;
pub mod rp;

use std::sync::Once;

pub use config::Config;
pub use error::{MirvError, Result};
pub use handles::HandleTable;
pub use object::{live_objects, ObjectType};

/// Environment variable overriding the configured log filter.
pub const LOG_ENV: &str = "MIRV_LOG";

/// Installs the `env_logger` backend once per process.
///
/// The level comes from `config`, then `MIRV_LOG` overrides it. A host that
/// already installed a logger keeps its own.
pub fn init_logging(config: &Config) {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let mut builder = env_logger::Builder::new();
        builder.filter_level(config.level_filter());
        builder.parse_env(LOG_ENV);
        if builder.try_init().is_ok() {
            log::info!("mirv v{} initialized", env!("CARGO_PKG_VERSION"));
        }
    });
}

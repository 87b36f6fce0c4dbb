// Backend module - Vulkan abstraction layer
//
// Design: Thin wrapper around ash, one type per setup step
// Instance -> PhysicalDevice -> LogicalDevice -> Surface -> Swapchain

pub mod device;
pub mod instance;
pub mod physical_device;
pub mod pipeline;
pub mod shader;
pub mod surface;
pub mod swapchain;
pub mod sync;

pub use device::LogicalDevice;
pub use instance::Instance;
pub use physical_device::PhysicalDevice;
pub use surface::{Surface, SurfaceInfo};
pub use swapchain::{Swapchain, SwapchainConfig, SwapchainPlan};

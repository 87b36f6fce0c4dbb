//! Vulkan initialization and frame presentation for a single fixed draw.
//!
//! [`GraphicsDevice::init`] walks instance, physical device, logical device,
//! surface and swapchain setup, records one command buffer per swapchain
//! image, and [`GraphicsDevice::draw_frame`] then acquires, submits and
//! presents once per call.

pub mod backend;
pub mod config;
pub mod error;
pub mod frame;
pub mod graphics;

pub use config::{Config, PresentMode};
pub use error::{FrameError, SetupError};
pub use frame::{FramePhase, FrameRenderer};
pub use graphics::GraphicsDevice;

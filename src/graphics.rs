// Graphics device - the surface the host application talks to
//
// init() builds everything in dependency order, draw_frame() is called once
// per application frame, and dropping the value tears everything down in
// reverse creation order.

use raw_window_handle::{HasRawDisplayHandle, HasRawWindowHandle};
use std::sync::Arc;

use crate::backend::{Instance, LogicalDevice, PhysicalDevice, Surface, Swapchain};
use crate::config::Config;
use crate::error::{FrameError, SetupError};
use crate::frame::FrameRenderer;

/// IMPORTANT: Field order is drop order. The frame renderer and swapchain
/// must go before the surface and device, the instance last.
pub struct GraphicsDevice {
    frame: FrameRenderer,
    swapchain: Swapchain,
    // Only held so they are destroyed in the right place
    _surface: Surface,
    device: Arc<LogicalDevice>,
    physical_device: PhysicalDevice,
    _instance: Instance,
    frames_drawn: u64,
}

impl GraphicsDevice {
    pub fn init<W>(window: &W, config: &Config) -> Result<Self, SetupError>
    where
        W: HasRawDisplayHandle + HasRawWindowHandle,
    {
        log::info!("Initializing Vulkan...");

        let instance = Instance::new(
            &config.window.title,
            window.raw_display_handle(),
            config.validation_enabled(),
        )?;
        let physical_device = PhysicalDevice::select(&instance)?;
        let device = LogicalDevice::new(&instance, &physical_device)?;
        let surface = Surface::new(&instance, &physical_device, window)?;
        let mut swapchain = Swapchain::new(
            Arc::clone(&device),
            &physical_device,
            &surface,
            &config.swapchain(),
        )?;
        let frame = FrameRenderer::new(Arc::clone(&device), &mut swapchain, config)?;

        log::info!("Vulkan initialized successfully!");

        Ok(Self {
            frame,
            swapchain,
            _surface: surface,
            device,
            physical_device,
            _instance: instance,
            frames_drawn: 0,
        })
    }

    /// Acquire, submit and present one frame.
    pub fn draw_frame(&mut self) -> Result<(), FrameError> {
        self.frame.draw_frame(&self.swapchain)?;
        self.frames_drawn += 1;
        Ok(())
    }

    pub fn gpu_name(&self) -> String {
        self.physical_device.name()
    }

    pub fn swapchain(&self) -> &Swapchain {
        &self.swapchain
    }
}

impl Drop for GraphicsDevice {
    fn drop(&mut self) {
        log::info!(
            "Cleaning up Vulkan resources after {} frames...",
            self.frames_drawn
        );
        let _ = self.device.wait_idle();
    }
}

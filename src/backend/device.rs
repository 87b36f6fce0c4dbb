// Logical device - command submission context
//
// One graphics queue. Swapchains are created and destroyed here because the
// device handle is needed for both.

use ash::extensions::khr;
use ash::prelude::VkResult;
use ash::vk;
use std::sync::Arc;

use super::{Instance, PhysicalDevice};
use crate::error::{SetupContext, SetupError};

pub struct LogicalDevice {
    pub device: ash::Device,
    pub queue: vk::Queue,
    pub queue_family_index: u32,
    swapchain_loader: khr::Swapchain,
}

impl LogicalDevice {
    pub fn new(instance: &Instance, physical: &PhysicalDevice) -> Result<Arc<Self>, SetupError> {
        let queue_family_index = physical.queue_family_index;

        let queue_priorities = [1.0];
        let queue_create_info = vk::DeviceQueueCreateInfo::builder()
            .queue_family_index(queue_family_index)
            .queue_priorities(&queue_priorities)
            .build();

        let supported = unsafe {
            instance
                .instance
                .get_physical_device_features(physical.handle)
        };
        let features = vk::PhysicalDeviceFeatures::builder()
            .shader_clip_distance(supported.shader_clip_distance == vk::TRUE)
            .build();

        let extensions = [khr::Swapchain::name().as_ptr()];

        let create_info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(std::slice::from_ref(&queue_create_info))
            .enabled_extension_names(&extensions)
            .enabled_features(&features);

        let device = unsafe {
            instance
                .instance
                .create_device(physical.handle, &create_info, None)
        }
        .setup_context("vkCreateDevice")?;

        let queue = unsafe { device.get_device_queue(queue_family_index, 0) };
        let swapchain_loader = khr::Swapchain::new(&instance.instance, &device);

        log::info!("Created logical device with queue family {}", queue_family_index);

        Ok(Arc::new(Self {
            device,
            queue,
            queue_family_index,
            swapchain_loader,
        }))
    }

    pub fn create_swapchain(
        &self,
        create_info: &vk::SwapchainCreateInfoKHR,
    ) -> Result<vk::SwapchainKHR, SetupError> {
        unsafe { self.swapchain_loader.create_swapchain(create_info, None) }
            .setup_context("vkCreateSwapchainKHR")
    }

    pub fn swapchain_images(&self, swapchain: vk::SwapchainKHR) -> Result<Vec<vk::Image>, SetupError> {
        unsafe { self.swapchain_loader.get_swapchain_images(swapchain) }
            .setup_context("vkGetSwapchainImagesKHR")
    }

    /// Blocks until an image is available; no timeout.
    pub fn acquire_next_image(
        &self,
        swapchain: vk::SwapchainKHR,
        semaphore: vk::Semaphore,
    ) -> VkResult<(u32, bool)> {
        unsafe {
            self.swapchain_loader.acquire_next_image(
                swapchain,
                u64::MAX,
                semaphore,
                vk::Fence::null(),
            )
        }
    }

    pub fn queue_present(&self, present_info: &vk::PresentInfoKHR) -> VkResult<bool> {
        unsafe { self.swapchain_loader.queue_present(self.queue, present_info) }
    }

    pub fn destroy_swapchain(&self, swapchain: vk::SwapchainKHR) {
        unsafe { self.swapchain_loader.destroy_swapchain(swapchain, None) }
    }

    /// Wait for device to be idle (e.g., before cleanup)
    pub fn wait_idle(&self) -> VkResult<()> {
        unsafe { self.device.device_wait_idle() }
    }
}

impl Drop for LogicalDevice {
    fn drop(&mut self) {
        log::info!("Destroying logical device...");

        let _ = self.wait_idle();
        unsafe { self.device.destroy_device(None) };
    }
}

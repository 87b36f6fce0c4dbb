// Presentation surface
//
// Everything the swapchain needs to know about the surface is queried once,
// right after creation, and cached in `SurfaceInfo`.

use ash::extensions::khr;
use ash::vk;
use raw_window_handle::{HasRawDisplayHandle, HasRawWindowHandle};

use super::{Instance, PhysicalDevice};
use crate::error::{SetupContext, SetupError};

/// Capability snapshot taken when the surface was created.
#[derive(Debug, Clone, Default)]
pub struct SurfaceInfo {
    /// Whether the graphics queue family can present to this surface.
    pub can_present: bool,
    /// The graphics family if it can present, otherwise the first family
    /// in enumeration order that can.
    pub present_family: Option<u32>,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
    pub capabilities: vk::SurfaceCapabilitiesKHR,
}

pub struct Surface {
    pub handle: vk::SurfaceKHR,
    loader: khr::Surface,
    info: SurfaceInfo,
}

impl Surface {
    pub fn new<W>(
        instance: &Instance,
        physical: &PhysicalDevice,
        window: &W,
    ) -> Result<Self, SetupError>
    where
        W: HasRawDisplayHandle + HasRawWindowHandle,
    {
        let handle =
            instance.create_surface(window.raw_display_handle(), window.raw_window_handle())?;

        let surface = Self {
            handle,
            loader: instance.surface_loader.clone(),
            info: SurfaceInfo::default(),
        };
        // Dropping `surface` on a failed query releases the handle.
        surface.with_queried_info(physical)
    }

    fn with_queried_info(mut self, physical: &PhysicalDevice) -> Result<Self, SetupError> {
        let device = physical.handle;
        let loader = &self.loader;
        let handle = self.handle;

        let supports = |family: u32| unsafe {
            loader
                .get_physical_device_surface_support(device, family, handle)
                .setup_context("vkGetPhysicalDeviceSurfaceSupportKHR")
        };

        let can_present = supports(physical.queue_family_index)?;

        let mut present_family = can_present.then_some(physical.queue_family_index);
        if present_family.is_none() {
            for (family, props) in physical.queue_families.iter().enumerate() {
                if props.queue_count > 0 && supports(family as u32)? {
                    present_family = Some(family as u32);
                    break;
                }
            }
        }

        let formats = unsafe { loader.get_physical_device_surface_formats(device, handle) }
            .setup_context("vkGetPhysicalDeviceSurfaceFormatsKHR")?;
        let present_modes =
            unsafe { loader.get_physical_device_surface_present_modes(device, handle) }
                .setup_context("vkGetPhysicalDeviceSurfacePresentModesKHR")?;
        let capabilities =
            unsafe { loader.get_physical_device_surface_capabilities(device, handle) }
                .setup_context("vkGetPhysicalDeviceSurfaceCapabilitiesKHR")?;

        log::debug!(
            "Surface: present={} present_family={:?} formats={} modes={:?} images={}..{}",
            can_present,
            present_family,
            formats.len(),
            present_modes,
            capabilities.min_image_count,
            capabilities.max_image_count
        );

        self.info = SurfaceInfo {
            can_present,
            present_family,
            formats,
            present_modes,
            capabilities,
        };
        Ok(self)
    }

    pub fn can_present(&self) -> bool {
        self.info.can_present
    }

    pub fn info(&self) -> &SurfaceInfo {
        &self.info
    }
}

impl Drop for Surface {
    fn drop(&mut self) {
        unsafe { self.loader.destroy_surface(self.handle, None) };
    }
}

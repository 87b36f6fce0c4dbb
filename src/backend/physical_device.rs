// Physical device selection
//
// First GPU (in driver enumeration order) with a graphics-capable queue
// family wins. No scoring, no feature checks.

use ash::vk;
use std::ffi::CStr;

use super::Instance;
use crate::error::SetupError;

/// Selected GPU and the queue family all work is submitted to.
#[derive(Clone)]
pub struct PhysicalDevice {
    pub handle: vk::PhysicalDevice,
    pub queue_family_index: u32,
    pub queue_families: Vec<vk::QueueFamilyProperties>,
    pub properties: vk::PhysicalDeviceProperties,
}

impl PhysicalDevice {
    pub fn select(instance: &Instance) -> Result<Self, SetupError> {
        let devices = instance.physical_devices()?;
        let device_count = devices.len();

        let candidates: Vec<_> = devices
            .into_iter()
            .map(|device| {
                let families = unsafe {
                    instance
                        .instance
                        .get_physical_device_queue_family_properties(device)
                };
                (device, families)
            })
            .collect();

        let (handle, queue_family_index) =
            first_suitable(&candidates).ok_or(SetupError::NoSuitableDevice(device_count))?;

        let queue_families = candidates
            .into_iter()
            .find(|(device, _)| *device == handle)
            .map(|(_, families)| families)
            .unwrap_or_default();

        let properties = unsafe { instance.instance.get_physical_device_properties(handle) };

        let selected = Self {
            handle,
            queue_family_index,
            queue_families,
            properties,
        };

        log::info!("Selected GPU: {}", selected.name());
        log::info!(
            "API Version: {}.{}.{}",
            vk::api_version_major(properties.api_version),
            vk::api_version_minor(properties.api_version),
            vk::api_version_patch(properties.api_version)
        );
        log::debug!("Graphics queue family: {}", queue_family_index);

        Ok(selected)
    }

    pub fn name(&self) -> String {
        unsafe { CStr::from_ptr(self.properties.device_name.as_ptr()) }
            .to_string_lossy()
            .into_owned()
    }
}

/// Index of the first family with at least one queue and graphics support.
pub fn find_graphics_family(families: &[vk::QueueFamilyProperties]) -> Option<u32> {
    families
        .iter()
        .position(|family| {
            family.queue_count > 0 && family.queue_flags.contains(vk::QueueFlags::GRAPHICS)
        })
        .map(|index| index as u32)
}

/// First device, in the given order, that has a graphics family.
pub fn first_suitable<D: Copy>(
    candidates: &[(D, Vec<vk::QueueFamilyProperties>)],
) -> Option<(D, u32)> {
    candidates
        .iter()
        .find_map(|(device, families)| find_graphics_family(families).map(|index| (*device, index)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn family(flags: vk::QueueFlags, queue_count: u32) -> vk::QueueFamilyProperties {
        vk::QueueFamilyProperties {
            queue_flags: flags,
            queue_count,
            ..Default::default()
        }
    }

    #[test]
    fn picks_first_graphics_family() {
        let families = [
            family(vk::QueueFlags::TRANSFER, 2),
            family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE, 1),
            family(vk::QueueFlags::GRAPHICS, 4),
        ];
        assert_eq!(find_graphics_family(&families), Some(1));
    }

    #[test]
    fn skips_families_without_queues() {
        let families = [
            family(vk::QueueFlags::GRAPHICS, 0),
            family(vk::QueueFlags::GRAPHICS, 1),
        ];
        assert_eq!(find_graphics_family(&families), Some(1));
    }

    #[test]
    fn compute_only_device_has_no_graphics_family() {
        let families = [family(vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER, 8)];
        assert_eq!(find_graphics_family(&families), None);
    }

    #[test]
    fn first_qualifying_device_wins() {
        let candidates = vec![
            ("compute-card", vec![family(vk::QueueFlags::COMPUTE, 1)]),
            (
                "integrated",
                vec![family(vk::QueueFlags::TRANSFER, 1), family(vk::QueueFlags::GRAPHICS, 1)],
            ),
            ("discrete", vec![family(vk::QueueFlags::GRAPHICS, 16)]),
        ];
        assert_eq!(first_suitable(&candidates), Some(("integrated", 1)));
    }

    #[test]
    fn no_device_qualifies() {
        let candidates: Vec<(u32, Vec<vk::QueueFamilyProperties>)> =
            vec![(0, vec![]), (1, vec![family(vk::QueueFlags::COMPUTE, 1)])];
        assert_eq!(first_suitable(&candidates), None);
    }
}

// Synchronization primitives
//
// Each frame slot owns an acquire semaphore and a fence (GPU-CPU) that keeps
// the CPU from reusing the slot while the GPU still works on it. The
// render-finished semaphore belongs to the swapchain image, since present
// keeps waiting on it after the slot fence has signaled.

use ash::prelude::VkResult;
use ash::vk;

use super::LogicalDevice;
use crate::error::{SetupContext, SetupError};

/// Frame synchronization - one per frame in flight
#[derive(Debug, Clone, Copy)]
pub struct FrameSync {
    pub image_acquired: vk::Semaphore,
    pub in_flight: vk::Fence,
}

impl FrameSync {
    pub fn new(device: &LogicalDevice) -> Result<Self, SetupError> {
        // Start signaled so the first wait on each slot returns immediately
        let fence_info = vk::FenceCreateInfo::builder().flags(vk::FenceCreateFlags::SIGNALED);

        let mut sync = Self {
            image_acquired: vk::Semaphore::null(),
            in_flight: vk::Fence::null(),
        };

        let created = unsafe { sync.create_all(&device.device, &fence_info) };

        if let Err(result) = created {
            sync.destroy(&device.device);
            return Err(result).setup_context("vkCreateSemaphore/vkCreateFence");
        }
        Ok(sync)
    }

    unsafe fn create_all(
        &mut self,
        device: &ash::Device,
        fence_info: &vk::FenceCreateInfo,
    ) -> VkResult<()> {
        self.image_acquired = device.create_semaphore(&vk::SemaphoreCreateInfo::default(), None)?;
        self.in_flight = device.create_fence(fence_info, None)?;
        Ok(())
    }

    /// Null members are skipped by the driver.
    pub fn destroy(&self, device: &ash::Device) {
        unsafe {
            device.destroy_semaphore(self.image_acquired, None);
            device.destroy_fence(self.in_flight, None);
        }
    }
}

pub fn create_semaphore(device: &LogicalDevice) -> Result<vk::Semaphore, SetupError> {
    unsafe {
        device
            .device
            .create_semaphore(&vk::SemaphoreCreateInfo::default(), None)
    }
    .setup_context("vkCreateSemaphore")
}

/// Fence of the slot that last submitted work for each swapchain image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageFences {
    fences: Vec<vk::Fence>,
}

impl ImageFences {
    pub fn new(image_count: usize) -> Self {
        Self {
            fences: vec![vk::Fence::null(); image_count],
        }
    }

    /// Fence that must signal before `slot_fence` may render into `image`.
    pub fn pending(&self, image: u32, slot_fence: vk::Fence) -> Option<vk::Fence> {
        let fence = self.fences[image as usize];
        (fence != vk::Fence::null() && fence != slot_fence).then_some(fence)
    }

    /// Run `submit` and attribute `image` to `slot_fence` only if it succeeded.
    pub fn submit<E>(
        &mut self,
        image: u32,
        slot_fence: vk::Fence,
        submit: impl FnOnce() -> Result<(), E>,
    ) -> Result<(), E> {
        submit()?;
        self.fences[image as usize] = slot_fence;
        Ok(())
    }

    /// Drop every reference to a fence that is about to be destroyed.
    pub fn forget(&mut self, fence: vk::Fence) {
        for entry in self.fences.iter_mut().filter(|entry| **entry == fence) {
            *entry = vk::Fence::null();
        }
    }
}

/// Round-robin cursor over a fixed number of frame slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameRing {
    len: usize,
    current: usize,
}

impl FrameRing {
    pub fn new(len: usize) -> Self {
        Self {
            len: len.max(1),
            current: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn current(&self) -> usize {
        self.current
    }

    pub fn advance(&mut self) {
        self.current = (self.current + 1) % self.len;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk::Handle;

    fn fence(raw: u64) -> vk::Fence {
        vk::Fence::from_raw(raw)
    }

    #[test]
    fn fresh_images_have_nothing_pending() {
        let fences = ImageFences::new(3);
        assert_eq!(fences.pending(0, fence(1)), None);
        assert_eq!(fences.pending(2, fence(1)), None);
    }

    #[test]
    fn image_used_by_other_slot_is_pending() {
        let mut fences = ImageFences::new(2);
        fences.submit(1, fence(1), || Ok::<_, ()>(())).unwrap();

        assert_eq!(fences.pending(1, fence(2)), Some(fence(1)));
        // Own slot fence was already waited on
        assert_eq!(fences.pending(1, fence(1)), None);
        assert_eq!(fences.pending(0, fence(2)), None);
    }

    #[test]
    fn failed_submit_leaves_image_untouched() {
        let mut fences = ImageFences::new(2);
        fences.submit(0, fence(1), || Ok::<_, ()>(())).unwrap();

        let result = fences.submit(0, fence(2), || Err(vk::Result::ERROR_DEVICE_LOST));
        assert_eq!(result, Err(vk::Result::ERROR_DEVICE_LOST));
        assert_eq!(fences.pending(0, fence(3)), Some(fence(1)));

        let result = fences.submit(1, fence(2), || Err(vk::Result::ERROR_OUT_OF_HOST_MEMORY));
        assert!(result.is_err());
        assert_eq!(fences.pending(1, fence(3)), None);
    }

    #[test]
    fn forgotten_fence_is_no_longer_pending() {
        let mut fences = ImageFences::new(3);
        fences.submit(0, fence(1), || Ok::<_, ()>(())).unwrap();
        fences.submit(1, fence(2), || Ok::<_, ()>(())).unwrap();
        fences.submit(2, fence(1), || Ok::<_, ()>(())).unwrap();

        fences.forget(fence(1));
        assert_eq!(fences.pending(0, fence(5)), None);
        assert_eq!(fences.pending(1, fence(5)), Some(fence(2)));
        assert_eq!(fences.pending(2, fence(5)), None);
    }

    #[test]
    fn ring_wraps_around() {
        let mut ring = FrameRing::new(3);
        let visited: Vec<_> = (0..7)
            .map(|_| {
                let slot = ring.current();
                ring.advance();
                slot
            })
            .collect();
        assert_eq!(visited, [0, 1, 2, 0, 1, 2, 0]);
    }

    #[test]
    fn single_slot_ring_stays_put() {
        let mut ring = FrameRing::new(1);
        ring.advance();
        ring.advance();
        assert_eq!(ring.current(), 0);
    }

    #[test]
    fn zero_length_ring_is_clamped() {
        let mut ring = FrameRing::new(0);
        assert_eq!(ring.len(), 1);
        ring.advance();
        assert_eq!(ring.current(), 0);
    }
}

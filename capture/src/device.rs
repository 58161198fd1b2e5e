//! Capture device trait.

use async_trait::async_trait;

use crate::{CaptureError, Frame};

/// Opaque handle proving exclusive ownership of an acquired device.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct DeviceHandle(u64);

impl DeviceHandle {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

/// A camera (or any frame source) that can be exclusively acquired.
///
/// Callers bound `wait_ready` with their own timeout; implementations should
/// simply resolve once the device can deliver frames.
#[async_trait]
pub trait CaptureDevice: Send + Sync {
    /// Acquire exclusive use of the device.
    async fn acquire(&self) -> Result<DeviceHandle, CaptureError>;

    /// Resolve once the acquired device is ready to deliver frames.
    async fn wait_ready(&self, handle: &DeviceHandle) -> Result<(), CaptureError>;

    /// Capture one frame.
    async fn capture_frame(&self, handle: &DeviceHandle) -> Result<Frame, CaptureError>;

    /// Give the device back. Must not fail; implementations log their own problems.
    fn release(&self, handle: DeviceHandle);
}

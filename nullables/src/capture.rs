//! Nullable capture device and scorer.

use agegate_capture::{AgeScore, AgeScorer, CaptureDevice, CaptureError, DeviceHandle, Frame};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

/// A scriptable capture device.
///
/// By default it acquires, becomes ready immediately, and delivers a one-pixel
/// frame per capture. Failures can be injected per stage.
pub struct NullCaptureDevice {
    unavailable: AtomicBool,
    never_ready: AtomicBool,
    failing_frames: Mutex<HashSet<usize>>,
    in_use: AtomicBool,
    acquires: AtomicUsize,
    releases: AtomicUsize,
    captures: AtomicUsize,
}

impl NullCaptureDevice {
    pub fn new() -> Self {
        Self {
            unavailable: AtomicBool::new(false),
            never_ready: AtomicBool::new(false),
            failing_frames: Mutex::new(HashSet::new()),
            in_use: AtomicBool::new(false),
            acquires: AtomicUsize::new(0),
            releases: AtomicUsize::new(0),
            captures: AtomicUsize::new(0),
        }
    }

    /// A device whose `acquire` always fails.
    pub fn unavailable() -> Self {
        let device = Self::new();
        device.unavailable.store(true, Ordering::SeqCst);
        device
    }

    /// A device that acquires but never reports ready.
    pub fn never_ready() -> Self {
        let device = Self::new();
        device.never_ready.store(true, Ordering::SeqCst);
        device
    }

    /// Make the capture with the given zero-based index fail.
    pub fn fail_capture(&self, index: usize) {
        self.failing_frames.lock().unwrap().insert(index);
    }

    pub fn acquire_count(&self) -> usize {
        self.acquires.load(Ordering::SeqCst)
    }

    pub fn release_count(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    pub fn capture_count(&self) -> usize {
        self.captures.load(Ordering::SeqCst)
    }

    /// Whether a handle is currently outstanding.
    pub fn is_held(&self) -> bool {
        self.in_use.load(Ordering::SeqCst)
    }
}

impl Default for NullCaptureDevice {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CaptureDevice for NullCaptureDevice {
    async fn acquire(&self) -> Result<DeviceHandle, CaptureError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(CaptureError::Unavailable("null device unavailable".into()));
        }
        if self.in_use.swap(true, Ordering::SeqCst) {
            return Err(CaptureError::Unavailable("null device already held".into()));
        }
        let id = self.acquires.fetch_add(1, Ordering::SeqCst) as u64;
        Ok(DeviceHandle::new(id))
    }

    async fn wait_ready(&self, _handle: &DeviceHandle) -> Result<(), CaptureError> {
        if self.never_ready.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        Ok(())
    }

    async fn capture_frame(&self, _handle: &DeviceHandle) -> Result<Frame, CaptureError> {
        let index = self.captures.fetch_add(1, Ordering::SeqCst);
        if self.failing_frames.lock().unwrap().contains(&index) {
            return Err(CaptureError::Frame(format!("injected failure on capture {index}")));
        }
        Ok(Frame::new(1, 1, vec![index as u8]))
    }

    fn release(&self, _handle: DeviceHandle) {
        self.releases.fetch_add(1, Ordering::SeqCst);
        self.in_use.store(false, Ordering::SeqCst);
    }
}

/// A scorer that replays a fixed script of scores, cycling when exhausted.
pub struct NullScorer {
    script: Vec<AgeScore>,
    calls: AtomicUsize,
}

impl NullScorer {
    pub fn new(script: Vec<AgeScore>) -> Self {
        assert!(!script.is_empty(), "NullScorer needs at least one score");
        Self {
            script,
            calls: AtomicUsize::new(0),
        }
    }

    /// Always report the same age and confidence.
    pub fn constant(age: u32, confidence: f32) -> Self {
        Self::new(vec![AgeScore::new(age, confidence)])
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl AgeScorer for NullScorer {
    fn score(&self, _frame: &Frame) -> Result<AgeScore, CaptureError> {
        let index = self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.script[index % self.script.len()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn device_tracks_acquire_and_release() {
        let device = NullCaptureDevice::new();
        let handle = device.acquire().await.unwrap();
        assert!(device.is_held());
        device.release(handle);
        assert!(!device.is_held());
        assert_eq!(device.acquire_count(), 1);
        assert_eq!(device.release_count(), 1);
    }

    #[tokio::test]
    async fn injected_capture_failure() {
        let device = NullCaptureDevice::new();
        device.fail_capture(1);
        let handle = device.acquire().await.unwrap();
        assert!(device.capture_frame(&handle).await.is_ok());
        assert!(device.capture_frame(&handle).await.is_err());
        assert!(device.capture_frame(&handle).await.is_ok());
    }

    #[test]
    fn scorer_cycles_script() {
        let scorer = NullScorer::new(vec![AgeScore::new(20, 0.9), AgeScore::new(40, 0.1)]);
        let frame = Frame::new(1, 1, vec![0]);
        assert_eq!(scorer.score(&frame).unwrap().age, 20);
        assert_eq!(scorer.score(&frame).unwrap().age, 40);
        assert_eq!(scorer.score(&frame).unwrap().age, 20);
        assert_eq!(scorer.call_count(), 3);
    }
}

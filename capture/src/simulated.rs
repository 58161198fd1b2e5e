//! Simulated hardware for running the pipeline without a camera.
//!
//! [`SimulatedCamera`] produces blank frames after a warm-up delay and
//! [`SyntheticScorer`] reports a noisy age around a configured value.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::{AgeScore, AgeScorer, CaptureDevice, CaptureError, DeviceHandle, Frame};

const FRAME_WIDTH: u32 = 64;
const FRAME_HEIGHT: u32 = 48;

/// A camera that is always present and becomes ready after `warm_up`.
pub struct SimulatedCamera {
    warm_up: Duration,
    in_use: AtomicBool,
    next_handle: AtomicU64,
}

impl SimulatedCamera {
    pub fn new(warm_up: Duration) -> Self {
        Self {
            warm_up,
            in_use: AtomicBool::new(false),
            next_handle: AtomicU64::new(1),
        }
    }
}

#[async_trait]
impl CaptureDevice for SimulatedCamera {
    async fn acquire(&self) -> Result<DeviceHandle, CaptureError> {
        if self
            .in_use
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(CaptureError::Unavailable("camera already in use".into()));
        }
        Ok(DeviceHandle::new(self.next_handle.fetch_add(1, Ordering::Relaxed)))
    }

    async fn wait_ready(&self, _handle: &DeviceHandle) -> Result<(), CaptureError> {
        tokio::time::sleep(self.warm_up).await;
        Ok(())
    }

    async fn capture_frame(&self, _handle: &DeviceHandle) -> Result<Frame, CaptureError> {
        let len = (FRAME_WIDTH * FRAME_HEIGHT) as usize;
        Ok(Frame::new(FRAME_WIDTH, FRAME_HEIGHT, vec![0u8; len]))
    }

    fn release(&self, handle: DeviceHandle) {
        tracing::debug!(handle = handle.id(), "simulated camera released");
        self.in_use.store(false, Ordering::Release);
    }
}

/// A scorer that reports `base_age ± jitter` with confidence in `[min_conf, max_conf]`.
pub struct SyntheticScorer {
    base_age: u32,
    jitter: u32,
    min_conf: f32,
    max_conf: f32,
    rng: Mutex<StdRng>,
}

impl SyntheticScorer {
    pub fn new(base_age: u32, jitter: u32, min_conf: f32, max_conf: f32) -> Self {
        Self::with_rng(base_age, jitter, min_conf, max_conf, StdRng::from_entropy())
    }

    /// Deterministic variant for reproducible runs.
    pub fn seeded(base_age: u32, jitter: u32, min_conf: f32, max_conf: f32, seed: u64) -> Self {
        Self::with_rng(base_age, jitter, min_conf, max_conf, StdRng::seed_from_u64(seed))
    }

    fn with_rng(base_age: u32, jitter: u32, min_conf: f32, max_conf: f32, rng: StdRng) -> Self {
        let min_conf = min_conf.clamp(0.0, 1.0);
        Self {
            base_age,
            jitter,
            min_conf,
            max_conf: max_conf.clamp(min_conf, 1.0),
            rng: Mutex::new(rng),
        }
    }
}

impl AgeScorer for SyntheticScorer {
    fn score(&self, _frame: &Frame) -> Result<AgeScore, CaptureError> {
        let mut rng = self.rng.lock().unwrap();
        let jitter = i64::from(self.jitter);
        let offset = rng.gen_range(-jitter..=jitter);
        let age = (i64::from(self.base_age) + offset).clamp(0, i64::from(u32::MAX)) as u32;
        let confidence = if self.max_conf > self.min_conf {
            rng.gen_range(self.min_conf..=self.max_conf)
        } else {
            self.min_conf
        };
        Ok(AgeScore::new(age, confidence))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn camera_is_exclusive_until_released() {
        let cam = SimulatedCamera::new(Duration::ZERO);
        let handle = cam.acquire().await.unwrap();
        assert!(matches!(cam.acquire().await, Err(CaptureError::Unavailable(_))));
        cam.release(handle);
        assert!(cam.acquire().await.is_ok());
    }

    #[tokio::test]
    async fn camera_delivers_frames() {
        let cam = SimulatedCamera::new(Duration::ZERO);
        let handle = cam.acquire().await.unwrap();
        cam.wait_ready(&handle).await.unwrap();
        let frame = cam.capture_frame(&handle).await.unwrap();
        assert_eq!(frame.width, FRAME_WIDTH);
        assert!(!frame.is_empty());
    }

    #[test]
    fn synthetic_scores_stay_in_range() {
        let scorer = SyntheticScorer::seeded(30, 3, 0.6, 0.9, 7);
        let frame = Frame::new(1, 1, vec![0]);
        for _ in 0..100 {
            let s = scorer.score(&frame).unwrap();
            assert!((27..=33).contains(&s.age));
            assert!((0.6..=0.9).contains(&s.confidence));
        }
    }

    #[test]
    fn extreme_jitter_stays_in_bounds() {
        let scorer = SyntheticScorer::seeded(u32::MAX - 1, u32::MAX, 0.5, 0.9, 11);
        let frame = Frame::new(1, 1, vec![0]);
        for _ in 0..100 {
            let s = scorer.score(&frame).unwrap();
            assert!(s.is_well_formed());
        }
    }

    #[test]
    fn zero_jitter_is_exact() {
        let scorer = SyntheticScorer::seeded(21, 0, 0.8, 0.8, 1);
        let s = scorer.score(&Frame::new(1, 1, vec![0])).unwrap();
        assert_eq!(s, AgeScore::new(21, 0.8));
    }
}

//! Facial age estimation.
//!
//! Runs a fixed number of timed capture/score iterations against an exclusively
//! held capture device, discards low-confidence samples, and reports the median
//! age with the mean confidence of the samples that were kept.
//!
//! Samples are biometric-derived data. They live in a buffer owned by the
//! estimator that is wiped whenever an `estimate` call ends, whether it
//! succeeded, failed, was stopped, or its future was dropped mid-flight.

use std::mem::ManuallyDrop;
use std::sync::Arc;
use std::time::Duration;

use agegate_capture::{AgeScorer, CaptureDevice, DeviceHandle};
use agegate_types::{Clock, Timestamp};
use async_trait::async_trait;
use tokio::sync::{Mutex, MutexGuard};
use zeroize::Zeroize;

use crate::config::FacialConfig;
use crate::error::{describe_timeout, EstimationError};
use crate::pipeline::AgeEstimation;
use crate::stop::StopToken;

/// Parameters of one estimation run.
#[derive(Clone, Debug, PartialEq)]
pub struct SamplingParams {
    pub sample_count: usize,
    pub sample_interval: Duration,
    pub min_confidence: f32,
    pub ready_timeout: Duration,
    pub low_confidence_retries: u32,
}

impl SamplingParams {
    pub fn new(sample_count: usize, sample_interval: Duration, min_confidence: f32) -> Self {
        Self {
            sample_count,
            sample_interval,
            min_confidence,
            ready_timeout: Duration::from_secs(10),
            low_confidence_retries: 0,
        }
    }
}

impl From<&FacialConfig> for SamplingParams {
    fn from(config: &FacialConfig) -> Self {
        Self {
            sample_count: config.sample_count,
            sample_interval: config.sample_interval(),
            min_confidence: config.min_confidence,
            ready_timeout: config.device_ready_timeout(),
            low_confidence_retries: config.low_confidence_retries,
        }
    }
}

/// One scored frame.
#[derive(Clone, Debug, PartialEq, Zeroize)]
pub struct AgeSample {
    pub estimated_age: u32,
    pub confidence: f32,
    #[zeroize(skip)]
    pub captured_at: Timestamp,
}

impl AgeSample {
    pub fn new(estimated_age: u32, confidence: f32, captured_at: Timestamp) -> Self {
        Self {
            estimated_age,
            confidence,
            captured_at,
        }
    }
}

/// The aggregated result.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AgeEstimate {
    pub age: u32,
    pub confidence: f32,
    /// Samples that passed the confidence filter.
    pub samples_used: usize,
}

/// Lower median of `ages`, sorting in place. `None` when empty.
///
/// The lower middle element is used for even counts so the result is always
/// an observed age and errs towards the younger reading.
pub fn median_age(ages: &mut [u32]) -> Option<u32> {
    if ages.is_empty() {
        return None;
    }
    ages.sort_unstable();
    Some(ages[(ages.len() - 1) / 2])
}

/// Filter by `min_confidence` and aggregate. `None` if nothing passes.
pub fn aggregate_samples(samples: &[AgeSample], min_confidence: f32) -> Option<AgeEstimate> {
    let kept: Vec<&AgeSample> = samples
        .iter()
        .filter(|s| s.confidence >= min_confidence)
        .collect();
    let mut ages: Vec<u32> = kept.iter().map(|s| s.estimated_age).collect();
    let age = median_age(&mut ages)?;
    let confidence = kept.iter().map(|s| s.confidence).sum::<f32>() / kept.len() as f32;
    ages.zeroize();
    Some(AgeEstimate {
        age,
        confidence,
        samples_used: kept.len(),
    })
}

/// Exclusive access to the sample list; wipes it on drop.
struct SampleBuffer<'a> {
    samples: MutexGuard<'a, Vec<AgeSample>>,
}

impl SampleBuffer<'_> {
    fn push(&mut self, sample: AgeSample) {
        self.samples.push(sample);
    }

    fn len(&self) -> usize {
        self.samples.len()
    }

    fn has_confident(&self, min_confidence: f32) -> bool {
        self.samples.iter().any(|s| s.confidence >= min_confidence)
    }

    fn wipe(&mut self) {
        self.samples.zeroize();
    }
}

impl Drop for SampleBuffer<'_> {
    fn drop(&mut self) {
        self.wipe();
    }
}

/// An acquired device; released on drop.
struct DeviceLease<'a> {
    device: &'a dyn CaptureDevice,
    handle: ManuallyDrop<DeviceHandle>,
}

impl<'a> DeviceLease<'a> {
    fn new(device: &'a dyn CaptureDevice, handle: DeviceHandle) -> Self {
        Self {
            device,
            handle: ManuallyDrop::new(handle),
        }
    }

    fn handle(&self) -> &DeviceHandle {
        &self.handle
    }
}

impl Drop for DeviceLease<'_> {
    fn drop(&mut self) {
        // SAFETY: `drop` runs once and nothing reads `self.handle` after this.
        let handle = unsafe { ManuallyDrop::take(&mut self.handle) };
        self.device.release(handle);
        tracing::debug!("capture device released");
    }
}

/// Estimates a subject's age from several captured frames.
pub struct FacialAgeEstimator {
    device: Arc<dyn CaptureDevice>,
    scorer: Arc<dyn AgeScorer>,
    clock: Arc<dyn Clock>,
    samples: Mutex<Vec<AgeSample>>,
}

impl FacialAgeEstimator {
    pub fn new(
        device: Arc<dyn CaptureDevice>,
        scorer: Arc<dyn AgeScorer>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            device,
            scorer,
            clock,
            samples: Mutex::new(Vec::new()),
        }
    }

    /// Number of samples currently held. Waits for a running estimate to finish.
    pub async fn retained_samples(&self) -> usize {
        self.samples.lock().await.len()
    }

    async fn run(
        &self,
        buffer: &mut SampleBuffer<'_>,
        params: &SamplingParams,
        stop: &StopToken,
    ) -> Result<AgeEstimate, EstimationError> {
        let handle = self
            .device
            .acquire()
            .await
            .map_err(|e| EstimationError::DeviceUnavailable(e.to_string()))?;
        let lease = DeviceLease::new(self.device.as_ref(), handle);

        match tokio::time::timeout(params.ready_timeout, self.device.wait_ready(lease.handle())).await
        {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(EstimationError::DeviceTimeout(e.to_string())),
            Err(_) => {
                return Err(EstimationError::DeviceTimeout(describe_timeout(
                    params.ready_timeout,
                )))
            }
        }
        tracing::debug!("capture device ready");

        let mut stopped = false;
        for round in 0..=params.low_confidence_retries {
            stopped = self.collect_round(&lease, buffer, params, stop).await;
            if stopped || buffer.has_confident(params.min_confidence) {
                break;
            }
            if round < params.low_confidence_retries {
                tracing::info!(round = round + 1, "no confident sample, sampling again");
            }
        }

        let collected = buffer.len();
        let estimate = aggregate_samples(&buffer.samples, params.min_confidence);
        buffer.wipe();

        match estimate {
            Some(estimate) => {
                tracing::info!(
                    samples_used = estimate.samples_used,
                    collected,
                    stopped,
                    "facial estimate complete"
                );
                Ok(estimate)
            }
            None if stopped && collected == 0 => Err(EstimationError::Stopped),
            None => Err(EstimationError::LowConfidence {
                collected,
                min_confidence: params.min_confidence,
            }),
        }
    }

    /// One round of `sample_count` captures. Returns `true` if stopped early.
    async fn collect_round(
        &self,
        lease: &DeviceLease<'_>,
        buffer: &mut SampleBuffer<'_>,
        params: &SamplingParams,
        stop: &StopToken,
    ) -> bool {
        for index in 0..params.sample_count {
            tokio::select! {
                biased;
                _ = stop.stopped() => {
                    tracing::debug!(index, "sampling stopped");
                    return true;
                }
                _ = tokio::time::sleep(params.sample_interval) => {}
            }

            let frame = match self.device.capture_frame(lease.handle()).await {
                Ok(frame) => frame,
                Err(e) => {
                    tracing::warn!(index, error = %e, "skipping sample: capture failed");
                    continue;
                }
            };
            match self.scorer.score(&frame) {
                Ok(score) if score.is_well_formed() => {
                    tracing::debug!(index, "sample scored");
                    buffer.push(AgeSample::new(score.age, score.confidence, self.clock.now()));
                }
                Ok(_) => tracing::warn!(index, "skipping sample: confidence outside [0, 1]"),
                Err(e) => tracing::warn!(index, error = %e, "skipping sample: scoring failed"),
            }
        }
        false
    }
}

#[async_trait]
impl AgeEstimation for FacialAgeEstimator {
    async fn estimate(
        &self,
        params: &SamplingParams,
        stop: &StopToken,
    ) -> Result<AgeEstimate, EstimationError> {
        let mut buffer = SampleBuffer {
            samples: self.samples.lock().await,
        };
        let result = self.run(&mut buffer, params, stop).await;
        drop(buffer);
        result
    }
}

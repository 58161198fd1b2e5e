//! Capture device and age-scoring collaborators.
//!
//! The verification pipeline never talks to a camera or an inference model
//! directly. It depends on two traits:
//! - [`CaptureDevice`]: exclusive acquisition, readiness, frame capture, release.
//! - [`AgeScorer`]: a black-box function from a frame to `(age, confidence)`.
//!
//! Platform integrations implement these traits. This crate also ships a
//! simulated camera and a synthetic scorer for local runs without hardware.

pub mod device;
pub mod error;
pub mod frame;
pub mod scorer;
pub mod simulated;

pub use device::{CaptureDevice, DeviceHandle};
pub use error::CaptureError;
pub use frame::Frame;
pub use scorer::{AgeScore, AgeScorer};
pub use simulated::{SimulatedCamera, SyntheticScorer};

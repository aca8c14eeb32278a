//! Location-fix acquisition.
//!
//! Coordinates permission handling, the sample source and the policy into a
//! single `acquire` call that resolves exactly once.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                    AcquisitionEngine                       │
//! │  permission ──► preflight ──► stream ┐                     │
//! │                               one-shot ├─► select! loop    │
//! │                               deadline ┘        │          │
//! │                                                 ▼          │
//! │                                     AcquisitionMachine     │
//! │                                     (pure, synchronous)    │
//! └────────────────────────────────────────────────────────────┘
//!                                   │
//!                                   ▼
//!                   Result<AcquiredFix, AcquisitionError>
//! ```
//!
//! [`AcquisitionMachine`] holds every decision: early acceptance, the
//! deadline rule and error mapping. [`AcquisitionEngine`] only turns I/O into
//! events and stops the sensor requests once the machine has resolved.

mod engine;
mod error;
mod progress;
mod state;

pub use engine::AcquisitionEngine;
pub use error::{AcquiredFix, AcquisitionError, AcquisitionResult};
pub use progress::AcquisitionProgress;
pub use state::{AcquisitionEvent, AcquisitionMachine, AcquisitionPhase, SamplingPlan, Step};

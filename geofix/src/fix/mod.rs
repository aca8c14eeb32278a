//! Location fixes and best-fix selection.
//!
//! A [`Fix`] is one resolved coordinate reading together with its accuracy
//! radius. Fixes are produced by sample sources and folded by the
//! [`BestFixSelector`] into a single "best so far" reading.
//!
//! # Ordering
//!
//! Accuracy is a radius in meters, so lower is better. The selector only ever
//! replaces the held fix with a strictly better one:
//!
//! ```text
//! samples:  50m ──► 30m ──► 45m ──► 15m ──► 15m
//! best:     50m     30m     30m     15m     15m (tie keeps the held fix)
//! ```
//!
//! # Example
//!
//! ```
//! use geofix::fix::{BestFixSelector, Fix};
//!
//! let mut selector = BestFixSelector::new();
//! selector.offer(Fix::new(51.5, -0.12, 50.0).unwrap());
//! selector.offer(Fix::new(51.5, -0.12, 15.0).unwrap());
//!
//! assert_eq!(selector.best().map(|f| f.accuracy_m()), Some(15.0));
//! ```

mod model;
mod selector;

pub use model::{Fix, FixError, MISSING_ACCURACY_M};
pub use selector::{update, BestFixSelector};

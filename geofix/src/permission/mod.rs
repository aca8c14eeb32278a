//! Positioning permission state and change notification.
//!
//! The platform owns the real authorization state; this module only observes
//! it. A failed query is reported as [`PermissionState::Unknown`], never as an
//! error, and the acquisition engine treats `Unknown` like a pessimistic
//! default.
//!
//! # Example
//!
//! ```
//! use geofix::permission::{PermissionProber, PermissionState, SharedPermission};
//!
//! let permission = SharedPermission::new(PermissionState::Prompt);
//! permission.on_change(Box::new(|state| println!("permission is now {}", state)));
//!
//! // Platform reports that the user answered the dialog
//! permission.set(PermissionState::Granted);
//! assert_eq!(permission.current_state(), PermissionState::Granted);
//! ```

mod state;

pub use state::{
    ListenerId, PermissionCallback, PermissionProber, PermissionState, SharedPermission,
    StaticPermission,
};

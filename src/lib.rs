//! Registrar - registration and approval engine
//!
//! Onboards consumers and businesses: the three-step business pipeline
//! (owner details, business details, optional manager link), the admin
//! approval/rejection state machine over the resulting queue, and the
//! authentication gateway that honors the review gate.
//!
//! ## Services
//!
//! - **Registration**: consumer signup and the ordered business steps,
//!   each all-or-nothing over its writes
//! - **Approval**: at-most-once admin decisions, repeat-owner merge,
//!   manager link finalization
//! - **Authentication**: credential verification and session issuance
//! - **Profile**: contact and biographical updates

pub mod auth;
pub mod config;
pub mod db;
pub mod services;
pub mod store;
pub mod types;

pub use config::Args;
pub use types::{RegistrarError, Result};

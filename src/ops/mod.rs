//! High-level operations.
//!
//! This module contains the implementation of voicekit commands.

pub mod doctor;
pub mod guard;
pub mod install;
pub mod service;

pub use doctor::{doctor, format_report, verify_prerequisites, DoctorReport};
pub use guard::GuardDecision;
pub use install::{install, install_recognition, install_synthesis, plan, InstallContext};
pub use service::{render_unit, ServiceManager, ServiceOutcome};

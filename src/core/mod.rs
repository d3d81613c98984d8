//! Core value types shared by every install stage.

pub mod backend;
pub mod error;
pub mod platform;
pub mod request;
pub mod result;

pub use backend::{Backend, RecognitionModel};
pub use error::{ErrorCategory, InstallError};
pub use platform::{Acceleration, OsKind, PlatformProfile};
pub use request::{InstallRequest, RecognitionOptions, RequestKind, SynthesisOptions};
pub use result::{InstallResult, ServiceStatus};

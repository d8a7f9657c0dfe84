//! Face enrollment with duplicate rejection and time-bounded authentication
//! sessions over a shared embedding repository.

pub mod capture;
pub mod errors;
pub mod faces;
pub mod session;

pub use capture::{
    CaptureConfig, DeviceLocator, Frame, FrameSource, ImageFileSource, V4lFrameSource,
};
pub use errors::{AppError, AppResult};
pub use faces::ACCEPTANCE_THRESHOLD;
pub use session::{
    AuthenticationSession, CancellationToken, SessionConfig, SessionOutcome, SessionReport,
    SessionState, SnapshotPolicy,
};

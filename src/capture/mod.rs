pub mod backend;
pub mod catalog;
pub mod frame;
pub mod session;
pub mod v4l2;

pub use backend::CaptureBackend;
pub use frame::Frame;
pub use session::CaptureSession;
pub use v4l2::V4l2Backend;

pub mod queue;
pub mod thumbnail;

pub use queue::BoundedFrameQueue;
pub use thumbnail::ThumbnailCache;

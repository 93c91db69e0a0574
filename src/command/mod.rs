pub mod dispatcher;
pub mod protocol;
pub mod transport;

pub use dispatcher::{CommandDispatcher, Dispatched};
pub use protocol::Response;

//! The two controllers of the client.
//!
//! Both live on the UI thread. Network work is spawned on the runtime and
//! reported back over channels that `poll()` drains once per frame.

pub mod map;
pub mod upload;

pub use map::{MapController, RefreshHandle};
pub use upload::{UploadController, UploadStatus};

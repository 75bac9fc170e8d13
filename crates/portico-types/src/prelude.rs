pub use crate::id::Id;
pub use crate::time::{now_ms, Timestamp};

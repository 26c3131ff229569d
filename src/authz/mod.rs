pub mod context;
pub mod gate;
pub mod grants;

pub use context::{resolve, AccessContext};
pub use gate::{can_read, can_write, require_permission, require_writable};

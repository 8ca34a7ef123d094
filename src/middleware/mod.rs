pub mod session_limit;

pub use session_limit::{SessionSlot, session_limit_middleware};

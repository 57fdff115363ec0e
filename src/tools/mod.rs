//! Script-filter commands and the actions their items run

pub mod console;
pub mod refresh;
pub mod router;
pub mod search;
pub mod util;
pub mod workflow;

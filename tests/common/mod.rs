#![allow(dead_code, unused_imports)]

pub use seedwatch_test_utils::builders;
pub use seedwatch_test_utils::events;
pub use seedwatch_test_utils::processes;
pub use seedwatch_test_utils::{init_tracing, with_timeout};

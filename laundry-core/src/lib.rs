pub mod college;
pub mod machine;
pub mod modal;

pub use college::{College, COLLEGES, DEFAULT_COLLEGE};
pub use machine::*;
pub use modal::*;

// Utility functions

pub mod retry;
pub mod text;

pub use retry::*;
pub use text::*;

pub mod buffer;
pub mod frame;
pub mod loader;

pub use buffer::*;
pub use frame::*;
pub use loader::*;

pub mod assembler;

pub use assembler::{Canvas, CanvasAssembler};

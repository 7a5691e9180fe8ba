//! Neural network components

pub mod losses;

pub use losses::*;

pub mod bookmark;

pub use bookmark::*;

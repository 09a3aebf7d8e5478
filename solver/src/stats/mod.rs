pub mod cost;

pub use cost::*;

mod component;
mod error;
mod values;

pub use component::*;
pub use error::*;
pub use values::*;

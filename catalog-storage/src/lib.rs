pub mod instrumented;
pub mod memory;

pub use instrumented::*;
pub use memory::*;

pub mod preprocessing;
pub mod extraction;
pub mod lines;
pub mod filters;
pub mod ordering;

pub use preprocessing::*;
pub use extraction::*;
pub use lines::*;
pub use filters::*;
pub use ordering::*;

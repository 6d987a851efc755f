mod multistart;
mod optimizer;

pub use multistart::*;
pub use optimizer::*;

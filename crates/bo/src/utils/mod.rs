mod misc;
mod transforms;

pub use misc::*;
pub use transforms::*;

mod nuts;

pub use nuts::*;

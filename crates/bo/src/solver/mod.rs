mod acq_optim;
mod config;
mod solver_impl;
mod state;

pub(crate) use acq_optim::maximize_acquisition;
pub use config::*;
pub(crate) use solver_impl::propose_points;
pub use solver_impl::BoSolver;
pub use state::BoState;

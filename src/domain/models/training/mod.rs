//! Epoch training and convergence-control domain models.

pub mod convergence;
pub mod curriculum;
pub mod global_state;
pub mod regime;
pub mod results;
pub mod statistics;
pub mod threshold;

pub use convergence::*;
pub use curriculum::*;
pub use global_state::*;
pub use regime::*;
pub use results::*;
pub use threshold::*;

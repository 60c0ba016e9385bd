//! Type definitions

pub mod catchment;
pub mod coordinates;
pub mod order;
pub mod plan;
pub mod skill;
pub mod technician;

pub use catchment::*;
pub use coordinates::*;
pub use order::*;
pub use plan::*;
pub use skill::*;
pub use technician::*;

//! Game simulation modules

pub mod collision;
pub mod geom;
pub mod loot;
pub mod map;
pub mod session;
pub mod snapshot;
pub mod world;

pub use geom::{Direction, Position, Speed};
pub use session::RetiredPlayer;
pub use world::{Game, GameError};

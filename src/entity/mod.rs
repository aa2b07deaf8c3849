//! Game entities.
//!
//! A [`Cell`] is one circular physical unit; a [`Player`] owns one or
//! more cells. All cells live in the world's cell map and players refer
//! to theirs by id.

mod cell;
mod player;

pub use cell::{Cell, CellKind, RESIZE_EPSILON};
pub use player::{Aabb, Player};

/// Stable unique id of a cell.
pub type CellId = String;
/// Stable unique id of a player.
pub type PlayerId = String;

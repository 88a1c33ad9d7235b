//! Normalized data model shared by every stage of the engine.

mod board;
mod item;

pub use board::{ending_in, BoardContext, BoardModel, ProjectKind, Sprint, SprintState};
pub use item::{Item, Phase, Priority, StatusTransition};

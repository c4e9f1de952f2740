mod command;
mod digest;
mod event;
mod ids;
mod position;
mod replay;
mod types;
pub mod wire;

pub use crate::command::*;
pub use crate::digest::*;
pub use crate::event::*;
pub use crate::ids::*;
pub use crate::position::*;
pub use crate::replay::*;
pub use crate::types::*;
pub use crate::wire::WireError;

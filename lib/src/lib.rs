mod aim;
mod api;
mod config;
mod course;
mod event;
mod hole;
mod message;
mod physics;
mod protocol;
mod sample;
mod session;
mod shot;
mod swing;

pub use aim::*;
pub use api::*;
pub use config::*;
pub use course::*;
pub use event::*;
pub use hole::*;
pub use message::*;
pub use physics::*;
pub use protocol::*;
pub use sample::*;
pub use session::*;
pub use shot::*;
pub use swing::*;

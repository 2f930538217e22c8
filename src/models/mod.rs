mod plan;
mod task;
mod timeslot;
mod user;

pub use plan::*;
pub use task::*;
pub use timeslot::*;
pub use user::*;

pub mod constants;
mod flags;
mod state;

pub use flags::Flags;
pub use state::{state, CoreState};

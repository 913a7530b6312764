pub mod container;
pub mod context;
pub mod setup;
pub mod wiring;

pub use container::StateCommand;
pub use context::AppContext;
pub use wiring::{DepCommand, MountCommand, VarCommand};

mod container;
mod event;
mod image;
mod mount;
pub mod resource;
mod state;
pub mod traits;
mod variable;
mod volume;

pub use container::Container;
pub use event::{Notification, OperationKind, Outcome, Subject};
pub use image::Image;
pub use mount::Mount;
pub use resource::{ContainerResource, MountResource, VariableResource, VolumeResource};
pub use state::ContainerState;
pub use traits::{ContainerStore, EventSink, ExecutionEngine};
pub use variable::{Variable, VariableRole, VariableTemplate};
pub use volume::Volume;

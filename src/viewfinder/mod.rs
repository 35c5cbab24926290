//! Camera viewfinder component and its status surface

pub mod component;
pub mod status;

pub use component::{Backends, CameraViewfinder, ViewState};
pub use status::{ErrorNotice, StatusSurface, ViewStatus};

pub mod mirror;
pub mod panels;
pub mod rows;
pub mod viewers;

pub use mirror::FieldMirror;
pub use panels::{PanelSwitcher, RefreshHook};
pub use rows::{IdSource, RowCloner, UuidSource};
pub use viewers::{Viewer, Viewers};

pub mod keys;
pub mod reader;
pub mod snapshot;
pub mod views;

pub use reader::{HotPage, HotReader};
pub use snapshot::HotSnapshotBuilder;
pub use views::ViewAccountant;

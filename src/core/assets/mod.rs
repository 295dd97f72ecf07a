pub mod asset_index;
pub mod synchronizer;

pub use asset_index::{AssetIndex, AssetObject};
pub use synchronizer::ResourceSynchronizer;

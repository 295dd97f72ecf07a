pub mod manifest;
pub mod resolver;
pub mod version_meta;

pub use manifest::{VersionEntry, VersionManifest};
pub use resolver::ManifestResolver;
pub use version_meta::VersionMeta;

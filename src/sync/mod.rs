//! Entity synchronization: query cache reads and mutations mirrored into
//! per-entity stores.

mod bridge;
mod registry;
mod resource;

pub use registry::Registry;
pub use resource::Resource;

/*!
 * Resources Module
 * Bundled payload stores and extraction to disk
 */

pub mod materializer;
pub mod store;

pub use materializer::{copy_buffered, MaterializedResource, Materializer};
pub use store::{BundleDirectory, EmbeddedStore, ResourceStore};

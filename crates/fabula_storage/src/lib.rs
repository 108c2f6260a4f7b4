//! Blob storage backends for the Fabula story pipeline.
//!
//! Media lands under a deterministic path `<bucket>/<story_id>/<sequence>.<ext>`
//! so that re-uploads from redelivered jobs overwrite in place and return the
//! same public URL.

#![forbid(unsafe_code)]

mod blob;
mod filesystem;
mod supabase;

pub use blob::{BlobStore, MediaKind, MIN_PAYLOAD_BYTES};
pub use filesystem::FileSystemBlobStore;
pub use supabase::SupabaseBlobStore;

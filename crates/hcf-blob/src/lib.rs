//! Blob storage for the hierarchical container format.
//!
//! A blob is an opaquely-sized byte payload kept in a container's global
//! heap and addressed from inside a fixed-size record field by a locator.
//! This crate defines the locator format, the heap capability the blobs
//! live in, and the put/get/delete operations the reference layer uses for
//! payloads that do not fit in a fixed slot.
//!
//! # Blob field layout
//!
//! ```text
//! [4 bytes: sequence length (u32 LE)]
//! [address-width bytes: heap collection address]
//! [4 bytes: index within the collection (u32 LE)]
//! ```
//!
//! A field whose heap address is zero is the canonical null (empty) blob.
//!
//! # Design Rules
//!
//! 1. Locators are not reference-counted; deletion is explicit and single-shot.
//! 2. `put` and `delete` mutate the heap; every other operation only reads the
//!    field bytes handed in.
//! 3. The heap is injected. Serializing concurrent access to it is the
//!    caller's responsibility.
//! 4. All heap errors are propagated, never silently ignored.

pub mod error;
pub mod heap;
pub mod locator;
pub mod memory;
pub mod store;

pub use error::{BlobError, BlobResult};
pub use heap::{GlobalHeap, HeapId};
pub use locator::BlobLocator;
pub use memory::{HeapStats, InMemoryHeap};
pub use store::BlobStore;

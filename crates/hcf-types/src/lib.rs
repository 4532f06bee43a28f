//! Foundation types for the hierarchical container format (HCF).
//!
//! This crate provides the small, dependency-light types shared by the blob
//! and reference layers. Every other HCF crate depends on `hcf-types`.
//!
//! # Key Types
//!
//! - [`Address`] / [`AddressWidth`]: physical file offsets and their on-disk width
//! - [`ObjectToken`]: opaque, container-scoped object identifier
//! - [`ContainerId`] / [`ContainerInfo`]: container identity and layout parameters
//! - [`Selection`]: sub-region selection with a self-describing byte encoding
//! - [`ByteReader`] / [`ByteWriter`]: bounds-checked little-endian cursors

pub mod address;
pub mod container;
pub mod cursor;
pub mod error;
pub mod selection;
pub mod token;

pub use address::{Address, AddressWidth};
pub use container::{ContainerId, ContainerInfo, FormatBounds, FormatVersion, CONTAINER_INFO_VERSION};
pub use cursor::{ByteReader, ByteWriter};
pub use error::TypeError;
pub use selection::{HyperslabDim, Selection, SelectionEncoding, SelectionShape};
pub use token::{ObjectToken, MAX_TOKEN_SIZE};

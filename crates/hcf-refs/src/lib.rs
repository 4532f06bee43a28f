//! References for the hierarchical container format.
//!
//! A reference identifies an object, a region of an object, or a named
//! attribute, in the same container or in another one. This crate provides
//! the reference value, its byte codec, and the machinery that moves a
//! reference-typed record field between its memory form and its on-disk
//! form inside a container.
//!
//! # Architecture
//!
//! - **References** are tokens plus an optional selection or attribute
//!   name. A reference read from a container holds a counted handle back
//!   to it; one that names its file explicitly is external.
//! - **Location** decides how a field is interpreted. [`RefDatatype`] is
//!   moved between memory and disk with [`RefDatatype::set_location`] and
//!   exposes the matching operation set through [`RefDatatype::ops`].
//! - **Disk slots** keep a two-byte header inline and the rest of the
//!   encoding in a blob, except local object references, which fit the
//!   slot directly.
//! - **Legacy** address-based references are read-only; they are turned
//!   into current references when read.
//!
//! # Modules
//!
//! - [`error`]: Error types for reference operations
//! - [`config`]: [`ContainerConfig`], loadable from TOML or JSON
//! - [`container`]: The [`Container`] trait and [`InMemoryContainer`]
//! - [`handle`]: [`HandleRegistry`] and scoped [`LocationHandle`]s
//! - [`reference`]: The [`Reference`] value
//! - [`codec`]: Byte encoding of references
//! - [`location`]: [`RefDatatype`] and the location state machine
//! - [`memory`] / [`disk`]: Operations per location
//! - [`compat`]: Legacy reference decoding
//! - [`convert`]: Memory to disk conversion and back

pub mod codec;
pub mod compat;
pub mod config;
pub mod container;
pub mod convert;
pub mod disk;
pub mod error;
pub mod handle;
pub mod location;
pub mod memory;
pub mod reference;

pub use codec::{EncodeContext, EncodeFlags, ENCODE_HEADER_SIZE};
pub use config::ContainerConfig;
pub use container::{Container, InMemoryContainer};
pub use disk::{DiskOps, ObjectCompatOps, RegionCompatOps};
pub use error::{RefError, Result};
pub use handle::{HandleId, HandleRegistry, LocationHandle};
pub use location::{LocationMode, RefDatatype, RefKind, RefOps, SizeHint};
pub use memory::{MemoryOps, RefSource};
pub use reference::{
    LegacyRegion, RefType, RefValue, Reference, LEGACY_OBJECT_MEM_SIZE, LEGACY_REGION_MEM_SIZE,
    REF_MEM_SIZE,
};

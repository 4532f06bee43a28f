use std::sync::Arc;

use hcf_types::Address;

use crate::codec::{self, EncodeContext, EncodeFlags};
use crate::container::Container;
use crate::error::{RefError, Result};
use crate::handle::HandleRegistry;
use crate::location::SizeHint;
use crate::reference::{LegacyRegion, RefType, Reference};

/// Input accepted by [`MemoryOps::write`].
#[derive(Clone, Copy, Debug)]
pub enum RefSource<'a> {
    /// Legacy object reference read from disk.
    Object1(Address),
    /// Legacy region reference read from disk.
    Region1(&'a LegacyRegion),
    /// A current-form encoding.
    Encoded(&'a [u8]),
}

/// Where a reference's target lives, relative to a destination.
struct SourceInfo {
    external: bool,
    file_name: Option<String>,
}

/// Operations on references in their memory form.
#[derive(Clone, Debug)]
pub struct MemoryOps {
    registry: Arc<HandleRegistry>,
}

impl MemoryOps {
    pub fn new(registry: Arc<HandleRegistry>) -> Self {
        Self { registry }
    }

    fn source(&self, src: &Reference, dst: &dyn Container) -> Result<SourceInfo> {
        match src.location() {
            Some(handle) => {
                let container = handle.resolve()?;
                Ok(SourceInfo {
                    external: container.id() != dst.id(),
                    file_name: Some(container.name().to_owned()),
                })
            }
            // Carries its own file name, which the codec prefers.
            None if src.is_external() => Ok(SourceInfo {
                external: true,
                file_name: None,
            }),
            None => Err(RefError::BadType(
                "reference has neither a location nor a file name".into(),
            )),
        }
    }

    /// Size of the encoding `src` takes when stored into `dst`.
    ///
    /// Local sizes are cached on the reference. A local object reference
    /// may be copied into the destination slot as is.
    pub fn get_size(&self, src: &Reference, dst: &dyn Container) -> Result<SizeHint> {
        let source = self.source(src, dst)?;
        let encoding = dst.selection_encoding();
        let direct_copy = !source.external && src.ref_type() == RefType::Object2;

        let cached = if source.external {
            None
        } else {
            src.cached_size(encoding)
        };
        let size = match cached {
            Some(size) => size,
            None => {
                let ctx = EncodeContext {
                    file_name: source.file_name.as_deref(),
                    selection_encoding: encoding,
                };
                let flags = EncodeFlags {
                    external: source.external,
                };
                let size = codec::encode(&ctx, src, None, flags)?;
                if !source.external {
                    src.set_cached_size(src.selection().map(|_| encoding), size);
                }
                size
            }
        };
        Ok(SizeHint { size, direct_copy })
    }

    /// Encode `src` for storage into `dst`. Returns the bytes written.
    pub fn read(&self, src: &Reference, dst: &dyn Container, buf: &mut [u8]) -> Result<usize> {
        let source = self.source(src, dst)?;
        let ctx = EncodeContext {
            file_name: source.file_name.as_deref(),
            selection_encoding: dst.selection_encoding(),
        };
        codec::encode(
            &ctx,
            src,
            Some(buf),
            EncodeFlags {
                external: source.external,
            },
        )
    }

    /// Build the memory form of a value read from `src_container`.
    ///
    /// Local references come back holding a handle to `src_container`.
    pub fn write(&self, src_container: &Arc<dyn Container>, source: RefSource<'_>) -> Result<Reference> {
        let mut reference = match source {
            RefSource::Object1(address) => {
                Reference::from_legacy_object(address, token_width(src_container.as_ref())?)?
            }
            RefSource::Region1(region) => {
                Reference::from_legacy_region(region, token_width(src_container.as_ref())?)?
            }
            RefSource::Encoded(bytes) => codec::decode(bytes)?.0,
        };
        if !reference.is_external() {
            let handle = self.registry.file_handle(src_container);
            reference.set_location_id(&handle)?;
        }
        Ok(reference)
    }
}

fn token_width(container: &dyn Container) -> Result<usize> {
    container
        .info()
        .map(|info| info.token_width as usize)
        .map_err(|e| RefError::CantGet(format!("container info: {e}")))
}

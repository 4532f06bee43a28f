//! Sub-region selections over an n-dimensional extent.
//!
//! A [`Selection`] names the elements of a dataset a region reference points
//! at. The reference layer treats it as opaque: it only needs the encoded
//! size, the encoding, and the decoding defined here.
//!
//! Encoded layout (all integers little-endian):
//!
//! ```text
//! [1 byte: encoding version (1 = 32-bit values, 2 = 64-bit values)]
//! [1 byte: shape kind (0 none, 1 points, 2 hyperslab, 3 all)]
//! [1 byte: rank]
//! [rank values: extent]
//! points:    [1 value: point count][count * rank values: coordinates]
//! hyperslab: [rank * 4 values: start, stride, count, block]
//! ```

use serde::{Deserialize, Serialize};

use crate::container::{FormatBounds, FormatVersion};
use crate::cursor::{ByteReader, ByteWriter};
use crate::error::TypeError;

/// Largest supported rank.
pub const MAX_RANK: usize = 32;

const KIND_NONE: u8 = 0;
const KIND_POINTS: u8 = 1;
const KIND_HYPERSLAB: u8 = 2;
const KIND_ALL: u8 = 3;

/// Integer width used when encoding a selection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SelectionEncoding {
    /// 32-bit values, readable by every format version.
    V1,
    /// 64-bit values.
    V2,
}

impl SelectionEncoding {
    /// The encoding a container with the given bounds must use.
    pub fn for_bounds(bounds: &FormatBounds) -> Self {
        match bounds.low {
            FormatVersion::Earliest => Self::V1,
            FormatVersion::Latest => Self::V2,
        }
    }

    fn version_byte(self) -> u8 {
        match self {
            Self::V1 => 1,
            Self::V2 => 2,
        }
    }

    fn from_version_byte(byte: u8) -> Result<Self, TypeError> {
        match byte {
            1 => Ok(Self::V1),
            2 => Ok(Self::V2),
            other => Err(TypeError::UnknownSelectionVersion(other)),
        }
    }

    fn put(self, w: &mut ByteWriter<'_>, value: u64) -> Result<(), TypeError> {
        match self {
            Self::V1 => {
                let narrow = u32::try_from(value).map_err(|_| TypeError::ValueOutOfRange {
                    value,
                    max: u32::MAX as u64,
                })?;
                w.put_u32(narrow)
            }
            Self::V2 => w.put_u64(value),
        }
    }

    fn get(self, r: &mut ByteReader<'_>) -> Result<u64, TypeError> {
        match self {
            Self::V1 => r.read_u32().map(u64::from),
            Self::V2 => r.read_u64(),
        }
    }
}

/// One dimension of a regular hyperslab.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HyperslabDim {
    pub start: u64,
    pub stride: u64,
    pub count: u64,
    pub block: u64,
}

impl HyperslabDim {
    /// A single contiguous run `[start, start + len)`.
    pub fn contiguous(start: u64, len: u64) -> Self {
        Self {
            start,
            stride: 1,
            count: 1,
            block: len,
        }
    }

    /// One past the last selected index, or `None` if it overflows.
    fn end(&self) -> Option<u64> {
        if self.count == 0 {
            return Some(self.start);
        }
        self.stride
            .checked_mul(self.count - 1)?
            .checked_add(self.start)?
            .checked_add(self.block)
    }
}

/// Which elements of the extent are selected.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelectionShape {
    None,
    All,
    Points(Vec<Vec<u64>>),
    Hyperslab(Vec<HyperslabDim>),
}

/// A validated selection over an extent.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    extent: Vec<u64>,
    shape: SelectionShape,
}

impl Selection {
    /// Select every element.
    pub fn all(extent: Vec<u64>) -> Result<Self, TypeError> {
        Self::new(extent, SelectionShape::All)
    }

    /// Select nothing.
    pub fn none(extent: Vec<u64>) -> Result<Self, TypeError> {
        Self::new(extent, SelectionShape::None)
    }

    /// Select individual element coordinates.
    pub fn points(extent: Vec<u64>, points: Vec<Vec<u64>>) -> Result<Self, TypeError> {
        Self::new(extent, SelectionShape::Points(points))
    }

    /// Select a regular hyperslab.
    pub fn hyperslab(extent: Vec<u64>, dims: Vec<HyperslabDim>) -> Result<Self, TypeError> {
        Self::new(extent, SelectionShape::Hyperslab(dims))
    }

    /// Select the rectangle at `start` with side lengths `size`.
    pub fn rectangle(extent: Vec<u64>, start: &[u64], size: &[u64]) -> Result<Self, TypeError> {
        if start.len() != size.len() {
            return Err(TypeError::InvalidSelection(format!(
                "start has rank {}, size has rank {}",
                start.len(),
                size.len()
            )));
        }
        let dims = start
            .iter()
            .zip(size)
            .map(|(s, n)| HyperslabDim::contiguous(*s, *n))
            .collect();
        Self::hyperslab(extent, dims)
    }

    fn new(extent: Vec<u64>, shape: SelectionShape) -> Result<Self, TypeError> {
        if extent.len() > MAX_RANK {
            return Err(TypeError::InvalidSelection(format!(
                "rank {} exceeds maximum {MAX_RANK}",
                extent.len()
            )));
        }
        let rank = extent.len();
        match &shape {
            SelectionShape::None | SelectionShape::All => {}
            SelectionShape::Points(points) => {
                if rank == 0 && !points.is_empty() {
                    return Err(TypeError::InvalidSelection(
                        "points selection over a rank 0 extent".into(),
                    ));
                }
                for point in points {
                    if point.len() != rank {
                        return Err(TypeError::InvalidSelection(format!(
                            "point has rank {}, extent has rank {rank}",
                            point.len()
                        )));
                    }
                    if point.iter().zip(&extent).any(|(c, e)| c >= e) {
                        return Err(TypeError::InvalidSelection(format!(
                            "point {point:?} outside extent {extent:?}"
                        )));
                    }
                }
            }
            SelectionShape::Hyperslab(dims) => {
                if dims.len() != rank {
                    return Err(TypeError::InvalidSelection(format!(
                        "hyperslab has rank {}, extent has rank {rank}",
                        dims.len()
                    )));
                }
                for (dim, e) in dims.iter().zip(&extent) {
                    if dim.count > 1 && dim.stride < dim.block.max(1) {
                        return Err(TypeError::InvalidSelection(
                            "hyperslab blocks overlap".into(),
                        ));
                    }
                    match dim.end() {
                        Some(end) if end <= *e => {}
                        _ => {
                            return Err(TypeError::InvalidSelection(format!(
                                "hyperslab {dim:?} outside extent {e}"
                            )))
                        }
                    }
                }
            }
        }
        Ok(Self { extent, shape })
    }

    pub fn extent(&self) -> &[u64] {
        &self.extent
    }

    pub fn shape(&self) -> &SelectionShape {
        &self.shape
    }

    pub fn rank(&self) -> usize {
        self.extent.len()
    }

    /// Number of selected elements, or `None` if it does not fit in a `u64`.
    pub fn npoints(&self) -> Option<u64> {
        match &self.shape {
            SelectionShape::None => Some(0),
            SelectionShape::All => self.extent.iter().try_fold(1u64, |n, e| n.checked_mul(*e)),
            SelectionShape::Points(points) => Some(points.len() as u64),
            SelectionShape::Hyperslab(dims) => dims.iter().try_fold(1u64, |n, d| {
                n.checked_mul(d.count.checked_mul(d.block)?)
            }),
        }
    }

    /// Size in bytes of the encoding under `encoding`.
    pub fn encoded_size(&self, encoding: SelectionEncoding) -> Result<usize, TypeError> {
        let mut w = ByteWriter::counting();
        self.encode(&mut w, encoding)?;
        Ok(w.written())
    }

    /// Append the encoding to `w`.
    pub fn encode(&self, w: &mut ByteWriter<'_>, encoding: SelectionEncoding) -> Result<(), TypeError> {
        w.put_u8(encoding.version_byte())?;
        let kind = match &self.shape {
            SelectionShape::None => KIND_NONE,
            SelectionShape::Points(_) => KIND_POINTS,
            SelectionShape::Hyperslab(_) => KIND_HYPERSLAB,
            SelectionShape::All => KIND_ALL,
        };
        w.put_u8(kind)?;
        w.put_u8(self.extent.len() as u8)?;
        for e in &self.extent {
            encoding.put(w, *e)?;
        }
        match &self.shape {
            SelectionShape::None | SelectionShape::All => {}
            SelectionShape::Points(points) => {
                encoding.put(w, points.len() as u64)?;
                for coord in points.iter().flatten() {
                    encoding.put(w, *coord)?;
                }
            }
            SelectionShape::Hyperslab(dims) => {
                for d in dims {
                    encoding.put(w, d.start)?;
                    encoding.put(w, d.stride)?;
                    encoding.put(w, d.count)?;
                    encoding.put(w, d.block)?;
                }
            }
        }
        Ok(())
    }

    /// Decode one selection from `r`.
    pub fn decode(r: &mut ByteReader<'_>) -> Result<Self, TypeError> {
        let encoding = SelectionEncoding::from_version_byte(r.read_u8()?)?;
        let kind = r.read_u8()?;
        let rank = r.read_u8()? as usize;
        let extent = (0..rank)
            .map(|_| encoding.get(r))
            .collect::<Result<Vec<_>, _>>()?;
        let shape = match kind {
            KIND_NONE => SelectionShape::None,
            KIND_ALL => SelectionShape::All,
            KIND_POINTS => {
                let count = encoding.get(r)?;
                if rank == 0 && count > 0 {
                    return Err(TypeError::InvalidSelection(
                        "points selection over a rank 0 extent".into(),
                    ));
                }
                // Each coordinate takes at least four bytes.
                let needed = count.saturating_mul(rank as u64 * 4);
                if needed > r.remaining() as u64 {
                    return Err(TypeError::Truncated {
                        needed: usize::try_from(needed).unwrap_or(usize::MAX),
                        remaining: r.remaining(),
                    });
                }
                let mut points = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    let point = (0..rank)
                        .map(|_| encoding.get(r))
                        .collect::<Result<Vec<_>, _>>()?;
                    points.push(point);
                }
                SelectionShape::Points(points)
            }
            KIND_HYPERSLAB => {
                let mut dims = Vec::with_capacity(rank);
                for _ in 0..rank {
                    dims.push(HyperslabDim {
                        start: encoding.get(r)?,
                        stride: encoding.get(r)?,
                        count: encoding.get(r)?,
                        block: encoding.get(r)?,
                    });
                }
                SelectionShape::Hyperslab(dims)
            }
            other => {
                return Err(TypeError::InvalidSelection(format!(
                    "unknown selection kind {other}"
                )))
            }
        };
        Self::new(extent, shape)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn roundtrip(sel: &Selection, encoding: SelectionEncoding) -> Selection {
        let size = sel.encoded_size(encoding).unwrap();
        let mut buf = vec![0u8; size];
        let mut w = ByteWriter::new(&mut buf);
        sel.encode(&mut w, encoding).unwrap();
        assert_eq!(w.written(), size);
        let mut r = ByteReader::new(&buf);
        let decoded = Selection::decode(&mut r).unwrap();
        assert_eq!(r.consumed(), size);
        decoded
    }

    // -----------------------------------------------------------------------
    // Construction
    // -----------------------------------------------------------------------

    #[test]
    fn rectangle_counts_points() {
        let sel = Selection::rectangle(vec![10, 10], &[2, 3], &[4, 5]).unwrap();
        assert_eq!(sel.rank(), 2);
        assert_eq!(sel.npoints(), Some(20));
    }

    #[test]
    fn all_and_none() {
        assert_eq!(Selection::all(vec![3, 4]).unwrap().npoints(), Some(12));
        assert_eq!(Selection::none(vec![3, 4]).unwrap().npoints(), Some(0));
    }

    #[test]
    fn npoints_overflow_is_none() {
        let sel = Selection::all(vec![u64::MAX, 2]).unwrap();
        assert_eq!(sel.npoints(), None);
    }

    #[test]
    fn hyperslab_end_overflow_is_rejected() {
        let dim = HyperslabDim {
            start: 0,
            stride: u64::MAX,
            count: 3,
            block: 1,
        };
        let err = Selection::hyperslab(vec![10], vec![dim]).unwrap_err();
        assert!(matches!(err, TypeError::InvalidSelection(_)));

        let dim = HyperslabDim::contiguous(u64::MAX, 2);
        assert!(Selection::hyperslab(vec![u64::MAX], vec![dim]).is_err());
    }

    #[test]
    fn rank_zero_points_are_rejected() {
        assert!(Selection::points(vec![], vec![vec![]]).is_err());
        assert!(Selection::points(vec![], vec![]).is_ok());
    }

    #[test]
    fn rectangle_outside_extent_is_rejected() {
        let err = Selection::rectangle(vec![10], &[8], &[4]).unwrap_err();
        assert!(matches!(err, TypeError::InvalidSelection(_)));
    }

    #[test]
    fn overlapping_blocks_are_rejected() {
        let dim = HyperslabDim {
            start: 0,
            stride: 2,
            count: 3,
            block: 3,
        };
        assert!(Selection::hyperslab(vec![20], vec![dim]).is_err());
    }

    #[test]
    fn point_rank_mismatch_is_rejected() {
        let err = Selection::points(vec![4, 4], vec![vec![1]]).unwrap_err();
        assert!(matches!(err, TypeError::InvalidSelection(_)));
    }

    #[test]
    fn point_outside_extent_is_rejected() {
        assert!(Selection::points(vec![4], vec![vec![4]]).is_err());
    }

    // -----------------------------------------------------------------------
    // Encoding
    // -----------------------------------------------------------------------

    #[test]
    fn hyperslab_roundtrip_both_encodings() {
        let sel = Selection::rectangle(vec![100, 50], &[10, 5], &[20, 10]).unwrap();
        assert_eq!(roundtrip(&sel, SelectionEncoding::V1), sel);
        assert_eq!(roundtrip(&sel, SelectionEncoding::V2), sel);
    }

    #[test]
    fn points_roundtrip() {
        let sel = Selection::points(vec![8, 8], vec![vec![0, 0], vec![7, 3]]).unwrap();
        assert_eq!(roundtrip(&sel, SelectionEncoding::V1), sel);
    }

    #[test]
    fn v2_is_wider_than_v1() {
        let sel = Selection::rectangle(vec![100], &[0], &[10]).unwrap();
        let v1 = sel.encoded_size(SelectionEncoding::V1).unwrap();
        let v2 = sel.encoded_size(SelectionEncoding::V2).unwrap();
        // header + extent + 4 hyperslab values
        assert_eq!(v1, 3 + 4 + 16);
        assert_eq!(v2, 3 + 8 + 32);
    }

    #[test]
    fn v1_rejects_large_values() {
        let sel = Selection::all(vec![u32::MAX as u64 + 1]).unwrap();
        let err = sel.encoded_size(SelectionEncoding::V1).unwrap_err();
        assert!(matches!(err, TypeError::ValueOutOfRange { .. }));
        assert!(sel.encoded_size(SelectionEncoding::V2).is_ok());
    }

    #[test]
    fn unknown_version_is_rejected() {
        let err = Selection::decode(&mut ByteReader::new(&[9, 0, 0])).unwrap_err();
        assert_eq!(err, TypeError::UnknownSelectionVersion(9));
    }

    #[test]
    fn truncated_point_list_is_rejected() {
        // version 1, points, rank 1, extent 10, count 1000, no coordinates
        let mut buf = vec![1u8, KIND_POINTS, 1];
        buf.extend_from_slice(&10u32.to_le_bytes());
        buf.extend_from_slice(&1000u32.to_le_bytes());
        let err = Selection::decode(&mut ByteReader::new(&buf)).unwrap_err();
        assert!(matches!(err, TypeError::Truncated { .. }));
    }

    #[test]
    fn rank_zero_point_count_is_rejected() {
        // version 2, points, rank 0, count u64::MAX
        let mut buf = vec![2u8, KIND_POINTS, 0];
        buf.extend_from_slice(&u64::MAX.to_le_bytes());
        let err = Selection::decode(&mut ByteReader::new(&buf)).unwrap_err();
        assert!(matches!(err, TypeError::InvalidSelection(_)));

        let mut buf = vec![1u8, KIND_POINTS, 0];
        buf.extend_from_slice(&u32::MAX.to_le_bytes());
        assert!(Selection::decode(&mut ByteReader::new(&buf)).is_err());
    }

    #[test]
    fn encoding_follows_lower_bound() {
        let mut bounds = FormatBounds::default();
        assert_eq!(SelectionEncoding::for_bounds(&bounds), SelectionEncoding::V1);
        bounds.low = FormatVersion::Latest;
        assert_eq!(SelectionEncoding::for_bounds(&bounds), SelectionEncoding::V2);
    }

    proptest! {
        #[test]
        fn rectangle_roundtrips(
            extent in proptest::collection::vec(1u64..1000, 1..4),
            seed in any::<u64>(),
        ) {
            let start: Vec<u64> = extent.iter().map(|e| seed % e).collect();
            let size: Vec<u64> = extent.iter().zip(&start).map(|(e, s)| e - s).collect();
            let sel = Selection::rectangle(extent, &start, &size).unwrap();
            prop_assert_eq!(roundtrip(&sel, SelectionEncoding::V1), sel.clone());
            prop_assert_eq!(roundtrip(&sel, SelectionEncoding::V2), sel);
        }
    }
}

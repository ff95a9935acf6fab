//! Depth look-up table.
//!
//! The chunk holds `width * height` little-endian `f32`s in image order (one
//! row of `width` cells after another). The table is indexed `table[i][j]`
//! with `i` across the width and `j` down the height, so
//! `table[i][j] == floats[j * width + i]`.

use std::fmt::Write as _;

use byteorder::{ByteOrder, LittleEndian};

use crate::container::ChunkRef;

#[derive(Debug, Clone, PartialEq)]
pub struct DepthLut {
    pub width:          usize,
    pub height:         usize,
    pub representation: String,
    /// `width` columns of `height` lambdas each.
    pub table:          Vec<Vec<f32>>,
    pub source:         ChunkRef,
}

impl DepthLut {
    #[inline]
    pub fn get(&self, i: usize, j: usize) -> Option<f32> {
        self.table.get(i)?.get(j).copied()
    }

    /// Smallest and largest lambda in the table, ignoring NaNs.
    pub fn range(&self) -> Option<(f32, f32)> {
        self.table.iter().flatten().filter(|v| !v.is_nan()).fold(None, |acc, &v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
    }

    /// One line per row of the image, cells across the width.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for j in 0..self.height {
            for i in 0..self.width {
                let _ = write!(out, "{:9.6} ", self.table[i][j]);
            }
            out.push('\n');
        }
        out
    }
}

/// Decode `width * height` packed floats into a `table[i][j]` grid.
pub fn decode_table(data: &[u8], width: usize, height: usize) -> Result<Vec<Vec<f32>>, String> {
    let cells = width.checked_mul(height)
        .ok_or_else(|| format!("depth LUT {width}x{height} overflows"))?;
    let needed = cells.checked_mul(4)
        .ok_or_else(|| format!("depth LUT {width}x{height} overflows"))?;
    if data.len() < needed {
        return Err(format!(
            "depth LUT {width}x{height} needs {needed} B, chunk has {} B",
            data.len()
        ));
    }
    let mut floats = vec![0f32; cells];
    LittleEndian::read_f32_into(&data[..needed], &mut floats);

    Ok((0..width)
        .map(|i| (0..height).map(|j| floats[j * width + i]).collect())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn pack(values: &[f32]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    #[test]
    fn transposed_indexing() {
        // 3 wide, 2 high.
        let data = pack(&[0.0, 1.0, 2.0, 10.0, 11.0, 12.0]);
        let table = decode_table(&data, 3, 2).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table[0], vec![0.0, 10.0]);
        assert_eq!(table[2], vec![2.0, 12.0]);
    }

    #[test]
    fn short_chunk_is_rejected() {
        let data = pack(&[1.0, 2.0, 3.0]);
        assert!(decode_table(&data, 2, 2).is_err());
    }

    #[test]
    fn trailing_bytes_are_ignored() {
        let mut data = pack(&[1.0, 2.0]);
        data.extend_from_slice(&[0xff; 3]);
        assert_eq!(decode_table(&data, 2, 1).unwrap(), vec![vec![1.0], vec![2.0]]);
    }

    #[test]
    fn text_dump_follows_image_rows() {
        let lut = DepthLut {
            width:          2,
            height:         2,
            representation: "raw".into(),
            table:          vec![vec![1.0, 3.0], vec![2.0, 4.0]],
            source:         ChunkRef { sha1: "sha1-x".into(), size: 16 },
        };
        assert_eq!(lut.to_text(), " 1.000000  2.000000 \n 3.000000  4.000000 \n");
        assert_eq!(lut.range(), Some((1.0, 4.0)));
    }

    proptest! {
        #[test]
        fn decode_reproduces_every_cell(
            (width, height, values) in (1usize..12, 1usize..12).prop_flat_map(|(w, h)| {
                (Just(w), Just(h), proptest::collection::vec(-1.0e6f32..1.0e6, w * h))
            })
        ) {
            let table = decode_table(&pack(&values), width, height).unwrap();
            for i in 0..width {
                for j in 0..height {
                    prop_assert_eq!(table[i][j], values[j * width + i]);
                }
            }
        }
    }
}

// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Multidimensional arrays.

use serde::{Deserialize, Serialize};

use super::value::DynamicValue;
use crate::error::CodecError;

/// Largest element count representable by the protocol's `Int32` lengths.
pub const MAX_ELEMENTS: usize = i32::MAX as usize;

/// A row-major multidimensional array.
///
/// The product of the dimension lengths always equals the element count, and
/// the element count never exceeds [`MAX_ELEMENTS`].
///
/// # Examples
///
/// ```
/// use uaflow_client::codec::{DynamicValue, MultiDimArray};
///
/// let values = (0..6).map(DynamicValue::Int32).collect();
/// let matrix = MultiDimArray::new(vec![2, 3], values).unwrap();
/// assert_eq!(matrix.strides(), vec![3, 1]);
/// assert_eq!(matrix.value(&[1, 2]), Some(&DynamicValue::Int32(5)));
/// assert_eq!(matrix.value(&[2, 0]), None);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "MatrixParts")]
pub struct MultiDimArray {
    dimensions: Vec<u32>,
    values: Vec<DynamicValue>,
}

#[derive(Deserialize)]
struct MatrixParts {
    dimensions: Vec<u32>,
    values: Vec<DynamicValue>,
}

impl TryFrom<MatrixParts> for MultiDimArray {
    type Error = CodecError;

    fn try_from(parts: MatrixParts) -> Result<Self, Self::Error> {
        Self::new(parts.dimensions, parts.values)
    }
}

impl MultiDimArray {
    /// Creates a matrix, validating the dimensions against the element count.
    pub fn new(dimensions: Vec<u32>, values: Vec<DynamicValue>) -> Result<Self, CodecError> {
        if dimensions.is_empty() {
            return Err(CodecError::invalid_dimensions("at least one dimension is required"));
        }
        if values.len() > MAX_ELEMENTS {
            return Err(CodecError::invalid_dimensions(format!(
                "{} elements exceed the Int32 length limit",
                values.len()
            )));
        }

        let product = dimensions
            .iter()
            .try_fold(1u64, |acc, &d| acc.checked_mul(u64::from(d)))
            .ok_or_else(|| CodecError::invalid_dimensions("dimension product overflows"))?;

        if product != values.len() as u64 {
            return Err(CodecError::invalid_dimensions(format!(
                "dimensions {dimensions:?} describe {product} elements, got {}",
                values.len()
            )));
        }

        Ok(Self { dimensions, values })
    }

    /// Returns the per-dimension lengths.
    #[inline]
    pub fn dimensions(&self) -> &[u32] {
        &self.dimensions
    }

    /// Returns the elements in row-major order.
    #[inline]
    pub fn values(&self) -> &[DynamicValue] {
        &self.values
    }

    /// Consumes the matrix, returning dimensions and elements.
    pub fn into_parts(self) -> (Vec<u32>, Vec<DynamicValue>) {
        (self.dimensions, self.values)
    }

    /// Returns the element count.
    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if any dimension is zero.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns the row-major strides: `stride[i] = d[i+1] * ... * d[n-1]`.
    ///
    /// Strides of an empty matrix saturate at `usize::MAX`, since a zero
    /// dimension lets the remaining lengths grow without bound.
    pub fn strides(&self) -> Vec<usize> {
        let mut strides = vec![1usize; self.dimensions.len()];
        for i in (0..self.dimensions.len().saturating_sub(1)).rev() {
            strides[i] = strides[i + 1].saturating_mul(self.dimensions[i + 1] as usize);
        }
        strides
    }

    /// Returns the flat offset of an index vector, if it is in bounds.
    pub fn offset(&self, indices: &[u32]) -> Option<usize> {
        if indices.len() != self.dimensions.len() || self.values.is_empty() {
            return None;
        }
        if indices.iter().zip(&self.dimensions).any(|(&index, &dim)| index >= dim) {
            return None;
        }

        let offset = indices
            .iter()
            .zip(self.strides())
            .try_fold(0usize, |acc, (&index, stride)| {
                (index as usize)
                    .checked_mul(stride)
                    .and_then(|step| acc.checked_add(step))
            })?;

        (offset < self.values.len()).then_some(offset)
    }

    /// Returns the element at `indices`.
    pub fn value(&self, indices: &[u32]) -> Option<&DynamicValue> {
        self.offset(indices).and_then(|i| self.values.get(i))
    }

    /// Returns a copy with the element at `indices` replaced.
    ///
    /// Returns `None` if the index vector is invalid.
    pub fn with_value(&self, indices: &[u32], value: DynamicValue) -> Option<Self> {
        let offset = self.offset(indices)?;
        let mut values = self.values.clone();
        values[offset] = value;
        Some(Self {
            dimensions: self.dimensions.clone(),
            values,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ints(n: i32) -> Vec<DynamicValue> {
        (0..n).map(DynamicValue::Int32).collect()
    }

    #[test]
    fn test_rejects_mismatched_product() {
        assert!(MultiDimArray::new(vec![2, 3], ints(5)).is_err());
        assert!(MultiDimArray::new(vec![], ints(0)).is_err());
        assert!(MultiDimArray::new(vec![u32::MAX, u32::MAX, u32::MAX], ints(1)).is_err());
    }

    #[test]
    fn test_row_major_indexing() {
        let matrix = MultiDimArray::new(vec![2, 3, 4], ints(24)).unwrap();
        assert_eq!(matrix.strides(), vec![12, 4, 1]);

        for i in 0..2u32 {
            for j in 0..3u32 {
                for k in 0..4u32 {
                    let expected = (i * 12 + j * 4 + k) as i32;
                    assert_eq!(
                        matrix.value(&[i, j, k]),
                        Some(&DynamicValue::Int32(expected))
                    );
                }
            }
        }
    }

    #[test]
    fn test_invalid_indices() {
        let matrix = MultiDimArray::new(vec![2, 2], ints(4)).unwrap();
        assert_eq!(matrix.value(&[0]), None);
        assert_eq!(matrix.value(&[0, 0, 0]), None);
        assert_eq!(matrix.value(&[2, 0]), None);
        assert_eq!(matrix.value(&[0, 2]), None);
    }

    #[test]
    fn test_zero_dimension_matrix() {
        let matrix = MultiDimArray::new(vec![3, 0], vec![]).unwrap();
        assert!(matrix.is_empty());
        assert_eq!(matrix.value(&[0, 0]), None);
    }

    #[test]
    fn test_zero_dimension_beside_huge_ones() {
        let dims = vec![0, u32::MAX, u32::MAX, u32::MAX];
        let matrix = MultiDimArray::new(dims, vec![]).unwrap();
        assert_eq!(matrix.value(&[0, 0, 0, 0]), None);
        assert_eq!(matrix.offset(&[0, 1, 1, 1]), None);
        assert!(matrix.with_value(&[0, 0, 0, 0], DynamicValue::Null).is_none());
        assert_eq!(matrix.strides()[0], usize::MAX);

        let trailing = MultiDimArray::new(vec![u32::MAX, u32::MAX, 0], vec![]).unwrap();
        assert_eq!(trailing.value(&[1, 1, 0]), None);
        assert_eq!(trailing.strides(), vec![0, 0, 1]);
    }

    #[test]
    fn test_with_value_builds_new_matrix() {
        let matrix = MultiDimArray::new(vec![2, 2], ints(4)).unwrap();
        let updated = matrix.with_value(&[1, 0], DynamicValue::Int32(99)).unwrap();
        assert_eq!(matrix.value(&[1, 0]), Some(&DynamicValue::Int32(2)));
        assert_eq!(updated.value(&[1, 0]), Some(&DynamicValue::Int32(99)));
        assert!(matrix.with_value(&[5, 0], DynamicValue::Null).is_none());
    }

    #[test]
    fn test_deserialize_validates() {
        let ok = r#"{"dimensions":[1,2],"values":[{"kind":"Null"},{"kind":"Null"}]}"#;
        assert!(serde_json::from_str::<MultiDimArray>(ok).is_ok());
        let bad = r#"{"dimensions":[3],"values":[]}"#;
        assert!(serde_json::from_str::<MultiDimArray>(bad).is_err());
    }
}

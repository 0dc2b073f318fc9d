// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use serde::{Deserialize, Serialize};

use crate::errors::ShapeError;

/// A 2-D detector frame stored row-major: `data[ss * width + fs]`.
///
/// `fs` (fast scan) is the column index, `ss` (slow scan) the row index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    width: usize,
    height: usize,
    data: Vec<f32>,
}

impl Frame {
    pub fn new(width: usize, height: usize, data: Vec<f32>) -> Result<Self, ShapeError> {
        if data.len() != width * height {
            return Err(ShapeError {
                expected_width: width,
                expected_height: height,
                found_width: data.len(),
                found_height: 1,
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn filled(width: usize, height: usize, value: f32) -> Self {
        Self {
            width,
            height,
            data: vec![value; width * height],
        }
    }

    pub fn zeros(width: usize, height: usize) -> Self {
        Self::filled(width, height, 0.0)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    pub fn into_vec(self) -> Vec<f32> {
        self.data
    }

    #[inline]
    pub fn index(&self, fs: usize, ss: usize) -> usize {
        ss * self.width + fs
    }

    #[inline]
    pub fn get(&self, fs: usize, ss: usize) -> f32 {
        self.data[self.index(fs, ss)]
    }

    #[inline]
    pub fn set(&mut self, fs: usize, ss: usize, value: f32) {
        let idx = self.index(fs, ss);
        self.data[idx] = value;
    }

    /// Fails with the offending shapes when `other` does not match this frame.
    pub fn check_shape(&self, width: usize, height: usize) -> Result<(), ShapeError> {
        if self.width == width && self.height == height {
            Ok(())
        } else {
            Err(ShapeError {
                expected_width: width,
                expected_height: height,
                found_width: self.width,
                found_height: self.height,
            })
        }
    }
}

/// Bad-pixel mask. A value of 0 marks a good pixel, anything else a bad one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mask {
    width: usize,
    height: usize,
    values: Vec<u8>,
}

impl Mask {
    pub fn all_good(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            values: vec![0; width * height],
        }
    }

    pub fn new(width: usize, height: usize, values: Vec<u8>) -> Result<Self, ShapeError> {
        if values.len() != width * height {
            return Err(ShapeError {
                expected_width: width,
                expected_height: height,
                found_width: values.len(),
                found_height: 1,
            });
        }
        Ok(Self {
            width,
            height,
            values,
        })
    }

    /// Builds a mask from a reference frame, treating every non-zero value as bad.
    pub fn from_frame(frame: &Frame) -> Self {
        Self {
            width: frame.width(),
            height: frame.height(),
            values: frame.data().iter().map(|v| u8::from(*v != 0.0)).collect(),
        }
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    #[inline]
    pub fn is_bad(&self, idx: usize) -> bool {
        self.values[idx] != 0
    }

    #[inline]
    pub fn is_good(&self, idx: usize) -> bool {
        self.values[idx] == 0
    }

    pub fn mark_bad(&mut self, idx: usize) {
        self.values[idx] = 1;
    }

    pub fn bad_count(&self) -> usize {
        self.values.iter().filter(|v| **v != 0).count()
    }

    pub fn check_shape(&self, width: usize, height: usize) -> Result<(), ShapeError> {
        if self.width == width && self.height == height {
            Ok(())
        } else {
            Err(ShapeError {
                expected_width: width,
                expected_height: height,
                found_width: self.width,
                found_height: self.height,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_rejects_wrong_length() {
        assert!(Frame::new(3, 2, vec![0.0; 5]).is_err());
        assert!(Frame::new(3, 2, vec![0.0; 6]).is_ok());
    }

    #[test]
    fn test_frame_row_major_indexing() {
        let mut frame = Frame::zeros(4, 3);
        frame.set(1, 2, 7.0);
        assert_eq!(frame.data()[2 * 4 + 1], 7.0);
        assert_eq!(frame.get(1, 2), 7.0);
    }

    #[test]
    fn test_mask_semantics_zero_is_good() {
        let mask = Mask::new(2, 1, vec![0, 3]).unwrap();
        assert!(mask.is_good(0));
        assert!(mask.is_bad(1));
        assert_eq!(mask.bad_count(), 1);
    }

    #[test]
    fn test_mask_check_shape() {
        let mask = Mask::all_good(4, 4);
        assert!(mask.check_shape(4, 4).is_ok());
        let err = mask.check_shape(8, 4).unwrap_err();
        assert_eq!(err.found_width, 4);
        assert_eq!(err.expected_width, 8);
    }
}

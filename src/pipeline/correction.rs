// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::errors::{ConfigError, EventError};
use crate::model::{Frame, Mask};

/// Dark subtraction, gain division and bad-pixel masking.
///
/// Corrected value: `(x - dark) / gain` for good pixels, `0` for bad ones. A pixel whose
/// gain is zero is treated as bad. Reference frames are fixed at construction.
#[derive(Debug, Clone)]
pub struct Correction {
    width: usize,
    height: usize,
    mask: Option<Mask>,
    dark: Option<Frame>,
    gain: Option<Frame>,
}

impl Correction {
    pub fn new(mask: Option<Mask>, dark: Option<Frame>, gain: Option<Frame>) -> Result<Self, ConfigError> {
        let shape = mask
            .as_ref()
            .map(Mask::shape)
            .or_else(|| dark.as_ref().map(Frame::shape))
            .or_else(|| gain.as_ref().map(Frame::shape));
        let (width, height) = shape.ok_or_else(|| {
            ConfigError::invalid("correction", "mask_filename", "at least one of mask, dark or gain is required")
        })?;

        if let Some(mask) = &mask {
            mask.check_shape(width, height)
                .map_err(|source| ConfigError::Shape { what: "correction mask", source })?;
        }
        if let Some(dark) = &dark {
            dark.check_shape(width, height)
                .map_err(|source| ConfigError::Shape { what: "dark frame", source })?;
        }
        if let Some(gain) = &gain {
            gain.check_shape(width, height)
                .map_err(|source| ConfigError::Shape { what: "gain frame", source })?;
        }

        Ok(Self {
            width,
            height,
            mask,
            dark,
            gain,
        })
    }

    pub fn mask(&self) -> Option<&Mask> {
        self.mask.as_ref()
    }

    pub fn apply(&self, mut frame: Frame) -> Result<Frame, EventError> {
        frame
            .check_shape(self.width, self.height)
            .map_err(|e| EventError::Correction(e.to_string()))?;

        for (idx, value) in frame.data_mut().iter_mut().enumerate() {
            if self.mask.as_ref().map_or(false, |m| m.is_bad(idx)) {
                *value = 0.0;
                continue;
            }
            if let Some(dark) = &self.dark {
                *value -= dark.data()[idx];
            }
            if let Some(gain) = &self.gain {
                let g = gain.data()[idx];
                *value = if g == 0.0 { 0.0 } else { *value / g };
            }
        }
        Ok(frame)
    }

    /// Mask of pixels this stage zeroes, including zero-gain pixels.
    pub fn effective_mask(&self) -> Mask {
        let mut mask = self
            .mask
            .clone()
            .unwrap_or_else(|| Mask::all_good(self.width, self.height));
        if let Some(gain) = &self.gain {
            for (idx, g) in gain.data().iter().enumerate() {
                if *g == 0.0 {
                    mask.mark_bad(idx);
                }
            }
        }
        mask
    }
}

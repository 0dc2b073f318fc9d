// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use serde::{Deserialize, Serialize};

/// One detected Bragg peak.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Peak {
    /// Intensity-weighted centroid, fast-scan coordinate (pixels).
    pub fs: f32,
    /// Intensity-weighted centroid, slow-scan coordinate (pixels).
    pub ss: f32,
    /// Value of the brightest pixel in the peak.
    pub intensity: f32,
    /// Background-subtracted intensity summed over the peak pixels.
    pub integrated_intensity: f32,
    pub snr: f32,
    pub num_pixels: u32,
}

/// Peaks in detection order. Immutable once built.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeakList(Vec<Peak>);

impl PeakList {
    pub fn new(peaks: Vec<Peak>) -> Self {
        Self(peaks)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Peak> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[Peak] {
        &self.0
    }
}

impl<'a> IntoIterator for &'a PeakList {
    type Item = &'a Peak;
    type IntoIter = std::slice::Iter<'a, Peak>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::config::groups::HitParams;

/// An event is a hit when its peak count lies within `[min, max]`, both ends inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HitClassifier {
    min_num_peaks: usize,
    max_num_peaks: usize,
}

impl HitClassifier {
    pub fn new(params: &HitParams) -> Self {
        Self {
            min_num_peaks: params.min_num_peaks_for_hit,
            max_num_peaks: params.max_num_peaks_for_hit,
        }
    }

    pub fn is_hit(&self, num_peaks: usize) -> bool {
        (self.min_num_peaks..=self.max_num_peaks).contains(&num_peaks)
    }
}

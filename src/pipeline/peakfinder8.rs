// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Peakfinder8: radial-background, threshold-and-grow Bragg peak detection.
//!
//! # Algorithm
//!
//! For each ASIC tile, in row-major tile order:
//!
//! 1. **Radial background.** Pixels are binned by integer radius from the beam centre.
//!    Each bin's mean and sigma are estimated over the good pixels of the tile with
//!    iterative clipping: after every pass, pixels above
//!    `mean + max(RADIAL_CLIP_SIGMAS * sigma, adc_threshold)` are left out of the next pass.
//! 2. **Seeds.** Scanning the tile row-major, a good, unclaimed pixel inside
//!    `[min_r, max_r]` is a seed if `I > mean + adc_threshold` and
//!    `I / sigma >= minimum_snr`, using the statistics of its radial bin.
//! 3. **Growth.** From a seed, the scan first climbs to the local maximum by steepest ascent
//!    over qualifying neighbours. From there, neighbours (4- or 8-connected) that pass the
//!    same test are added while they stay inside the tile and within `local_bg_radius`
//!    (Chebyshev distance) of that maximum. Every pixel belongs to at most one component.
//! 4. **Acceptance.** Components whose size lies outside
//!    `[min_pixel_count, max_pixel_count]` are dropped. For the others the local background
//!    is estimated from the below-threshold good pixels within `local_bg_radius` of the
//!    maximum (falling back to the radial bin), and the peak is reported with its
//!    background-weighted centroid, integrated intensity and SNR.
//! 5. Detection stops as soon as `max_num_peaks` peaks are found.
//!
//! # Tile boundaries
//!
//! Components never cross tile edges. A spot straddling two tiles yields one candidate per
//! tile and each is judged on its own against the pixel-count bounds. The first seed in
//! scan order claims a pixel; pixels of a rejected component are not reused as seeds.
//!
//! # Determinism
//!
//! The scan is single-threaded with a fixed visiting order, so identical inputs give
//! bit-identical peak lists. All work buffers are allocated once and reused across events.

use crate::config::consts::{RADIAL_CLIP_SIGMAS, RADIAL_STATS_ITERATIONS};
use crate::config::groups::{Connectivity, PeakFinderParams};
use crate::errors::{ConfigError, EventError};
use crate::model::{Frame, GeometryInfo, Mask, Peak, PeakList};

const EPS: f32 = 1e-6;

const NEIGHBOURS_4: &[(isize, isize)] = &[(0, -1), (-1, 0), (1, 0), (0, 1)];
const NEIGHBOURS_8: &[(isize, isize)] = &[
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

/// Per-event work buffers.
#[derive(Debug, Clone)]
struct Scratch {
    sum: Vec<f64>,
    sum_sq: Vec<f64>,
    count: Vec<u32>,
    mean: Vec<f32>,
    sigma: Vec<f32>,
    clip: Vec<f32>,
    /// `claimed[idx] == generation` marks a pixel taken by a component in this event.
    claimed: Vec<u32>,
    generation: u32,
    stack: Vec<usize>,
    component: Vec<usize>,
}

impl Scratch {
    fn new(num_bins: usize, num_pixels: usize) -> Self {
        Self {
            sum: vec![0.0; num_bins],
            sum_sq: vec![0.0; num_bins],
            count: vec![0; num_bins],
            mean: vec![0.0; num_bins],
            sigma: vec![0.0; num_bins],
            clip: vec![f32::INFINITY; num_bins],
            claimed: vec![0; num_pixels],
            generation: 0,
            stack: Vec::new(),
            component: Vec::new(),
        }
    }

    fn next_generation(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        if self.generation == 0 {
            self.claimed.iter_mut().for_each(|c| *c = 0);
            self.generation = 1;
        }
    }

    #[inline]
    fn is_claimed(&self, idx: usize) -> bool {
        self.claimed[idx] == self.generation
    }

    #[inline]
    fn claim(&mut self, idx: usize) {
        self.claimed[idx] = self.generation;
    }

    #[inline]
    fn above_threshold(&self, value: f32, bin: usize, adc_threshold: f32, minimum_snr: f32) -> bool {
        value > self.mean[bin] + adc_threshold && value / self.sigma[bin].max(EPS) >= minimum_snr
    }
}

/// Pixel rectangle of one tile plus the radial bins it touches.
#[derive(Debug, Clone, Copy)]
struct Tile {
    fs0: usize,
    ss0: usize,
    fs1: usize,
    ss1: usize,
    min_bin: usize,
    max_bin: usize,
}

#[derive(Debug, Clone)]
pub struct Peakfinder8 {
    params: PeakFinderParams,
    geometry: GeometryInfo,
    mask: Mask,
    radius_bin: Vec<u32>,
    in_resolution: Vec<bool>,
    tiles: Vec<Tile>,
    scratch: Scratch,
}

impl Peakfinder8 {
    pub fn new(params: PeakFinderParams, geometry: GeometryInfo, mask: Option<Mask>) -> Result<Self, ConfigError> {
        let (width, height) = (geometry.width(), geometry.height());
        let mask = match mask {
            Some(mask) => {
                mask.check_shape(width, height)
                    .map_err(|source| ConfigError::Shape {
                        what: "peakfinder8 bad-pixel mask",
                        source,
                    })?;
                mask
            }
            None => Mask::all_good(width, height),
        };

        let radii = geometry.radius_map().data();
        let radius_bin: Vec<u32> = radii.iter().map(|r| r.max(0.0).round() as u32).collect();
        let in_resolution = radii
            .iter()
            .map(|r| *r >= params.min_r && *r <= params.max_r)
            .collect();
        let num_bins = radius_bin.iter().copied().max().unwrap_or(0) as usize + 1;

        let tiles = (0..geometry.num_tiles())
            .map(|t| {
                let (fs0, ss0) = geometry.tile_origin(t);
                let (fs1, ss1) = (fs0 + geometry.asic_nx, ss0 + geometry.asic_ny);
                let mut min_bin = usize::MAX;
                let mut max_bin = 0;
                for ss in ss0..ss1 {
                    for fs in fs0..fs1 {
                        let bin = radius_bin[ss * width + fs] as usize;
                        min_bin = min_bin.min(bin);
                        max_bin = max_bin.max(bin);
                    }
                }
                Tile {
                    fs0,
                    ss0,
                    fs1,
                    ss1,
                    min_bin: min_bin.min(max_bin),
                    max_bin,
                }
            })
            .collect();

        Ok(Self {
            scratch: Scratch::new(num_bins, width * height),
            params,
            geometry,
            mask,
            radius_bin,
            in_resolution,
            tiles,
        })
    }

    pub fn geometry(&self) -> &GeometryInfo {
        &self.geometry
    }

    pub fn find_peaks(&mut self, frame: &Frame) -> Result<PeakList, EventError> {
        frame.check_shape(self.geometry.width(), self.geometry.height())?;
        self.scratch.next_generation();

        let mut peaks = Vec::new();
        if self.params.max_num_peaks == 0 {
            return Ok(PeakList::new(peaks));
        }
        for t in 0..self.tiles.len() {
            let tile = self.tiles[t];
            self.radial_statistics(frame, &tile);
            if self.scan_tile(frame, &tile, &mut peaks) {
                break;
            }
        }
        Ok(PeakList::new(peaks))
    }

    fn radial_statistics(&mut self, frame: &Frame, tile: &Tile) {
        let width = frame.width();
        let data = frame.data();
        let bins = tile.min_bin..=tile.max_bin;
        let s = &mut self.scratch;
        s.clip[bins.clone()].iter_mut().for_each(|c| *c = f32::INFINITY);

        for _ in 0..RADIAL_STATS_ITERATIONS {
            s.sum[bins.clone()].iter_mut().for_each(|v| *v = 0.0);
            s.sum_sq[bins.clone()].iter_mut().for_each(|v| *v = 0.0);
            s.count[bins.clone()].iter_mut().for_each(|v| *v = 0);

            for ss in tile.ss0..tile.ss1 {
                let row = ss * width;
                for idx in row + tile.fs0..row + tile.fs1 {
                    if self.mask.is_bad(idx) || !self.in_resolution[idx] {
                        continue;
                    }
                    let bin = self.radius_bin[idx] as usize;
                    let value = data[idx];
                    if value < s.clip[bin] {
                        s.sum[bin] += value as f64;
                        s.sum_sq[bin] += (value as f64) * (value as f64);
                        s.count[bin] += 1;
                    }
                }
            }

            for bin in bins.clone() {
                if s.count[bin] == 0 {
                    s.mean[bin] = 0.0;
                    s.sigma[bin] = 0.0;
                    continue;
                }
                let n = s.count[bin] as f64;
                let mean = s.sum[bin] / n;
                let variance = (s.sum_sq[bin] / n - mean * mean).max(0.0);
                s.mean[bin] = mean as f32;
                s.sigma[bin] = variance.sqrt() as f32;
                s.clip[bin] = s.mean[bin] + (s.sigma[bin] * RADIAL_CLIP_SIGMAS).max(self.params.adc_threshold);
            }
        }
    }

    /// Returns true once `max_num_peaks` is reached.
    fn scan_tile(&mut self, frame: &Frame, tile: &Tile, peaks: &mut Vec<Peak>) -> bool {
        let width = frame.width();
        let data = frame.data();
        let adc = self.params.adc_threshold;
        let snr = self.params.minimum_snr;

        for ss in tile.ss0..tile.ss1 {
            for fs in tile.fs0..tile.fs1 {
                let idx = ss * width + fs;
                if !self.candidate(idx) {
                    continue;
                }
                let bin = self.radius_bin[idx] as usize;
                if !self.scratch.above_threshold(data[idx], bin, adc, snr) {
                    continue;
                }

                let (top_fs, top_ss) = self.climb(frame, tile, fs, ss);
                self.grow(frame, tile, top_fs, top_ss);
                let n = self.scratch.component.len() as u32;
                if n < self.params.min_pixel_count || n > self.params.max_pixel_count {
                    continue;
                }
                peaks.push(self.measure(frame, tile, top_fs, top_ss));
                if peaks.len() >= self.params.max_num_peaks {
                    return true;
                }
            }
        }
        false
    }

    #[inline]
    fn candidate(&self, idx: usize) -> bool {
        self.mask.is_good(idx) && self.in_resolution[idx] && !self.scratch.is_claimed(idx)
    }

    fn neighbours(&self) -> &'static [(isize, isize)] {
        match self.params.connectivity {
            Connectivity::Four => NEIGHBOURS_4,
            Connectivity::Eight => NEIGHBOURS_8,
        }
    }

    #[inline]
    fn in_tile(tile: &Tile, fs: isize, ss: isize) -> bool {
        fs >= tile.fs0 as isize && fs < tile.fs1 as isize && ss >= tile.ss0 as isize && ss < tile.ss1 as isize
    }

    /// Steepest ascent from a seed over unclaimed above-threshold pixels of the tile.
    fn climb(&self, frame: &Frame, tile: &Tile, mut fs: usize, mut ss: usize) -> (usize, usize) {
        let width = frame.width();
        let data = frame.data();
        loop {
            let mut best = (fs, ss);
            let mut best_value = data[ss * width + fs];
            for (dx, dy) in self.neighbours() {
                let (nfs, nss) = (fs as isize + dx, ss as isize + dy);
                if !Self::in_tile(tile, nfs, nss) {
                    continue;
                }
                let nidx = nss as usize * width + nfs as usize;
                let bin = self.radius_bin[nidx] as usize;
                if self.candidate(nidx)
                    && data[nidx] > best_value
                    && self
                        .scratch
                        .above_threshold(data[nidx], bin, self.params.adc_threshold, self.params.minimum_snr)
                {
                    best = (nfs as usize, nss as usize);
                    best_value = data[nidx];
                }
            }
            if best == (fs, ss) {
                return best;
            }
            (fs, ss) = best;
        }
    }

    fn grow(&mut self, frame: &Frame, tile: &Tile, seed_fs: usize, seed_ss: usize) {
        let width = frame.width();
        let data = frame.data();
        let radius = self.params.local_bg_radius as isize;
        let neighbours = self.neighbours();

        self.scratch.component.clear();
        self.scratch.stack.clear();
        let seed = seed_ss * width + seed_fs;
        self.scratch.claim(seed);
        self.scratch.stack.push(seed);

        while let Some(idx) = self.scratch.stack.pop() {
            self.scratch.component.push(idx);
            let (fs, ss) = ((idx % width) as isize, (idx / width) as isize);
            for (dx, dy) in neighbours {
                let (nfs, nss) = (fs + dx, ss + dy);
                if !Self::in_tile(tile, nfs, nss)
                    || (nfs - seed_fs as isize).abs() > radius
                    || (nss - seed_ss as isize).abs() > radius
                {
                    continue;
                }
                let nidx = nss as usize * width + nfs as usize;
                if !self.candidate(nidx) {
                    continue;
                }
                let bin = self.radius_bin[nidx] as usize;
                if self
                    .scratch
                    .above_threshold(data[nidx], bin, self.params.adc_threshold, self.params.minimum_snr)
                {
                    self.scratch.claim(nidx);
                    self.scratch.stack.push(nidx);
                }
            }
        }
    }

    fn measure(&self, frame: &Frame, tile: &Tile, seed_fs: usize, seed_ss: usize) -> Peak {
        let width = frame.width();
        let data = frame.data();
        let radius = self.params.local_bg_radius;
        let s = &self.scratch;

        let mut bg_sum = 0.0f64;
        let mut bg_sum_sq = 0.0f64;
        let mut bg_count = 0u32;
        for ss in seed_ss.saturating_sub(radius).max(tile.ss0)..(seed_ss + radius + 1).min(tile.ss1) {
            for fs in seed_fs.saturating_sub(radius).max(tile.fs0)..(seed_fs + radius + 1).min(tile.fs1) {
                let idx = ss * width + fs;
                if self.mask.is_bad(idx) || s.is_claimed(idx) {
                    continue;
                }
                let bin = self.radius_bin[idx] as usize;
                let value = data[idx];
                if s.above_threshold(value, bin, self.params.adc_threshold, self.params.minimum_snr) {
                    continue;
                }
                bg_sum += value as f64;
                bg_sum_sq += (value as f64) * (value as f64);
                bg_count += 1;
            }
        }
        let seed_bin = self.radius_bin[seed_ss * width + seed_fs] as usize;
        let (background, bg_sigma) = if bg_count >= 2 {
            let n = bg_count as f64;
            let mean = bg_sum / n;
            ((mean) as f32, (bg_sum_sq / n - mean * mean).max(0.0).sqrt() as f32)
        } else {
            (s.mean[seed_bin], s.sigma[seed_bin])
        };

        let mut integrated = 0.0f64;
        let mut weighted_fs = 0.0f64;
        let mut weighted_ss = 0.0f64;
        let mut plain_fs = 0.0f64;
        let mut plain_ss = 0.0f64;
        let mut max_value = f32::MIN;
        for &idx in &s.component {
            let value = data[idx];
            let signal = (value - background) as f64;
            let (fs, ss) = ((idx % width) as f64, (idx / width) as f64);
            integrated += signal;
            weighted_fs += signal * fs;
            weighted_ss += signal * ss;
            plain_fs += fs;
            plain_ss += ss;
            max_value = max_value.max(value);
        }
        let n = s.component.len() as f64;
        let (fs, ss) = if integrated > 0.0 {
            (weighted_fs / integrated, weighted_ss / integrated)
        } else {
            (plain_fs / n, plain_ss / n)
        };

        Peak {
            fs: fs as f32,
            ss: ss as f32,
            intensity: max_value,
            integrated_intensity: integrated as f32,
            snr: (integrated / (bg_sigma.max(EPS) as f64 * n.sqrt())) as f32,
            num_pixels: s.component.len() as u32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> PeakFinderParams {
        PeakFinderParams {
            max_num_peaks: 100,
            adc_threshold: 50.0,
            minimum_snr: 5.0,
            min_pixel_count: 2,
            max_pixel_count: 40,
            local_bg_radius: 3,
            min_r: 0.0,
            max_r: 1000.0,
            connectivity: Connectivity::Eight,
            bad_pixel_map_filename: None,
            radius_map_filename: None,
            beam_center: None,
        }
    }

    fn add_gaussian(frame: &mut Frame, cfs: f32, css: f32, amplitude: f32, sigma: f32) {
        let (width, height) = frame.shape();
        for ss in 0..height {
            for fs in 0..width {
                let dx = fs as f32 - cfs;
                let dy = ss as f32 - css;
                let value = amplitude * (-(dx * dx + dy * dy) / (2.0 * sigma * sigma)).exp();
                if value > 1e-3 {
                    let idx = frame.index(fs, ss);
                    frame.data_mut()[idx] += value;
                }
            }
        }
    }

    #[test]
    fn test_gaussian_centroid_within_half_pixel() {
        let injected = vec![(20.3, 17.6), (45.0, 44.0), (12.8, 50.2)];
        let mut frame = Frame::filled(64, 64, 10.0);
        for (fs, ss) in &injected {
            add_gaussian(&mut frame, *fs, *ss, 500.0, 1.0);
        }
        let mut finder = Peakfinder8::new(params(), GeometryInfo::monolithic(64, 64), None).unwrap();

        let peaks = finder.find_peaks(&frame).unwrap();
        assert_eq!(peaks.len(), injected.len());
        for (fs, ss) in injected {
            let found = peaks
                .iter()
                .find(|p| (p.fs - fs).abs() < 0.5 && (p.ss - ss).abs() < 0.5);
            assert!(found.is_some(), "no peak near ({}, {}): {:?}", fs, ss, peaks);
            let peak = found.unwrap();
            assert!(peak.snr.is_finite());
            assert!(peak.integrated_intensity > 0.0);
            assert!(peak.intensity > 400.0);
        }
    }

    #[test]
    fn test_flat_frame_has_no_peaks() {
        let mut finder = Peakfinder8::new(params(), GeometryInfo::monolithic(32, 32), None).unwrap();
        assert!(finder.find_peaks(&Frame::filled(32, 32, 10.0)).unwrap().is_empty());
    }

    #[test]
    fn test_stops_exactly_at_max_num_peaks() {
        let mut frame = Frame::filled(64, 64, 10.0);
        for k in 0..16 {
            let fs = 6.0 + (k % 4) as f32 * 16.0;
            let ss = 6.0 + (k / 4) as f32 * 16.0;
            add_gaussian(&mut frame, fs, ss, 500.0, 1.0);
        }

        for limit in [1usize, 5, 16, 30] {
            let mut p = params();
            p.max_num_peaks = limit;
            let mut finder = Peakfinder8::new(p, GeometryInfo::monolithic(64, 64), None).unwrap();
            let peaks = finder.find_peaks(&frame).unwrap();
            assert_eq!(peaks.len(), limit.min(16), "limit {}", limit);
        }
    }

    #[test]
    fn test_repeated_runs_are_bit_identical() {
        let mut frame = Frame::filled(48, 48, 10.0);
        add_gaussian(&mut frame, 10.2, 30.7, 300.0, 1.2);
        add_gaussian(&mut frame, 33.5, 12.1, 800.0, 0.9);
        let mut finder = Peakfinder8::new(params(), GeometryInfo::monolithic(48, 48), None).unwrap();

        let first = finder.find_peaks(&frame).unwrap();
        let second = finder.find_peaks(&frame).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
    }

    #[test]
    fn test_pixel_count_bounds_reject_components() {
        let mut frame = Frame::filled(32, 32, 10.0);
        frame.set(8, 8, 500.0);
        add_gaussian(&mut frame, 22.0, 22.0, 500.0, 1.0);

        let mut finder = Peakfinder8::new(params(), GeometryInfo::monolithic(32, 32), None).unwrap();
        let peaks = finder.find_peaks(&frame).unwrap();
        assert_eq!(peaks.len(), 1);
        assert!((peaks.as_slice()[0].fs - 22.0).abs() < 0.5);
    }

    #[test]
    fn test_masked_and_out_of_range_pixels_never_seed() {
        let mut frame = Frame::filled(32, 32, 10.0);
        add_gaussian(&mut frame, 8.0, 8.0, 500.0, 1.0);
        add_gaussian(&mut frame, 24.0, 24.0, 500.0, 1.0);

        let mut mask = Mask::all_good(32, 32);
        for ss in 5..12 {
            for fs in 5..12 {
                mask.mark_bad(ss * 32 + fs);
            }
        }
        let mut finder = Peakfinder8::new(params(), GeometryInfo::monolithic(32, 32), Some(mask)).unwrap();
        let peaks = finder.find_peaks(&frame).unwrap();
        assert_eq!(peaks.len(), 1);
        assert!((peaks.as_slice()[0].fs - 24.0).abs() < 0.5);

        let mut p = params();
        p.max_r = 5.0;
        let mut finder = Peakfinder8::new(p, GeometryInfo::monolithic(32, 32), None).unwrap();
        assert!(finder.find_peaks(&frame).unwrap().is_empty());
    }

    #[test]
    fn test_spot_straddling_tiles_splits_per_tile() {
        // Two 8-pixel-wide tiles side by side; the spot centre sits on the shared edge.
        let geometry = GeometryInfo::with_beam_center(8, 16, 2, 1, 7.5, 30.0);
        let mut frame = Frame::filled(16, 16, 10.0);
        add_gaussian(&mut frame, 7.5, 8.0, 500.0, 1.0);

        let mut finder = Peakfinder8::new(params(), geometry, None).unwrap();
        let peaks = finder.find_peaks(&frame).unwrap();

        assert_eq!(peaks.len(), 2);
        let left = &peaks.as_slice()[0];
        let right = &peaks.as_slice()[1];
        assert!(left.fs < 8.0 && right.fs >= 8.0, "{:?}", peaks);
        assert_eq!(left.num_pixels, right.num_pixels);

        let mut p = params();
        p.min_pixel_count = left.num_pixels + 1;
        let geometry = GeometryInfo::with_beam_center(8, 16, 2, 1, 7.5, 30.0);
        let mut finder = Peakfinder8::new(p, geometry, None).unwrap();
        assert!(finder.find_peaks(&frame).unwrap().is_empty());
    }

    #[test]
    fn test_four_connectivity_splits_diagonal_pixels() {
        let mut frame = Frame::filled(16, 16, 10.0);
        frame.set(5, 5, 400.0);
        frame.set(6, 6, 400.0);
        let mut p = params();
        p.min_pixel_count = 1;

        let mut eight = Peakfinder8::new(p.clone(), GeometryInfo::monolithic(16, 16), None).unwrap();
        assert_eq!(eight.find_peaks(&frame).unwrap().len(), 1);

        p.connectivity = Connectivity::Four;
        let mut four = Peakfinder8::new(p, GeometryInfo::monolithic(16, 16), None).unwrap();
        assert_eq!(four.find_peaks(&frame).unwrap().len(), 2);
    }

    #[test]
    fn test_wrong_frame_shape_is_malformed() {
        let mut finder = Peakfinder8::new(params(), GeometryInfo::monolithic(16, 16), None).unwrap();
        assert!(matches!(
            finder.find_peaks(&Frame::zeros(8, 8)),
            Err(EventError::MalformedFrame(_))
        ));
    }

    #[test]
    fn test_out_of_range_pixels_do_not_bias_background() {
        let params = PeakFinderParams {
            max_r: 5.0,
            ..params()
        };
        let mut finder = Peakfinder8::new(params, GeometryInfo::monolithic(32, 32), None).unwrap();
        let mut frame = Frame::filled(32, 32, 10.0);
        for (idx, v) in frame.data_mut().iter_mut().enumerate() {
            if !finder.in_resolution[idx] {
                *v = 1000.0;
            }
        }

        assert!(finder.find_peaks(&frame).unwrap().is_empty());
        let s = &finder.scratch;
        for bin in 0..s.count.len() {
            if s.count[bin] > 0 {
                assert_eq!(s.mean[bin], 10.0, "bin {}", bin);
                assert_eq!(s.sigma[bin], 0.0, "bin {}", bin);
            }
        }
        // bins wholly beyond max_r keep no statistics
        assert_eq!(s.count[s.count.len() - 1], 0);
    }

    #[test]
    fn test_noisy_background_is_estimated_per_radius() {
        let mut frame = Frame::filled(64, 64, 0.0);
        for (i, v) in frame.data_mut().iter_mut().enumerate() {
            *v = 100.0 + ((i * 7919) % 13) as f32 - 6.0;
        }
        add_gaussian(&mut frame, 40.0, 20.0, 600.0, 1.0);

        let mut finder = Peakfinder8::new(params(), GeometryInfo::monolithic(64, 64), None).unwrap();
        let peaks = finder.find_peaks(&frame).unwrap();
        assert_eq!(peaks.len(), 1);
        let peak = &peaks.as_slice()[0];
        assert!((peak.fs - 40.0).abs() < 0.5 && (peak.ss - 20.0).abs() < 0.5);
        assert!(peak.snr > 5.0);
    }
}

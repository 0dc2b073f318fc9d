// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use super::Frame;
use crate::errors::ShapeError;

/// Detector layout used by peakfinder8.
///
/// The detector frame is a `nasics_x` by `nasics_y` grid of ASIC tiles, each `asic_nx`
/// pixels wide and `asic_ny` pixels high. `radius_map` holds, for every pixel, its
/// distance in pixels from the beam centre.
#[derive(Debug, Clone, PartialEq)]
pub struct GeometryInfo {
    pub asic_nx: usize,
    pub asic_ny: usize,
    pub nasics_x: usize,
    pub nasics_y: usize,
    radius_map: Frame,
}

impl GeometryInfo {
    pub fn new(
        asic_nx: usize,
        asic_ny: usize,
        nasics_x: usize,
        nasics_y: usize,
        radius_map: Frame,
    ) -> Result<Self, ShapeError> {
        radius_map.check_shape(asic_nx * nasics_x, asic_ny * nasics_y)?;
        Ok(Self {
            asic_nx,
            asic_ny,
            nasics_x,
            nasics_y,
            radius_map,
        })
    }

    /// Builds the radius map from a beam centre given in pixel coordinates.
    pub fn with_beam_center(
        asic_nx: usize,
        asic_ny: usize,
        nasics_x: usize,
        nasics_y: usize,
        center_fs: f32,
        center_ss: f32,
    ) -> Self {
        let width = asic_nx * nasics_x;
        let height = asic_ny * nasics_y;
        let mut radius_map = Frame::zeros(width, height);
        for ss in 0..height {
            for fs in 0..width {
                let dx = fs as f32 - center_fs;
                let dy = ss as f32 - center_ss;
                radius_map.set(fs, ss, (dx * dx + dy * dy).sqrt());
            }
        }
        Self {
            asic_nx,
            asic_ny,
            nasics_x,
            nasics_y,
            radius_map,
        }
    }

    /// Single-tile layout covering the whole frame, beam centre in the middle.
    pub fn monolithic(width: usize, height: usize) -> Self {
        Self::with_beam_center(width, height, 1, 1, width as f32 / 2.0, height as f32 / 2.0)
    }

    pub fn width(&self) -> usize {
        self.asic_nx * self.nasics_x
    }

    pub fn height(&self) -> usize {
        self.asic_ny * self.nasics_y
    }

    pub fn num_tiles(&self) -> usize {
        self.nasics_x * self.nasics_y
    }

    pub fn radius_map(&self) -> &Frame {
        &self.radius_map
    }

    pub fn radius(&self, idx: usize) -> f32 {
        self.radius_map.data()[idx]
    }

    /// Largest integer radius present in the map, used to size per-tile radial bins.
    pub fn max_radius_bin(&self) -> usize {
        self.radius_map
            .data()
            .iter()
            .fold(0.0f32, |acc, r| acc.max(*r))
            .ceil() as usize
    }

    /// Pixel bounds `(fs_start, ss_start)` of tile number `tile`, tiles numbered row-major.
    pub fn tile_origin(&self, tile: usize) -> (usize, usize) {
        let tx = tile % self.nasics_x;
        let ty = tile / self.nasics_x;
        (tx * self.asic_nx, ty * self.asic_ny)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_beam_center_radius_map() {
        let geometry = GeometryInfo::with_beam_center(4, 4, 2, 1, 4.0, 2.0);
        assert_eq!(geometry.width(), 8);
        assert_eq!(geometry.height(), 4);
        assert_eq!(geometry.radius_map().get(4, 2), 0.0);
        assert_eq!(geometry.radius_map().get(7, 2), 3.0);
        assert_eq!(geometry.radius_map().get(4, 0), 2.0);
        assert_eq!(geometry.max_radius_bin(), 5);
    }

    #[test]
    fn test_tile_origins_are_row_major() {
        let geometry = GeometryInfo::with_beam_center(3, 2, 2, 2, 0.0, 0.0);
        assert_eq!(geometry.num_tiles(), 4);
        assert_eq!(geometry.tile_origin(0), (0, 0));
        assert_eq!(geometry.tile_origin(1), (3, 0));
        assert_eq!(geometry.tile_origin(2), (0, 2));
        assert_eq!(geometry.tile_origin(3), (3, 2));
    }

    #[test]
    fn test_new_rejects_mismatched_radius_map() {
        let result = GeometryInfo::new(4, 4, 2, 2, Frame::zeros(8, 4));
        assert!(result.is_err());
    }
}

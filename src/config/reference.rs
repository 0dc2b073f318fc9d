// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Loading of reference arrays (dark, gain, mask, radius map, calibration constants).
//!
//! Arrays are stored as JSON objects `{ "width": W, "height": H, "data": [...] }` with
//! `data` in row-major order. Calibration constants use
//! `{ "width": W, "height": H, "cells": [{ "offset": [...], "gain": [...] }, ...] }`.
//! Everything here runs once at startup; the results are immutable afterwards.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::errors::{ConfigError, ShapeError};
use crate::model::{Frame, Mask};
use crate::pipeline::{CalibrationConstants, CellConstants};

#[derive(Debug, Serialize, Deserialize)]
struct ArrayFile {
    width: usize,
    height: usize,
    data: Vec<f32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CellFile {
    offset: Vec<f32>,
    gain: Vec<f32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CalibrationFile {
    width: usize,
    height: usize,
    cells: Vec<CellFile>,
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, ConfigError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::ReadFailed {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|e| ConfigError::ReferenceArray {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

fn shape_error(path: &Path, error: impl std::fmt::Display) -> ConfigError {
    ConfigError::ReferenceArray {
        path: path.to_path_buf(),
        reason: error.to_string(),
    }
}

pub fn load_frame(path: impl AsRef<Path>) -> Result<Frame, ConfigError> {
    let path = path.as_ref();
    let file: ArrayFile = read_json(path)?;
    Frame::new(file.width, file.height, file.data).map_err(|e| shape_error(path, e))
}

/// Loads a bad-pixel mask. Any non-zero entry marks a bad pixel.
pub fn load_mask(path: impl AsRef<Path>) -> Result<Mask, ConfigError> {
    load_frame(path).map(|frame| Mask::from_frame(&frame))
}

pub fn load_calibration(path: impl AsRef<Path>) -> Result<CalibrationConstants, ConfigError> {
    let path = path.as_ref();
    let file: CalibrationFile = read_json(path)?;
    let (width, height) = (file.width, file.height);
    let cells = file
        .cells
        .into_iter()
        .map(|cell| -> Result<CellConstants, ShapeError> {
            Ok(CellConstants {
                offset: Frame::new(width, height, cell.offset)?,
                gain: Frame::new(width, height, cell.gain)?,
            })
        })
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| shape_error(path, e))?;
    CalibrationConstants::new(cells).map_err(|reason| shape_error(path, reason))
}

/// Writes a frame in the same format `load_frame` reads.
pub fn save_frame(path: impl AsRef<Path>, frame: &Frame) -> Result<(), ConfigError> {
    let path = path.as_ref();
    let file = ArrayFile {
        width: frame.width(),
        height: frame.height(),
        data: frame.data().to_vec(),
    };
    let text = serde_json::to_string(&file).map_err(|e| shape_error(path, e))?;
    fs::write(path, text).map_err(|source| ConfigError::ReadFailed {
        path: path.to_path_buf(),
        source,
    })
}

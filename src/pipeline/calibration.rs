// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::errors::EventError;
use crate::model::Frame;

/// Offset and gain tables for one memory cell.
#[derive(Debug, Clone, PartialEq)]
pub struct CellConstants {
    pub offset: Frame,
    pub gain: Frame,
}

/// Calibration constants for every memory cell of the detector, all of one shape.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationConstants {
    cells: Vec<CellConstants>,
    width: usize,
    height: usize,
}

impl CalibrationConstants {
    pub fn new(cells: Vec<CellConstants>) -> Result<Self, String> {
        let first = cells.first().ok_or("calibration constants need at least one cell")?;
        let (width, height) = first.offset.shape();
        for (i, cell) in cells.iter().enumerate() {
            if cell.offset.shape() != (width, height) || cell.gain.shape() != (width, height) {
                return Err(format!("cell {} does not match the {}x{} shape of cell 0", i, width, height));
            }
        }
        Ok(Self { cells, width, height })
    }

    pub fn num_cells(&self) -> usize {
        self.cells.len()
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    pub fn cell(&self, id: usize) -> Option<&CellConstants> {
        self.cells.get(id)
    }
}

/// Maps raw detector values to calibrated ones: `(raw - offset) * gain`, with the tables of
/// the memory cell the frame was recorded in.
#[derive(Debug, Clone)]
pub struct Calibration {
    constants: CalibrationConstants,
}

impl Calibration {
    pub fn new(constants: CalibrationConstants) -> Self {
        Self { constants }
    }

    /// A frame without a cell id is only accepted when a single cell is loaded.
    pub fn apply(&self, mut frame: Frame, cell_id: Option<i64>) -> Result<Frame, EventError> {
        let num_cells = self.constants.num_cells();
        let cell_id = match cell_id {
            Some(id) => id,
            None if num_cells == 1 => 0,
            None => {
                return Err(EventError::Calibration(format!(
                    "event has no cell id and {} cells are loaded",
                    num_cells
                )))
            }
        };
        let cell = usize::try_from(cell_id)
            .ok()
            .and_then(|id| self.constants.cell(id))
            .ok_or_else(|| {
                EventError::Calibration(format!("no constants for cell {} ({} cells loaded)", cell_id, num_cells))
            })?;
        let (width, height) = self.constants.shape();
        frame
            .check_shape(width, height)
            .map_err(|e| EventError::Calibration(e.to_string()))?;

        for ((value, offset), gain) in frame
            .data_mut()
            .iter_mut()
            .zip(cell.offset.data())
            .zip(cell.gain.data())
        {
            *value = (*value - offset) * gain;
        }
        Ok(frame)
    }
}

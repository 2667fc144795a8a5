use rand::Rng;

/// Error types for the placement grid.
#[derive(Debug, thiserror::Error)]
pub enum GridError {
    /// The background is too small for even one cell of the average footprint
    #[error("background {bg_width}x{bg_height} fits no {cell_width}x{cell_height} cell")]
    NoCells {
        bg_width: u32,
        bg_height: u32,
        cell_width: u32,
        cell_height: u32,
    },
}

/// A uniform grid of candidate paste positions over a background image.
///
/// Cell centers are enumerated row-major and consumed without replacement;
/// each slot holds at most one object.
#[derive(Debug, Clone)]
pub struct PlacementGrid {
    slots: Vec<(i64, i64)>,
    columns: u32,
    rows: u32,
}

impl PlacementGrid {
    /// Build the grid from the background size and the average rendered
    /// footprint. `columns = bg_width / cell_width` and
    /// `rows = bg_height / cell_height` by integer division; cell centers are
    /// `(cell_width / 2 + col * cell_width, cell_height / 2 + row * cell_height)`.
    pub fn build(
        bg_width: u32,
        bg_height: u32,
        cell_width: u32,
        cell_height: u32,
    ) -> Result<Self, GridError> {
        let columns = if cell_width > 0 { bg_width / cell_width } else { 0 };
        let rows = if cell_height > 0 { bg_height / cell_height } else { 0 };
        if columns == 0 || rows == 0 {
            return Err(GridError::NoCells {
                bg_width,
                bg_height,
                cell_width,
                cell_height,
            });
        }

        let mut slots = Vec::with_capacity((columns * rows) as usize);
        for row in 0..rows {
            for col in 0..columns {
                let x = (cell_width / 2 + col * cell_width) as i64;
                let y = (cell_height / 2 + row * cell_height) as i64;
                slots.push((x, y));
            }
        }

        Ok(Self {
            slots,
            columns,
            rows,
        })
    }

    pub fn columns(&self) -> u32 {
        self.columns
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    pub fn remaining(&self) -> usize {
        self.slots.len()
    }

    /// Consume a uniformly random unused slot, or `None` once exhausted.
    pub fn take_random<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Option<(i64, i64)> {
        if self.slots.is_empty() {
            return None;
        }
        let index = rng.gen_range(0..self.slots.len());
        Some(self.slots.swap_remove(index))
    }
}

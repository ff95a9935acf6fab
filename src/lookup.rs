//! Nearest-neighbour navigation over the picture model.
//!
//! All queries are pure: they only read the already-built stacks. Ties go to
//! the lowest image id, but callers should not depend on that.

use crate::error::LookupError;
use crate::picture::{ParallaxImage, ParallaxStack, RefocusImage, RefocusStack};

impl RefocusStack {
    /// Image whose lambda is closest to `lambda`.
    pub fn find_by_lambda(&self, lambda: f64) -> Result<&RefocusImage, LookupError> {
        if !lambda.is_finite() {
            return Err(LookupError::NonFinite);
        }
        self.images
            .values()
            .min_by(|a, b| (a.lambda - lambda).abs().total_cmp(&(b.lambda - lambda).abs()))
            .ok_or(LookupError::EmptyStack("refocus stack"))
    }

    /// Image in focus at depth-LUT cell `(i, j)`.
    pub fn find_most_focused(&self, i: usize, j: usize) -> Result<&RefocusImage, LookupError> {
        let lut = &self.depth_lut;
        let lambda = lut.get(i, j).ok_or(LookupError::CellOutOfRange {
            i,
            j,
            width:  lut.width,
            height: lut.height,
        })?;
        self.find_by_lambda(f64::from(lambda))
    }

    /// Image in focus at normalized position `(fx, fy)` in `[0, 1)`.
    /// Positions outside the range clamp to the border cells.
    pub fn find_by_position(&self, fx: f64, fy: f64) -> Result<&RefocusImage, LookupError> {
        let (i, j) = self.cell_at(fx, fy)?;
        self.find_most_focused(i, j)
    }

    /// Depth-LUT cell under normalized position `(fx, fy)`.
    pub fn cell_at(&self, fx: f64, fy: f64) -> Result<(usize, usize), LookupError> {
        if !fx.is_finite() || !fy.is_finite() {
            return Err(LookupError::NonFinite);
        }
        let lut = &self.depth_lut;
        if lut.width == 0 || lut.height == 0 {
            return Err(LookupError::EmptyStack("depth LUT"));
        }
        Ok((cell_index(fx, lut.width), cell_index(fy, lut.height)))
    }
}

impl ParallaxStack {
    /// Image whose viewpoint is nearest to normalized `(fx, fy)`, where
    /// `(0.5, 0.5)` is the centre of the viewpoint range.
    pub fn find_by_viewpoint(&self, fx: f64, fy: f64) -> Result<&ParallaxImage, LookupError> {
        let (x, y) = self.viewpoint_at(fx, fy)?;
        let dist2 = |img: &ParallaxImage| {
            let dx = img.coord.0 - x;
            let dy = img.coord.1 - y;
            dx * dx + dy * dy
        };
        self.images
            .values()
            .min_by(|a, b| dist2(a).total_cmp(&dist2(b)))
            .ok_or(LookupError::EmptyStack("parallax stack"))
    }

    /// Signed viewpoint coordinate for normalized `(fx, fy)`, clamped to
    /// `[0, 1]`.
    pub fn viewpoint_at(&self, fx: f64, fy: f64) -> Result<(f64, f64), LookupError> {
        if !fx.is_finite() || !fy.is_finite() {
            return Err(LookupError::NonFinite);
        }
        Ok((
            (fx.clamp(0.0, 1.0) - 0.5) * self.viewpoint_width,
            (fy.clamp(0.0, 1.0) - 0.5) * self.viewpoint_height,
        ))
    }
}

#[inline]
fn cell_index(f: f64, n: usize) -> usize {
    let scaled = (f * n as f64).floor();
    if scaled <= 0.0 {
        0
    } else {
        (scaled as usize).min(n - 1)
    }
}

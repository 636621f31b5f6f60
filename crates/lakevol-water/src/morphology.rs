//! Binary morphology on water masks.
//!
//! Pixels outside the grid are treated as non-water for both erosion and
//! dilation.

use ndarray::Array2;

fn window(center: usize, radius: usize, len: usize) -> (usize, usize) {
    (center.saturating_sub(radius), (center + radius + 1).min(len))
}

/// Binary erosion with a square `(2*radius+1)` kernel.
pub fn erode(mask: &Array2<bool>, radius: usize) -> Array2<bool> {
    let (rows, cols) = mask.dim();
    Array2::from_shape_fn((rows, cols), |(r, c)| {
        // Kernel falls off the grid, so an outside pixel is in the neighborhood
        if r < radius || c < radius || r + radius >= rows || c + radius >= cols {
            return false;
        }
        let (r0, r1) = window(r, radius, rows);
        let (c0, c1) = window(c, radius, cols);
        (r0..r1).all(|rr| (c0..c1).all(|cc| mask[[rr, cc]]))
    })
}

/// Binary dilation with a square `(2*radius+1)` kernel.
pub fn dilate(mask: &Array2<bool>, radius: usize) -> Array2<bool> {
    let (rows, cols) = mask.dim();
    Array2::from_shape_fn((rows, cols), |(r, c)| {
        let (r0, r1) = window(r, radius, rows);
        let (c0, c1) = window(c, radius, cols);
        (r0..r1).any(|rr| (c0..c1).any(|cc| mask[[rr, cc]]))
    })
}

/// Morphological opening (erosion then dilation) with a square kernel of
/// side `kernel`.
///
/// Removes water features narrower than the kernel while keeping the shape of
/// larger bodies.
pub fn opening(mask: &Array2<bool>, kernel: usize) -> Array2<bool> {
    let radius = kernel / 2;
    if radius == 0 {
        return mask.clone();
    }
    dilate(&erode(mask, radius), radius)
}

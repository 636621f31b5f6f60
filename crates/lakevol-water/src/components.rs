//! 4-connected component labeling.

use ndarray::Array2;
use std::collections::VecDeque;

/// One labeled component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Component {
    /// Label value in [`Components::labels`] (starting at 1).
    pub label: u32,
    /// Number of pixels.
    pub pixels: usize,
    /// First row touched.
    pub min_row: usize,
    /// Last row touched.
    pub max_row: usize,
    /// First column touched.
    pub min_col: usize,
    /// Last column touched.
    pub max_col: usize,
}

/// Label raster plus per-component statistics.
///
/// Labels are assigned in row-major scan order of each component's first
/// pixel, so label order doubles as the scan-order tie break.
#[derive(Debug, Clone)]
pub struct Components {
    /// 0 for background, otherwise the component label.
    pub labels: Array2<u32>,
    /// Components ordered by label.
    pub components: Vec<Component>,
}

impl Components {
    /// Number of components.
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Whether there are no components.
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Largest component by pixel count, earliest label on ties.
    pub fn largest(&self) -> Option<&Component> {
        self.components
            .iter()
            .fold(None, |best: Option<&Component>, c| match best {
                Some(b) if b.pixels >= c.pixels => Some(b),
                _ => Some(c),
            })
    }
}

/// Label the 4-connected components of `mask`.
pub fn label_components(mask: &Array2<bool>) -> Components {
    let (rows, cols) = mask.dim();
    let mut labels = Array2::<u32>::zeros((rows, cols));
    let mut components = Vec::new();
    let mut queue = VecDeque::new();

    for row in 0..rows {
        for col in 0..cols {
            if !mask[[row, col]] || labels[[row, col]] != 0 {
                continue;
            }

            let label = components.len() as u32 + 1;
            let mut component = Component {
                label,
                pixels: 0,
                min_row: row,
                max_row: row,
                min_col: col,
                max_col: col,
            };

            labels[[row, col]] = label;
            queue.push_back((row, col));
            while let Some((r, c)) = queue.pop_front() {
                component.pixels += 1;
                component.min_row = component.min_row.min(r);
                component.max_row = component.max_row.max(r);
                component.min_col = component.min_col.min(c);
                component.max_col = component.max_col.max(c);

                let neighbors = [
                    (r.wrapping_sub(1), c),
                    (r + 1, c),
                    (r, c.wrapping_sub(1)),
                    (r, c + 1),
                ];
                for (nr, nc) in neighbors {
                    if nr < rows && nc < cols && mask[[nr, nc]] && labels[[nr, nc]] == 0 {
                        labels[[nr, nc]] = label;
                        queue.push_back((nr, nc));
                    }
                }
            }
            components.push(component);
        }
    }

    Components { labels, components }
}

/// Drop components smaller than `min_pixels`.
pub fn remove_small_components(mask: &Array2<bool>, min_pixels: usize) -> Array2<bool> {
    if min_pixels <= 1 {
        return mask.clone();
    }
    let labeled = label_components(mask);
    let keep: Vec<bool> = std::iter::once(false)
        .chain(labeled.components.iter().map(|c| c.pixels >= min_pixels))
        .collect();
    labeled.labels.mapv(|label| keep[label as usize])
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;

    #[test]
    fn test_diagonal_pixels_are_separate() {
        let mask = arr2(&[[true, false], [false, true]]);
        let labeled = label_components(&mask);
        assert_eq!(labeled.len(), 2);
        assert_eq!(labeled.labels, arr2(&[[1, 0], [0, 2]]));
    }

    #[test]
    fn test_component_statistics() {
        let mask = arr2(&[
            [false, true, true, false],
            [false, true, false, false],
            [false, false, false, true],
        ]);
        let labeled = label_components(&mask);
        assert_eq!(labeled.len(), 2);
        let first = labeled.components[0];
        assert_eq!(first.pixels, 3);
        assert_eq!((first.min_row, first.max_row, first.min_col, first.max_col), (0, 1, 1, 2));
        assert_eq!(labeled.largest().map(|c| c.label), Some(1));
    }

    #[test]
    fn test_largest_tie_prefers_scan_order() {
        let mask = arr2(&[[true, false, true], [true, false, true]]);
        let labeled = label_components(&mask);
        assert_eq!(labeled.largest().map(|c| c.label), Some(1));
    }

    #[test]
    fn test_remove_small_components() {
        let mask = arr2(&[
            [true, true, false, true],
            [true, true, false, false],
        ]);
        let cleaned = remove_small_components(&mask, 2);
        assert_eq!(
            cleaned,
            arr2(&[[true, true, false, false], [true, true, false, false]])
        );
    }

    #[test]
    fn test_empty_mask() {
        let labeled = label_components(&Array2::from_elem((3, 3), false));
        assert!(labeled.is_empty());
        assert!(labeled.largest().is_none());
    }
}

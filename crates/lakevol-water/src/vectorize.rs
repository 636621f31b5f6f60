//! Tracing water components into world-coordinate polygons.

use crate::components::{label_components, Component, Components};
use crate::index::WaterMask;
use chrono::NaiveDate;
use geo::orient::{Direction, Orient};
use geo::{Area, BoundingRect, Coord, LineString, MultiPolygon, Polygon};
use lakevol_common::units::m2_to_ha;
use lakevol_common::PolygonPolicy;
use lakevol_raster::{Bounds, GeoTransform};
use std::collections::HashMap;

/// Pixel corner `(x = col, y = row)`; y grows downward.
type Vertex = (i64, i64);

#[derive(Debug, Clone, Copy)]
struct Edge {
    from: Vertex,
    to: Vertex,
}

impl Edge {
    fn direction(&self) -> (i64, i64) {
        (self.to.0 - self.from.0, self.to.1 - self.from.1)
    }
}

/// Water region selected from one mask.
#[derive(Debug, Clone, PartialEq)]
pub struct WaterPolygon {
    /// World-coordinate geometry, `None` for the empty sentinel.
    pub geometry: Option<MultiPolygon<f64>>,
    /// Area in hectares.
    pub area_ha: f64,
    /// Source image id.
    pub image_id: String,
    /// Source image date.
    pub date: Option<NaiveDate>,
    /// Number of components in the geometry.
    pub component_count: usize,
    /// Number of water pixels in the geometry.
    pub pixel_count: usize,
}

impl WaterPolygon {
    /// Sentinel for an image with no water.
    pub fn empty(image_id: impl Into<String>, date: Option<NaiveDate>) -> Self {
        Self {
            geometry: None,
            area_ha: 0.0,
            image_id: image_id.into(),
            date,
            component_count: 0,
            pixel_count: 0,
        }
    }

    /// Whether this is the empty sentinel.
    pub fn is_empty(&self) -> bool {
        self.geometry.is_none()
    }

    /// World bounds of the geometry.
    pub fn bounds(&self) -> Option<Bounds> {
        let rect = self.geometry.as_ref()?.bounding_rect()?;
        Some(Bounds::new(rect.min().x, rect.min().y, rect.max().x, rect.max().y))
    }

    /// Select and vectorize water components from a mask.
    pub fn from_mask(
        mask: &WaterMask,
        policy: PolygonPolicy,
        image_id: impl Into<String>,
        date: Option<NaiveDate>,
    ) -> Self {
        let image_id = image_id.into();
        let labeled = label_components(&mask.mask);

        let selected: Vec<&Component> = match policy {
            PolygonPolicy::LargestOnly => labeled.largest().into_iter().collect(),
            PolygonPolicy::MergeAll => labeled.components.iter().collect(),
        };
        if selected.is_empty() {
            return Self::empty(image_id, date);
        }

        let polygons: Vec<Polygon<f64>> = selected
            .iter()
            .filter_map(|c| trace_component(&labeled, c, &mask.transform))
            .collect();
        if polygons.is_empty() {
            return Self::empty(image_id, date);
        }

        let geometry = MultiPolygon::new(polygons);
        Self {
            area_ha: m2_to_ha(geometry.unsigned_area()),
            geometry: Some(geometry),
            image_id,
            date,
            component_count: selected.len(),
            pixel_count: selected.iter().map(|c| c.pixels).sum(),
        }
    }
}

/// Trace one labeled component into a polygon with holes.
///
/// Boundary edges run with the component on their right in pixel space. At a
/// vertex where the component touches itself diagonally the walk turns left
/// first, keeping each ring on one background pixel so that no ring visits
/// the vertex twice.
pub fn trace_component(
    labeled: &Components,
    component: &Component,
    transform: &GeoTransform,
) -> Option<Polygon<f64>> {
    let edges = boundary_edges(labeled, component);
    let rings = link_rings(&edges);

    let mut rings: Vec<Vec<Vertex>> = rings.into_iter().map(simplify_ring).filter(|r| r.len() >= 3).collect();
    if rings.is_empty() {
        return None;
    }

    let exterior_index = rings
        .iter()
        .enumerate()
        .map(|(i, ring)| (i, ring_area(ring).abs()))
        .fold((0, f64::NEG_INFINITY), |best, (i, a)| if a > best.1 { (i, a) } else { best })
        .0;
    let exterior = rings.swap_remove(exterior_index);

    let to_world = |ring: &[Vertex]| -> LineString<f64> {
        let coords: Vec<Coord<f64>> = ring
            .iter()
            .map(|&(x, y)| {
                let (wx, wy) = transform.apply(x as f64, y as f64);
                Coord { x: wx, y: wy }
            })
            .collect();
        LineString::from(coords)
    };

    let polygon = Polygon::new(to_world(&exterior), rings.iter().map(|r| to_world(r)).collect());
    Some(polygon.orient(Direction::Default))
}

fn boundary_edges(labeled: &Components, component: &Component) -> Vec<Edge> {
    let labels = &labeled.labels;
    let (rows, cols) = labels.dim();
    let label = component.label;
    let inside = |r: i64, c: i64| -> bool {
        r >= 0 && c >= 0 && (r as usize) < rows && (c as usize) < cols && labels[[r as usize, c as usize]] == label
    };

    let mut edges = Vec::new();
    for row in component.min_row..=component.max_row {
        for col in component.min_col..=component.max_col {
            if labels[[row, col]] != label {
                continue;
            }
            let (r, c) = (row as i64, col as i64);
            if !inside(r - 1, c) {
                edges.push(Edge { from: (c, r), to: (c + 1, r) });
            }
            if !inside(r, c + 1) {
                edges.push(Edge { from: (c + 1, r), to: (c + 1, r + 1) });
            }
            if !inside(r + 1, c) {
                edges.push(Edge { from: (c + 1, r + 1), to: (c, r + 1) });
            }
            if !inside(r, c - 1) {
                edges.push(Edge { from: (c, r + 1), to: (c, r) });
            }
        }
    }
    edges
}

fn link_rings(edges: &[Edge]) -> Vec<Vec<Vertex>> {
    let mut outgoing: HashMap<Vertex, Vec<usize>> = HashMap::new();
    for (i, edge) in edges.iter().enumerate() {
        outgoing.entry(edge.from).or_default().push(i);
    }

    let mut used = vec![false; edges.len()];
    let mut rings = Vec::new();

    for start in 0..edges.len() {
        if used[start] {
            continue;
        }
        used[start] = true;
        let mut ring = vec![edges[start].from];
        let mut current = start;

        loop {
            let (dx, dy) = edges[current].direction();
            // left, straight, right (y grows downward)
            let preferences = [(dy, -dx), (dx, dy), (-dy, dx)];
            let candidates = outgoing.get(&edges[current].to).map(Vec::as_slice).unwrap_or(&[]);

            let next = preferences.iter().find_map(|want| {
                candidates
                    .iter()
                    .copied()
                    .find(|&i| (i == start || !used[i]) && edges[i].direction() == *want)
            });

            match next {
                Some(i) if i == start => break,
                Some(i) => {
                    used[i] = true;
                    ring.push(edges[i].from);
                    current = i;
                }
                None => break,
            }
        }
        rings.push(ring);
    }
    rings
}

/// Drop vertices in the middle of straight runs.
fn simplify_ring(ring: Vec<Vertex>) -> Vec<Vertex> {
    let n = ring.len();
    if n < 4 {
        return ring;
    }
    (0..n)
        .filter(|&i| {
            let prev = ring[(i + n - 1) % n];
            let cur = ring[i];
            let next = ring[(i + 1) % n];
            let d_in = ((cur.0 - prev.0).signum(), (cur.1 - prev.1).signum());
            let d_out = ((next.0 - cur.0).signum(), (next.1 - cur.1).signum());
            d_in != d_out
        })
        .map(|i| ring[i])
        .collect()
}

/// Shoelace area of an open ring in pixel units.
fn ring_area(ring: &[Vertex]) -> f64 {
    let n = ring.len();
    let twice: i64 = (0..n)
        .map(|i| {
            let (x0, y0) = ring[i];
            let (x1, y1) = ring[(i + 1) % n];
            x0 * y1 - x1 * y0
        })
        .sum();
    twice as f64 / 2.0
}

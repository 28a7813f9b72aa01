use geo::{BoundingRect, Coord, Distance, Euclidean, MultiPolygon, Polygon, Rect};
use rstar::{RTree, AABB};

use crate::geom::{BoundingBox, Crs};

/// Geometries represents a collection of zone MultiPolygons with spatial relationships.
#[derive(Debug, Clone)]
pub(crate) struct Geometries {
    shapes: Vec<MultiPolygon<f64>>,
    rtree: RTree<BoundingBox>,
    crs: Crs,
}

impl Geometries {
    /// Construct a Geometries object from a vector of MultiPolygons
    pub(crate) fn new(polygons: &[MultiPolygon<f64>], crs: Crs) -> Self {
        Self {
            rtree: RTree::bulk_load(
                polygons
                    .iter()
                    .enumerate()
                    .filter_map(|(i, polygon)| {
                        polygon.bounding_rect().map(|rect| BoundingBox::new(i, rect))
                    })
                    .collect(),
            ),
            shapes: polygons.to_vec(),
            crs,
        }
    }

    /// Get the number of MultiPolygons.
    #[inline] pub(crate) fn len(&self) -> usize { self.shapes.len() }

    /// Check if there are no MultiPolygons.
    #[inline] pub(crate) fn is_empty(&self) -> bool { self.shapes.is_empty() }

    /// Get a reference to the list of MultiPolygons.
    #[inline] pub(crate) fn shapes(&self) -> &Vec<MultiPolygon<f64>> { &self.shapes }

    /// Get the coordinate system the shapes are expressed in.
    #[inline] pub(crate) fn crs(&self) -> &Crs { &self.crs }

    /// Query the R-tree for shape indices whose bounding boxes intersect the envelope.
    #[inline]
    pub(crate) fn query(&self, envelope: &AABB<[f64; 2]>) -> impl Iterator<Item = usize> + '_ {
        self.rtree.locate_in_envelope_intersecting(envelope).map(|bb| bb.idx())
    }

    /// Compute the bounding rectangle of all MultiPolygons.
    pub(crate) fn bounds(&self) -> Option<Rect<f64>> {
        self.shapes
            .iter()
            .filter_map(|polygon| polygon.bounding_rect())
            .reduce(|a, b| {
                Rect::new(
                    Coord { x: a.min().x.min(b.min().x), y: a.min().y.min(b.min().y) },
                    Coord { x: a.max().x.max(b.max().x), y: a.max().y.max(b.max().y) },
                )
            })
    }

    /// Find the shape nearest to `probe` by boundary-to-boundary Euclidean
    /// distance, together with that distance. Zero for overlapping shapes.
    pub(crate) fn nearest(&self, probe: &Polygon<f64>) -> Option<(usize, f64)> {
        self.shapes
            .iter()
            .enumerate()
            .filter_map(|(i, shape)| {
                shape
                    .0
                    .iter()
                    .map(|part| Euclidean.distance(probe, part))
                    .min_by(f64::total_cmp)
                    .map(|d| (i, d))
            })
            .min_by(|a, b| a.1.total_cmp(&b.1))
    }
}

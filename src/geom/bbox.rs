use geo::Rect;
use rstar::{RTreeObject, AABB};

/// R-tree entry tying one shape's axis-aligned extent to its position in the
/// owning shape list. Corners are stored inline; envelope checks never touch
/// the shapes.
#[derive(Debug, Clone)]
pub(super) struct BoundingBox {
    idx: usize,
    min: [f64; 2],
    max: [f64; 2],
}

impl BoundingBox {
    pub(super) fn new(idx: usize, rect: Rect<f64>) -> Self {
        Self { idx, min: [rect.min().x, rect.min().y], max: [rect.max().x, rect.max().y] }
    }

    /// Position of the shape this entry indexes.
    #[inline] pub(super) fn idx(&self) -> usize { self.idx }
}

impl RTreeObject for BoundingBox {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(self.min, self.max)
    }
}

use anyhow::{bail, Result};
use shapefile as shp;

/// Convert a shapefile Shape to geo::MultiPolygon<f64>.
/// Zone layers must be polygonal; any other shape kind is an input error.
pub(crate) fn shape_to_multipolygon(shape: shp::Shape) -> Result<geo::MultiPolygon<f64>> {
    match shape {
        shp::Shape::Polygon(p) => Ok(rings_to_multipolygon(&p)),
        other => bail!("expected polygon geometry, found {}", other.shapetype()),
    }
}

/// Convert shapefile::Polygon to geo::MultiPolygon<f64>
fn rings_to_multipolygon(p: &shp::Polygon) -> geo::MultiPolygon<f64> {
    /// Ensure first and last are the same for geo::LineString coords
    fn ensure_closed(coords: &mut Vec<geo::Coord<f64>>) {
        if !coords.is_empty() {
            if coords[0] != coords[coords.len() - 1] {
                coords.push(coords[0])
            }
        }
    }

    /// Get the signed area of a geo::Coord list (negative for hole)
    fn signed_area(pts: &[geo::Coord<f64>]) -> f64 {
        let mut a = 0.0;
        for w in pts.windows(2) {
            a += w[0].x * w[1].y - w[1].x * w[0].y;
        }
        a / 2.0
    }

    // 1) Convert each ring into a LineString (ensure closed)
    let mut ls_rings: Vec<(geo::LineString<f64>, bool /*is_exterior*/)> =
        Vec::with_capacity(p.rings().len());
    for ring in p.rings().iter() {
        let mut coords: Vec<geo::Coord<f64>> =
            ring.points().iter().map(|pt| geo::Coord { x: pt.x, y: pt.y }).collect();
        ensure_closed(&mut coords);
        let ls = geo::LineString(coords);
        // Shapefile convention: CW rings are exteriors, CCW rings are holes.
        let is_exterior = signed_area(&ls.0) < 0.0;
        ls_rings.push((ls, is_exterior));
    }

    // 2) Group: each exterior with its following holes (Shapefile stores rings in this order)
    let mut polys: Vec<geo::Polygon<f64>> = Vec::new();
    let mut current_exterior: Option<geo::LineString<f64>> = None;
    let mut current_holes: Vec<geo::LineString<f64>> = Vec::new();

    for (ls, is_exterior) in ls_rings {
        if is_exterior {
            // flush previous polygon
            if let Some(ext) = current_exterior.take() {
                polys.push(geo::Polygon::new(ext, current_holes));
                current_holes = Vec::new();
            }
            current_exterior = Some(ls);
        } else {
            current_holes.push(ls);
        }
    }
    if let Some(ext) = current_exterior {
        polys.push(geo::Polygon::new(ext, current_holes));
    }

    geo::MultiPolygon(polys)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::Area;
    use shapefile::{Point, PolygonRing};

    #[test]
    fn single_ring_polygon_converts() {
        // CW exterior ring per shapefile convention
        let ring = PolygonRing::Outer(vec![
            Point::new(0.0, 0.0),
            Point::new(0.0, 2.0),
            Point::new(2.0, 2.0),
            Point::new(2.0, 0.0),
            Point::new(0.0, 0.0),
        ]);
        let shape = shp::Shape::Polygon(shp::Polygon::with_rings(vec![ring]));

        let mp = shape_to_multipolygon(shape).unwrap();
        assert_eq!(mp.0.len(), 1);
        assert!((mp.unsigned_area() - 4.0).abs() < 1e-12);
    }

    #[test]
    fn hole_ring_attaches_to_exterior() {
        let outer = PolygonRing::Outer(vec![
            Point::new(0.0, 0.0),
            Point::new(0.0, 4.0),
            Point::new(4.0, 4.0),
            Point::new(4.0, 0.0),
            Point::new(0.0, 0.0),
        ]);
        let hole = PolygonRing::Inner(vec![
            Point::new(1.0, 1.0),
            Point::new(3.0, 1.0),
            Point::new(3.0, 3.0),
            Point::new(1.0, 3.0),
            Point::new(1.0, 1.0),
        ]);
        let shape = shp::Shape::Polygon(shp::Polygon::with_rings(vec![outer, hole]));

        let mp = shape_to_multipolygon(shape).unwrap();
        assert_eq!(mp.0.len(), 1);
        assert_eq!(mp.0[0].interiors().len(), 1);
        assert!((mp.unsigned_area() - 12.0).abs() < 1e-12);
    }

    #[test]
    fn non_polygon_shape_is_fatal() {
        let shape = shp::Shape::Point(Point::new(1.0, 1.0));
        assert!(shape_to_multipolygon(shape).is_err());
    }
}

use anyhow::{anyhow, bail, Context, Result};
use geo::{Coord, MapCoords, MultiPolygon};
use proj4rs::{proj::Proj as Proj4, transform::transform};

/// Coordinate reference system of a grid or zone layer.
///
/// proj4rs works from PROJ.4 strings, so EPSG codes are resolved through a
/// small table of the systems this toolkit encounters; anything else must be
/// supplied as a PROJ.4 string.
#[derive(Debug, Clone, PartialEq)]
pub enum Crs {
    Epsg(u32),
    Proj4(String),
    Unknown,
}

impl Crs {
    /// Resolve to a PROJ.4 string.
    pub fn proj4_string(&self) -> Result<String> {
        match self {
            Crs::Proj4(s) => Ok(s.clone()),
            Crs::Epsg(code) => proj4_for_epsg(*code)
                .map(str::to_string)
                .ok_or_else(|| anyhow!(
                    "no built-in PROJ.4 definition for EPSG:{code}; pass a PROJ.4 string instead"
                )),
            Crs::Unknown => bail!("coordinate system is unknown; cannot reproject"),
        }
    }

    /// True when both sides are known and denote the same system.
    pub fn matches(&self, other: &Crs) -> bool {
        !matches!(self, Crs::Unknown) && self == other
    }
}

impl std::fmt::Display for Crs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Crs::Epsg(code) => write!(f, "EPSG:{code}"),
            Crs::Proj4(s) => write!(f, "{s}"),
            Crs::Unknown => write!(f, "unknown"),
        }
    }
}

/// PROJ.4 definitions for the EPSG codes that show up in gridded inputs.
fn proj4_for_epsg(code: u32) -> Option<&'static str> {
    match code {
        4326 => Some("+proj=longlat +datum=WGS84 +no_defs"),
        4269 => Some("+proj=longlat +datum=NAD83 +no_defs"),
        // CONUS Albers equal area, the usual projection of population rasters
        5070 => Some(
            "+proj=aea +lat_0=23 +lon_0=-96 +lat_1=29.5 +lat_2=45.5 +x_0=0 +y_0=0 +datum=NAD83 +units=m +no_defs",
        ),
        3857 => Some(
            "+proj=merc +a=6378137 +b=6378137 +lat_ts=0 +lon_0=0 +x_0=0 +y_0=0 +k=1 +units=m +nadgrids=@null +no_defs",
        ),
        _ => None,
    }
}

/// Geographic systems feed proj4rs in radians; projected systems in their own units.
fn is_geographic(proj4: &str) -> bool {
    proj4.contains("+proj=longlat") || proj4.contains("+proj=latlong")
}

/// Reproject shapes between two known coordinate systems.
pub(crate) fn reproject_shapes(
    shapes: &[MultiPolygon<f64>],
    from: &Crs,
    to: &Crs,
) -> Result<Vec<MultiPolygon<f64>>> {
    let from_string = from.proj4_string()?;
    let to_string = to.proj4_string()?;

    let src = Proj4::from_proj_string(&from_string)
        .with_context(|| format!("failed to build source PROJ.4: {from_string}"))?;
    let dst = Proj4::from_proj_string(&to_string)
        .with_context(|| format!("failed to build target PROJ.4: {to_string}"))?;

    let src_geographic = is_geographic(&from_string);
    let dst_geographic = is_geographic(&to_string);

    shapes
        .iter()
        .map(|shape| {
            shape.try_map_coords(|coord: Coord<f64>| {
                let mut point = if src_geographic {
                    (coord.x.to_radians(), coord.y.to_radians(), 0.0)
                } else {
                    (coord.x, coord.y, 0.0)
                };
                transform(&src, &dst, &mut point)
                    .map_err(|e| anyhow!("CRS transform failed: {e}"))?;
                Ok(if dst_geographic {
                    Coord { x: point.0.to_degrees(), y: point.1.to_degrees() }
                } else {
                    Coord { x: point.0, y: point.1 }
                })
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    #[test]
    fn epsg_table_resolves_known_codes() {
        assert!(Crs::Epsg(4326).proj4_string().unwrap().contains("longlat"));
        assert!(Crs::Epsg(5070).proj4_string().unwrap().contains("aea"));
        assert!(Crs::Epsg(999_999).proj4_string().is_err());
        assert!(Crs::Unknown.proj4_string().is_err());
    }

    #[test]
    fn matches_requires_known_and_equal() {
        assert!(Crs::Epsg(4326).matches(&Crs::Epsg(4326)));
        assert!(!Crs::Epsg(4326).matches(&Crs::Epsg(4269)));
        assert!(!Crs::Unknown.matches(&Crs::Unknown));
    }

    #[test]
    fn wgs84_to_webmercator_round_trip() {
        let shapes = vec![MultiPolygon(vec![polygon![
            (x: -96.0, y: 30.0),
            (x: -95.0, y: 30.0),
            (x: -95.0, y: 31.0),
            (x: -96.0, y: 31.0),
            (x: -96.0, y: 30.0),
        ]])];

        let projected =
            reproject_shapes(&shapes, &Crs::Epsg(4326), &Crs::Epsg(3857)).unwrap();
        // Web mercator x is linear in longitude: -96 deg is about -10.7e6 m.
        let first = projected[0].0[0].exterior().0[0];
        assert!((first.x + 10_686_671.0).abs() < 10.0, "x was {}", first.x);

        let back =
            reproject_shapes(&projected, &Crs::Epsg(3857), &Crs::Epsg(4326)).unwrap();
        let coord = back[0].0[0].exterior().0[0];
        assert!((coord.x + 96.0).abs() < 1e-6);
        assert!((coord.y - 30.0).abs() < 1e-6);
    }
}

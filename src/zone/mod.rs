use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use ahash::AHashMap;
use anyhow::{bail, ensure, Context, Result};
use geo::MultiPolygon;
use shapefile::dbase::{FieldValue, Record};

use crate::common;
use crate::geom::{reproject_shapes, Crs, Geometries};

/// Stable key for a zone. Keeps the original id text (with leading zeros)
/// but avoids repeated owned Strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ZoneId(Arc<str>);

impl ZoneId {
    #[inline] pub fn new(id: &str) -> Self { Self(Arc::from(id)) }

    #[inline] pub fn as_str(&self) -> &str { &self.0 }
}

impl From<&str> for ZoneId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl fmt::Display for ZoneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A zone's parent in the hierarchy: grouping id plus the code used in
/// output file names (e.g. a balancing authority number and abbreviation).
#[derive(Debug, Clone, PartialEq)]
pub struct Parent {
    pub id: ZoneId,
    pub code: String,
}

/// Static zone-to-parent lookup, read once per run.
#[derive(Debug, Clone, Default)]
pub struct ParentMap {
    entries: AHashMap<ZoneId, Parent>,
}

impl ParentMap {
    /// Read the mapping from a CSV file. Duplicate zone rows keep the first
    /// occurrence. `code_col` falls back to the parent id when absent.
    pub fn from_csv(
        path: &Path,
        zone_col: &str,
        parent_col: &str,
        code_col: Option<&str>,
    ) -> Result<Self> {
        let mut string_cols = vec![zone_col, parent_col];
        if let Some(code) = code_col {
            string_cols.push(code);
        }
        let df = common::read_csv_with_string_cols(path, &string_cols)?;

        let zones = df
            .column(zone_col)
            .with_context(|| format!("mapping file {} has no '{zone_col}' column", path.display()))?
            .str()?;
        let parents = df
            .column(parent_col)
            .with_context(|| {
                format!("mapping file {} has no '{parent_col}' column", path.display())
            })?
            .str()?;
        let codes = match code_col {
            Some(col) => Some(
                df.column(col)
                    .with_context(|| {
                        format!("mapping file {} has no '{col}' column", path.display())
                    })?
                    .str()?,
            ),
            None => None,
        };

        let mut entries = AHashMap::with_capacity(df.height());
        for row in 0..df.height() {
            let (Some(zone), Some(parent)) = (zones.get(row), parents.get(row)) else {
                continue; // incomplete mapping rows carry no information
            };
            let code = match codes {
                Some(col) => col.get(row).unwrap_or(parent).to_string(),
                None => parent.to_string(),
            };
            entries
                .entry(ZoneId::new(zone))
                .or_insert(Parent { id: ZoneId::new(parent), code });
        }
        ensure!(!entries.is_empty(), "mapping file {} contains no rows", path.display());

        Ok(Self { entries })
    }

    #[inline] pub fn len(&self) -> usize { self.entries.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    #[inline]
    pub fn get(&self, zone: &ZoneId) -> Option<&Parent> {
        self.entries.get(zone)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ZoneId, &Parent)> {
        self.entries.iter()
    }
}

/// The zone partition values are redistributed onto. Loaded once per run and
/// shared read-only across batch units.
#[derive(Debug, Clone)]
pub struct ZoneSet {
    ids: Vec<ZoneId>,
    names: Vec<Option<String>>,
    index: AHashMap<ZoneId, u32>,
    geoms: Geometries,
    parents: Option<Vec<Option<ZoneId>>>,
}

impl ZoneSet {
    /// Load zones from a polygon shapefile. The caller-named id field becomes
    /// the canonical zone id; a missing field is a configuration error.
    pub fn from_shapefile(path: &Path, id_field: &str, name_field: Option<&str>) -> Result<Self> {
        /// Get the value of a character field from a Record
        fn get_character_field(record: &Record, field: &str) -> Result<String> {
            match record.get(field) {
                Some(FieldValue::Character(Some(s))) => Ok(s.trim().to_string()),
                _ => bail!("There is no field named '{}' in the zone attribute data.", field),
            }
        }

        let mut reader = shapefile::Reader::from_path(path)
            .with_context(|| format!("Failed to open shapefile: {}", path.display()))?;

        let mut ids = Vec::new();
        let mut names = Vec::new();
        let mut shapes = Vec::new();
        for result in reader.iter_shapes_and_records() {
            let (shape, record) = result.context("Error reading shape and record")?;
            ids.push(ZoneId::new(&get_character_field(&record, id_field)?));
            names.push(match name_field {
                Some(field) => Some(get_character_field(&record, field)?),
                None => None,
            });
            shapes.push(common::shape_to_multipolygon(shape).with_context(|| {
                format!("Error converting shapes to multipolygons in shapefile: {}", path.display())
            })?);
        }

        Self::from_parts(ids, names, shapes, crs_from_prj(path))
            .with_context(|| format!("Invalid zone layer: {}", path.display()))
    }

    /// Assemble a set from already-loaded geometry. Ids must be unique.
    pub fn from_parts(
        ids: Vec<ZoneId>,
        names: Vec<Option<String>>,
        shapes: Vec<MultiPolygon<f64>>,
        crs: Crs,
    ) -> Result<Self> {
        ensure!(!ids.is_empty(), "zone layer contains no features");
        ensure!(
            ids.len() == shapes.len() && ids.len() == names.len(),
            "zone ids, names and shapes disagree in length"
        );

        let mut index = AHashMap::with_capacity(ids.len());
        for (i, id) in ids.iter().enumerate() {
            if index.insert(id.clone(), i as u32).is_some() {
                bail!("duplicate zone id '{}'", id);
            }
        }

        Ok(Self { geoms: Geometries::new(&shapes, crs), ids, names, index, parents: None })
    }

    #[inline] pub fn len(&self) -> usize { self.ids.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.ids.is_empty() }

    #[inline] pub fn ids(&self) -> &[ZoneId] { &self.ids }

    #[inline] pub fn id_at(&self, i: usize) -> &ZoneId { &self.ids[i] }

    #[inline]
    pub fn name_at(&self, i: usize) -> Option<&str> {
        self.names[i].as_deref()
    }

    #[inline]
    pub fn position(&self, id: &ZoneId) -> Option<u32> {
        self.index.get(id).copied()
    }

    #[inline] pub fn crs(&self) -> &Crs { self.geoms.crs() }

    #[inline]
    pub(crate) fn geoms(&self) -> &Geometries {
        &self.geoms
    }

    /// Reproject zone boundaries into another coordinate system in place.
    pub fn reproject_to(&mut self, to: &Crs) -> Result<()> {
        if self.geoms.crs().matches(to) {
            return Ok(());
        }
        let shapes = reproject_shapes(self.geoms.shapes(), self.geoms.crs(), to)?;
        self.geoms = Geometries::new(&shapes, to.clone());
        Ok(())
    }

    /// Subset the zones, preserving this set's order. Unknown ids are fatal.
    pub fn filter(&self, keep: &[ZoneId]) -> Result<Self> {
        for id in keep {
            ensure!(self.index.contains_key(id), "unknown zone id '{}' in filter", id);
        }
        let wanted: AHashMap<&ZoneId, ()> = keep.iter().map(|id| (id, ())).collect();

        let mut ids = Vec::with_capacity(keep.len());
        let mut names = Vec::with_capacity(keep.len());
        let mut shapes = Vec::with_capacity(keep.len());
        for (i, id) in self.ids.iter().enumerate() {
            if wanted.contains_key(id) {
                ids.push(id.clone());
                names.push(self.names[i].clone());
                shapes.push(self.geoms.shapes()[i].clone());
            }
        }
        Self::from_parts(ids, names, shapes, self.geoms.crs().clone())
    }

    /// Attach parent ids from a lookup table, computed once for the run.
    /// Zones absent from the mapping simply have no parent.
    pub fn assign_parents(&mut self, mapping: &ParentMap) {
        self.parents =
            Some(self.ids.iter().map(|id| mapping.get(id).map(|p| p.id.clone())).collect());
    }

    /// The parent of zone `i`, when parents are assigned and the zone has one.
    pub fn parent_of(&self, i: usize) -> Option<&ZoneId> {
        self.parents.as_ref()?.get(i)?.as_ref()
    }
}

/// Best-effort CRS detection from the shapefile's .prj sidecar. ESRI WKT
/// often has no AUTHORITY entry, so fall back to datum name sniffing.
fn crs_from_prj(shp_path: &Path) -> Crs {
    let Ok(wkt) = fs::read_to_string(shp_path.with_extension("prj")) else {
        return Crs::Unknown;
    };

    if let Some(pos) = wkt.rfind("\"EPSG\"") {
        let digits: String = wkt[pos + 6..]
            .chars()
            .skip_while(|c| !c.is_ascii_digit())
            .take_while(|c| c.is_ascii_digit())
            .collect();
        if let Ok(code) = digits.parse::<u32>() {
            return Crs::Epsg(code);
        }
    }
    if wkt.starts_with("GEOGCS") {
        if wkt.contains("North_American_1983") || wkt.contains("NAD83") {
            return Crs::Epsg(4269);
        }
        if wkt.contains("WGS_1984") || wkt.contains("WGS 84") {
            return Crs::Epsg(4326);
        }
    }
    Crs::Unknown
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    fn unit_square(x0: f64, y0: f64) -> MultiPolygon<f64> {
        MultiPolygon(vec![polygon![
            (x: x0, y: y0),
            (x: x0 + 1.0, y: y0),
            (x: x0 + 1.0, y: y0 + 1.0),
            (x: x0, y: y0 + 1.0),
            (x: x0, y: y0),
        ]])
    }

    fn three_zones() -> ZoneSet {
        ZoneSet::from_parts(
            vec![ZoneId::new("01001"), ZoneId::new("01003"), ZoneId::new("01005")],
            vec![Some("Autauga".into()), None, None],
            vec![unit_square(0.0, 0.0), unit_square(2.0, 0.0), unit_square(4.0, 0.0)],
            Crs::Unknown,
        )
        .unwrap()
    }

    #[test]
    fn ids_keep_leading_zeros() {
        let zones = three_zones();
        assert_eq!(zones.id_at(0).as_str(), "01001");
        assert_eq!(zones.id_at(0).to_string(), "01001");
        assert_eq!(zones.position(&ZoneId::new("01003")), Some(1));
        assert_eq!(zones.position(&ZoneId::new("99999")), None);
        assert_eq!(zones.name_at(0), Some("Autauga"));
        assert_eq!(zones.name_at(1), None);
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let result = ZoneSet::from_parts(
            vec![ZoneId::new("01"), ZoneId::new("01")],
            vec![None, None],
            vec![unit_square(0.0, 0.0), unit_square(2.0, 0.0)],
            Crs::Unknown,
        );
        assert!(result.is_err());
    }

    #[test]
    fn filter_preserves_set_order() {
        let zones = three_zones();
        let subset =
            zones.filter(&[ZoneId::new("01005"), ZoneId::new("01001")]).unwrap();
        let ids: Vec<&str> = subset.ids().iter().map(|id| id.as_str()).collect();
        assert_eq!(ids, vec!["01001", "01005"]);

        assert!(zones.filter(&[ZoneId::new("nope")]).is_err());
    }

    #[test]
    fn parents_come_from_the_mapping() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mapping.csv");
        fs::write(
            &path,
            "zone_id,parent_id,parent_code\n01001,14725,PJM\n01003,14725,PJM\n01001,99999,DUP\n",
        )
        .unwrap();

        let mapping =
            ParentMap::from_csv(&path, "zone_id", "parent_id", Some("parent_code")).unwrap();
        assert_eq!(mapping.len(), 2);
        // first occurrence wins for duplicated zones
        let parent = mapping.get(&ZoneId::new("01001")).unwrap();
        assert_eq!(parent.id.as_str(), "14725");
        assert_eq!(parent.code, "PJM");

        let mut zones = three_zones();
        assert_eq!(zones.parent_of(0), None);
        zones.assign_parents(&mapping);
        assert_eq!(zones.parent_of(0).unwrap().as_str(), "14725");
        assert_eq!(zones.parent_of(2), None);
    }
}

use std::path::Path;

use anyhow::{bail, ensure, Result};

/// Check that a year is a 4-digit integer in YYYY format.
pub fn validate_year(year: i32) -> Result<i32> {
    ensure!(
        (1000..10_000).contains(&year),
        "Value for year must be greater than year 1000 and less than year 10000. Passed value: '{year}'"
    );
    Ok(year)
}

/// Normalize a name for use in output file names: trimmed, lower case,
/// hyphen separated, periods removed.
pub fn validate_slug(value: Option<&str>) -> Result<String> {
    match value {
        Some(s) => Ok(s.trim().to_lowercase().replace('.', "").replace(' ', "-")),
        None => bail!("Must provide a name value if writing to file."),
    }
}

/// Check that two paired file lists agree positionally.
///
/// Each raster is paired with the cache at the same position; the two file
/// stems must share a leading name component (e.g. a region prefix) or the
/// caller has shuffled one of the lists.
pub fn validate_list_order(rasters: &[impl AsRef<Path>], caches: &[impl AsRef<Path>]) -> Result<()> {
    fn stem(path: &Path) -> &str {
        path.file_stem().and_then(|s| s.to_str()).unwrap_or("")
    }

    /// True when the stems share a leading `_`-delimited name component,
    /// or one stem is entirely a prefix of the other.
    fn shares_component(a: &str, b: &str) -> bool {
        let shared = a.bytes().zip(b.bytes()).take_while(|(x, y)| x == y).count();
        shared == a.len() || shared == b.len() || a.as_bytes()[..shared].contains(&b'_')
    }

    ensure!(
        rasters.len() == caches.len(),
        "Raster list has {} entries but cache list has {}; the lists must pair one-to-one.",
        rasters.len(),
        caches.len()
    );

    for (i, (raster, cache)) in rasters.iter().zip(caches.iter()).enumerate() {
        let raster_stem = stem(raster.as_ref());
        let cache_stem = stem(cache.as_ref());
        if raster_stem.is_empty()
            || cache_stem.is_empty()
            || !shares_component(raster_stem, cache_stem)
        {
            bail!(
                "Raster and cache lists are not ordered the same: position {i} pairs '{raster_stem}' with '{cache_stem}'."
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_four_digit_years() {
        assert_eq!(validate_year(2020).unwrap(), 2020);
        assert_eq!(validate_year(1000).unwrap(), 1000);
        assert_eq!(validate_year(9999).unwrap(), 9999);
    }

    #[test]
    fn rejects_out_of_span_years() {
        assert!(validate_year(777).is_err());
        assert!(validate_year(12777).is_err());
    }

    #[test]
    fn slug_lowercases_and_hyphenates() {
        assert_eq!(validate_slug(Some("SSP3")).unwrap(), "ssp3");
        assert_eq!(validate_slug(Some("District of Columbia")).unwrap(), "district-of-columbia");
        assert_eq!(validate_slug(Some(" v1.0 run ")).unwrap(), "v10-run");
    }

    #[test]
    fn slug_requires_a_value() {
        assert!(validate_slug(None).is_err());
    }

    #[test]
    fn matched_lists_pass() {
        let rasters = [
            "/some_dir/south_carolina_1km_ssp3_total_2020.tif",
            "/some_dir/virginia_1km_ssp3_total_2020.tif",
        ];
        let caches = [
            "/some_dir/south_carolina_population_to_county_area_weights.csv",
            "/some_dir/virginia_population_to_county_area_weights.csv",
        ];
        assert!(validate_list_order(&rasters, &caches).is_ok());
    }

    #[test]
    fn shuffled_lists_fail() {
        let rasters = [
            "/some_dir/south_carolina_1km_ssp3_total_2020.tif",
            "/some_dir/virginia_1km_ssp3_total_2020.tif",
        ];
        let shuffled = [
            "/some_dir/virginia_population_to_county_area_weights.csv",
            "/some_dir/south_carolina_population_to_county_area_weights.csv",
        ];
        assert!(validate_list_order(&rasters, &shuffled).is_err());
    }

    #[test]
    fn length_mismatch_fails() {
        let rasters = ["a_x.tif", "b_x.tif"];
        let caches = ["a_weights.csv"];
        assert!(validate_list_order(&rasters, &caches).is_err());
    }
}

use geo::Polygon;

use crate::weights::CellFragments;
use crate::zone::ZoneSet;

/// Relative tolerance under which a cell's covered area is taken to differ
/// from its nominal area by float noise rather than real geometry.
const COVERAGE_TOLERANCE: f64 = 1e-9;

/// Spread a cell's coverage shortfall evenly, in area units, across the zones
/// the cell touches, so the cell's full mass lands somewhere. A surplus from
/// overlapping zone polygons is spread the same way, shrinking the weights.
/// With a single touching zone this collapses to assigning the whole cell.
/// Returns whether an adjustment was applied.
pub(super) fn spread_shortfall(fragments: &mut CellFragments, nominal: f64) -> bool {
    let covered: f64 = fragments.iter().map(|fragment| fragment.1).sum();
    let shortfall = nominal - covered;
    if shortfall.abs() <= COVERAGE_TOLERANCE * nominal {
        return false;
    }
    let bump = shortfall / fragments.len() as f64;
    for fragment in fragments.iter_mut() {
        fragment.1 += bump;
    }
    true
}

/// Pick the receiving zone for a cell with no overlap at all: the zone whose
/// boundary is closest to the cell polygon. None only when there are no zones.
pub(super) fn route_orphan(zones: &ZoneSet, cell: &Polygon<f64>) -> Option<(usize, f64)> {
    zones.geoms().nearest(cell)
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;

    #[test]
    fn shortfall_spreads_evenly_over_touching_zones() {
        // 100 of 1000 nominal is unaccounted for; each of the two zones
        // picks up 50.
        let mut fragments: CellFragments = smallvec![(0, 600.0), (1, 300.0)];
        assert!(spread_shortfall(&mut fragments, 1000.0));
        assert_eq!(fragments[0].1, 650.0);
        assert_eq!(fragments[1].1, 350.0);
    }

    #[test]
    fn single_zone_sliver_inflates_to_full_cell() {
        let mut fragments: CellFragments = smallvec![(4, 1.5)];
        assert!(spread_shortfall(&mut fragments, 1000.0));
        assert_eq!(fragments[0].1, 1000.0);
    }

    #[test]
    fn surplus_from_overlapping_zones_shrinks_weights() {
        let mut fragments: CellFragments = smallvec![(0, 700.0), (1, 500.0)];
        assert!(spread_shortfall(&mut fragments, 1000.0));
        assert_eq!(fragments[0].1, 600.0);
        assert_eq!(fragments[1].1, 400.0);
    }

    #[test]
    fn float_noise_is_left_alone() {
        let mut fragments: CellFragments = smallvec![(0, 1000.0 - 1e-12)];
        assert!(!spread_shortfall(&mut fragments, 1000.0));
        assert_eq!(fragments[0].1, 1000.0 - 1e-12);
    }
}

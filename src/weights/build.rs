use anyhow::{bail, Result};
use geo::{Area, BooleanOps};
use rstar::AABB;

use crate::grid::Grid;
use crate::weights::{correct, CellFragments, WeightRecord, WeightTable};
use crate::zone::ZoneSet;

/// Overlay every considered cell against the zone partition and derive
/// area-share weights.
///
/// Worst case is cells x zones intersections; callers persist and reuse the
/// result. The per-cell correction pass (orphan routing, coverage spreading)
/// runs here, once per overlay; a table loaded from cache is used as-is.
pub fn build(grid: &Grid, zones: &ZoneSet, drop_nan: bool, verbose: u8) -> Result<WeightTable> {
    match (grid.crs(), zones.crs()) {
        (crate::geom::Crs::Unknown, _) | (_, crate::geom::Crs::Unknown) => {}
        (g, z) if !g.matches(z) => {
            bail!("grid is in {g} but zones are in {z}; reproject the zones first")
        }
        _ => {}
    }

    let nominal = grid.nominal_cell_area();
    let (half_x, half_y) = (grid.x_res() / 2.0, grid.y_res() / 2.0);
    let mut records = Vec::new();
    let (mut considered, mut orphans, mut adjusted) = (0usize, 0usize, 0usize);

    for cell in grid.cells(drop_nan) {
        considered += 1;
        let polygon = grid.polygon_of(&cell);
        let envelope =
            AABB::from_corners([cell.x - half_x, cell.y - half_y], [cell.x + half_x, cell.y + half_y]);

        let mut fragments = CellFragments::new();
        for idx in zones.geoms().query(&envelope) {
            let area = zones.geoms().shapes()[idx].intersection(&polygon).unsigned_area();
            if area > 0.0 {
                fragments.push((idx, area));
            }
        }

        if fragments.is_empty() {
            // stranded cell, its full mass goes to the closest boundary
            let Some((idx, distance)) = correct::route_orphan(zones, &polygon) else {
                bail!("no zones available to receive cell {}", cell.index);
            };
            if verbose > 1 {
                eprintln!(
                    "[weights] cell {} overlaps no zone; routed to {} at distance {distance:.3}",
                    cell.index,
                    zones.id_at(idx)
                );
            }
            records.push(WeightRecord {
                cell_index: cell.index,
                zone: zones.id_at(idx).clone(),
                weight: 1.0,
            });
            orphans += 1;
            continue;
        }

        if correct::spread_shortfall(&mut fragments, nominal) {
            adjusted += 1;
        }
        for (idx, area) in fragments {
            records.push(WeightRecord {
                cell_index: cell.index,
                zone: zones.id_at(idx).clone(),
                weight: area / nominal,
            });
        }
    }

    if verbose > 0 {
        eprintln!(
            "[weights] {} records over {considered} cells ({orphans} orphaned, {adjusted} coverage-adjusted)",
            records.len()
        );
    }
    Ok(WeightTable::new(records))
}

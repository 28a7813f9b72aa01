mod geotiff;

use anyhow::{ensure, Result};
use geo::{LineString, Polygon};
use ndarray::Array2;

use crate::geom::Crs;

/// Construct the area-bearing polygon of a grid cell from its centroid.
///
/// The ring runs counter-clockwise from the lower-left corner and is closed
/// (first coordinate repeated last). Each side extends half a resolution step
/// from the centroid.
pub fn cell_polygon(x: f64, y: f64, x_resolution: f64, y_resolution: f64) -> Polygon<f64> {
    let x_half_resolution = x_resolution / 2.0;
    let y_half_resolution = y_resolution / 2.0;

    let xmin = x - x_half_resolution;
    let xmax = x + x_half_resolution;
    let ymin = y - y_half_resolution;
    let ymax = y + y_half_resolution;

    Polygon::new(
        LineString::from(vec![
            (xmin, ymin),
            (xmax, ymin),
            (xmax, ymax),
            (xmin, ymax),
            (xmin, ymin),
        ]),
        vec![],
    )
}

/// One grid cell: stable enumeration index, centroid and sampled value.
///
/// Indices are assigned row-major over the full grid before any NaN dropping,
/// so they stay valid across fields that share the grid geometry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cell {
    pub index: u32,
    pub x: f64,
    pub y: f64,
    pub value: f64,
}

/// A regular single-field grid: values plus per-axis centroid coordinates.
#[derive(Debug, Clone)]
pub struct Grid {
    values: Array2<f64>, // row-major, [row][col]
    xs: Vec<f64>,        // column centroids
    ys: Vec<f64>,        // row centroids
    x_res: f64,
    y_res: f64,
    crs: Crs,
}

impl Grid {
    /// Assemble a grid from parts. No-data values are rewritten to NaN so a
    /// single sentinel covers both dropped and missing cells downstream.
    pub fn from_parts(
        values: Array2<f64>,
        xs: Vec<f64>,
        ys: Vec<f64>,
        x_res: f64,
        y_res: f64,
        nodata: Option<f64>,
        crs: Crs,
    ) -> Result<Self> {
        ensure!(
            x_res > 0.0 && y_res > 0.0,
            "grid resolution must be positive, got ({x_res}, {y_res})"
        );
        let (rows, cols) = values.dim();
        ensure!(xs.len() == cols, "expected {cols} column coordinates, got {}", xs.len());
        ensure!(ys.len() == rows, "expected {rows} row coordinates, got {}", ys.len());

        let mut values = values;
        if let Some(nd) = nodata {
            values.mapv_inplace(|v| if v == nd { f64::NAN } else { v });
        }

        Ok(Self { values, xs, ys, x_res, y_res, crs })
    }

    /// Number of rows and columns.
    #[inline] pub fn dims(&self) -> (usize, usize) { self.values.dim() }

    /// Total cell count, NaN cells included.
    #[inline] pub fn len(&self) -> usize { self.values.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.values.is_empty() }

    #[inline] pub fn x_res(&self) -> f64 { self.x_res }

    #[inline] pub fn y_res(&self) -> f64 { self.y_res }

    #[inline] pub fn crs(&self) -> &Crs { &self.crs }

    /// Area every cell covers before any intersection.
    #[inline] pub fn nominal_cell_area(&self) -> f64 { self.x_res * self.y_res }

    /// Enumerate cells row-major with stable indices. `drop_nan` skips cells
    /// whose value is NaN after index assignment.
    pub fn cells(&self, drop_nan: bool) -> impl Iterator<Item = Cell> + '_ {
        let cols = self.values.dim().1;
        self.values
            .indexed_iter()
            .map(move |((row, col), &value)| Cell {
                index: (row * cols + col) as u32,
                x: self.xs[col],
                y: self.ys[row],
                value,
            })
            .filter(move |cell| !(drop_nan && cell.value.is_nan()))
    }

    /// The polygon of a cell at this grid's resolution.
    #[inline]
    pub fn polygon_of(&self, cell: &Cell) -> Polygon<f64> {
        cell_polygon(cell.x, cell.y, self.x_res, self.y_res)
    }

    /// Look a value up by enumeration index; None when out of range.
    pub fn value_at(&self, index: u32) -> Option<f64> {
        let cols = self.values.dim().1;
        let (row, col) = (index as usize / cols, index as usize % cols);
        self.values.get((row, col)).copied()
    }

    /// Sum over non-NaN cells: the mass the aggregation is expected to conserve.
    pub fn considered_total(&self) -> f64 {
        self.values.iter().filter(|v| !v.is_nan()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{Area, Coord, Distance, Euclidean};
    use ndarray::array;

    #[test]
    fn polygon_from_centroid_has_expected_ring() {
        let poly = cell_polygon(70.5, 70.5, 1000.0, 1000.0);

        let expected = [
            Coord { x: -429.5, y: -429.5 },
            Coord { x: 570.5, y: -429.5 },
            Coord { x: 570.5, y: 570.5 },
            Coord { x: -429.5, y: 570.5 },
            Coord { x: -429.5, y: -429.5 },
        ];
        assert_eq!(poly.exterior().0, expected);

        let perimeter: f64 = poly
            .exterior()
            .lines()
            .map(|line| Euclidean.distance(line.start_point(), line.end_point()))
            .sum();
        assert!((perimeter - 4000.0).abs() < 1e-9);
        assert!((poly.unsigned_area() - 1_000_000.0).abs() < 1e-6);
        assert!(poly.signed_area() > 0.0, "ring must be counter-clockwise");
    }

    #[test]
    fn cells_enumerate_row_major_with_stable_indices() {
        let grid = Grid::from_parts(
            array![[1.0, f64::NAN], [3.0, 4.0]],
            vec![10.0, 20.0],
            vec![200.0, 100.0],
            10.0,
            10.0,
            None,
            Crs::Unknown,
        )
        .unwrap();

        let all: Vec<Cell> = grid.cells(false).collect();
        assert_eq!(all.len(), 4);
        assert_eq!(all[0].index, 0);
        assert_eq!((all[0].x, all[0].y), (10.0, 200.0));
        assert_eq!(all[3].index, 3);
        assert_eq!((all[3].x, all[3].y), (20.0, 100.0));

        // NaN dropping removes the cell but leaves sibling indices untouched.
        let kept: Vec<u32> = grid.cells(true).map(|c| c.index).collect();
        assert_eq!(kept, vec![0, 2, 3]);
    }

    #[test]
    fn nodata_becomes_nan() {
        let grid = Grid::from_parts(
            array![[7.0, -9999.0]],
            vec![0.0, 1.0],
            vec![0.0],
            1.0,
            1.0,
            Some(-9999.0),
            Crs::Unknown,
        )
        .unwrap();

        assert_eq!(grid.value_at(0), Some(7.0));
        assert!(grid.value_at(1).unwrap().is_nan());
        assert_eq!(grid.value_at(2), None);
        assert!((grid.considered_total() - 7.0).abs() < 1e-12);
    }

    #[test]
    fn mismatched_axes_are_rejected() {
        let result = Grid::from_parts(
            array![[1.0, 2.0]],
            vec![0.0],
            vec![0.0],
            1.0,
            1.0,
            None,
            Crs::Unknown,
        );
        assert!(result.is_err());
    }
}

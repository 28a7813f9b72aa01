//! Grid-to-zone redistribution: overlay a regular cell grid on a zone
//! layer, cache the areal weights, and push gridded values through them as
//! conservative sums or weighted means, year by year or hour by hour.

mod aggregate;
mod batch;
mod common;
mod geom;
mod grid;
mod registry;
mod rollup;
pub mod weights;
mod zone;

#[doc(inline)]
pub use grid::{cell_polygon, Cell, Grid};

#[doc(inline)]
pub use zone::{Parent, ParentMap, ZoneId, ZoneSet};

#[doc(inline)]
pub use weights::{WeightRecord, WeightTable};

#[doc(inline)]
pub use aggregate::{
    balance, mean_by_zone, sum_by_zone, BalanceReport, FieldCorrection, FieldSet,
};

#[doc(inline)]
pub use rollup::{
    population_fractions, rollup, rollup_directory, write_per_parent, DeriveMagnitude, FieldSpec,
    PopulationTable, RollupParams,
};

#[doc(inline)]
pub use batch::{
    aggregate_years, fill_missing_hours, merge_by_zone, redistribute_hours, run as run_batch,
    AggregateParams, BatchReport, TimeseriesParams, Unit, UnitReport,
};

#[doc(inline)]
pub use registry::Component;

pub use common::validate::{validate_list_order, validate_slug, validate_year};

pub use geom::Crs;

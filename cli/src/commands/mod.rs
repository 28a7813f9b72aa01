pub mod aggregate;
pub mod fill_missing;
pub mod list;
pub mod rollup;
pub mod timeseries;
pub mod weights;

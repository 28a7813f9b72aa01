//! Closed registry of the pipeline's components.
//!
//! Lookups that used to be stringly-keyed resolve against a fixed enum, so
//! an unknown component name is a lookup error instead of a silent miss and
//! the compiler tracks every dispatch site.

use anyhow::{bail, Result};

/// One redistribution component, named the way its subcommand is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Component {
    /// Overlay a cell grid on a zone layer and cache the areal weights.
    Weights,
    /// Per-year conservative sums of gridded data onto zones.
    Aggregate,
    /// Per-hour weighted means of gridded data onto zones.
    Timeseries,
    /// Population-weighted rollup of zone series onto parent groups.
    Rollup,
    /// Backfill missing hours of a zone series with placeholders.
    FillMissing,
}

impl Component {
    pub const ALL: [Component; 5] = [
        Component::Weights,
        Component::Aggregate,
        Component::Timeseries,
        Component::Rollup,
        Component::FillMissing,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Component::Weights => "weights",
            Component::Aggregate => "aggregate",
            Component::Timeseries => "timeseries",
            Component::Rollup => "rollup",
            Component::FillMissing => "fill-missing",
        }
    }

    /// Asset the component reads from.
    pub fn source_model(&self) -> &'static str {
        match self {
            Component::Weights | Component::Aggregate | Component::Timeseries => "grid",
            Component::Rollup | Component::FillMissing => "zones",
        }
    }

    /// Asset the component produces.
    pub fn target_model(&self) -> &'static str {
        match self {
            Component::Weights | Component::Aggregate | Component::Timeseries => "zones",
            Component::Rollup => "groups",
            Component::FillMissing => "zones",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Component::Weights => "Overlay a cell grid on a zone layer and cache the areal weights.",
            Component::Aggregate => "Aggregate (sum) yearly gridded data to zones.",
            Component::Timeseries => "Convert gridded hourly data to mean zone data.",
            Component::Rollup => "Convert mean zone data to population-weighted group data.",
            Component::FillMissing => "Backfill missing hours of a zone series with placeholders.",
        }
    }

    /// Resolve a component by its name.
    pub fn find(name: &str) -> Result<Component> {
        match Component::ALL.iter().find(|c| c.name() == name) {
            Some(component) => Ok(*component),
            None => bail!(
                "Component name '{name}' does not match any in the current registry."
            ),
        }
    }

    /// Components that read from or produce the named asset, matched
    /// case-insensitively.
    pub fn related(asset: &str) -> Vec<Component> {
        Component::ALL
            .iter()
            .filter(|c| {
                asset.eq_ignore_ascii_case(c.source_model())
                    || asset.eq_ignore_ascii_case(c.target_model())
            })
            .copied()
            .collect()
    }
}

impl std::fmt::Display for Component {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// Library exports for tracebuild

pub mod data;
pub mod infer;
pub mod ir;
pub mod layout;
pub mod normalize;
pub mod palette;
pub mod parser;
pub mod resolve;
pub mod runtime;
pub mod scale;
pub mod schema;
pub mod transform;

pub use data::{Column, Dataset, Factor};
pub use ir::{BuildContext, Diagnostic, Figure, Level};
pub use parser::{parse_plot_spec, PlotSpec};
pub use runtime::{build_plot, build_with_diagnostics, Pipeline};

use serde::Deserialize;

/// Hard errors that abort a build
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum BuildError {
    #[error("Column '{name}' not found (available columns: {available})")]
    UndefinedColumn { name: String, available: String },

    #[error("Dataset '{0}' not found")]
    UnknownDataset(String),

    #[error("Evaluation error: {0}")]
    Evaluation(String),

    #[error("mixed numeric/discrete color mapping: can't have both discrete and numeric color mappings")]
    MixedColorMapping,

    #[error("multiple color palettes were supplied, only one palette is allowed")]
    MultiplePalettes,

    #[error("size must be mapped to a numeric variable")]
    DiscreteSize,

    #[error("Invalid symbols: '{invalid}'. Valid symbols include: '{valid}'")]
    InvalidSymbols { invalid: String, valid: String },

    #[error("Invalid linetypes: '{invalid}'. Valid linetypes are: '{valid}'")]
    InvalidLinetypes { invalid: String, valid: String },

    #[error("Trace type must be one of the following: '{valid}', got '{got}'")]
    UnknownTraceType { got: String, valid: String },
}

/// Options shared by every trace in a build. Trace-level palette
/// parameters (`colors`, `sizes`, `symbols`, `linetypes`) take precedence.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct BuildOptions {
    /// Output range for the size scale, in square pixels of marker area
    #[serde(default = "default_sizes")]
    pub sizes: [f64; 2],
    /// Above this many points a scatter trace defaults to `mode: "lines"`
    #[serde(default = "default_mode_threshold")]
    pub mode_threshold: usize,
    /// Append an invisible trace that carries the numeric colour bar
    #[serde(default = "default_colorbar")]
    pub colorbar: bool,
    /// Title of the colour bar
    #[serde(default)]
    pub color_title: Option<String>,
}

fn default_sizes() -> [f64; 2] { [10.0, 100.0] }
fn default_mode_threshold() -> usize { 20 }
fn default_colorbar() -> bool { true }

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            sizes: default_sizes(),
            mode_threshold: default_mode_threshold(),
            colorbar: default_colorbar(),
            color_title: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_defaults_from_empty_json() {
        let opts: BuildOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(opts, BuildOptions::default());
    }

    #[test]
    fn test_options_partial_override() {
        let opts: BuildOptions = serde_json::from_str(r#"{"sizes": [2, 8]}"#).unwrap();
        assert_eq!(opts.sizes, [2.0, 8.0]);
        assert_eq!(opts.mode_threshold, 20);
    }

    #[test]
    fn test_discrete_size_message() {
        assert_eq!(
            BuildError::DiscreteSize.to_string(),
            "size must be mapped to a numeric variable"
        );
    }
}

// Plot spec and formula parser module

pub mod ast;
pub mod formula;
pub mod lexer;
pub mod spec;

// Public API re-exports
pub use ast::{AttrSpec, AttrValue, Formula, PlotSpec, SourceSpec};
pub use formula::parse_formula;
pub use spec::parse_plot_spec;

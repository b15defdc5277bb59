// Abstract Syntax Tree for plot specifications and attribute formulas

use crate::data::Dataset;
use crate::{BuildError, BuildOptions};
use anyhow::Result;
use std::borrow::Cow;
use std::collections::BTreeMap;

/// Complete plot specification
#[derive(Debug, Clone, Default)]
pub struct PlotSpec {
    /// Name of the dataset used by sources that don't name one
    pub data: Option<String>,
    pub datasets: BTreeMap<String, Dataset>,
    /// One entry per trace-to-be, in insertion order
    pub traces: Vec<SourceSpec>,
    /// Layout fragments, later ones override earlier ones
    pub layouts: Vec<SourceSpec>,
    pub options: BuildOptions,
}

impl PlotSpec {
    /// Dataset a source evaluates against: its own, else the plot default,
    /// else an empty table.
    pub fn dataset_for(&self, source: &SourceSpec) -> Result<Cow<'_, Dataset>> {
        match source.data.as_ref().or(self.data.as_ref()) {
            Some(name) => self
                .datasets
                .get(name)
                .map(Cow::Borrowed)
                .ok_or_else(|| BuildError::UnknownDataset(name.clone()).into()),
            None => Ok(Cow::Owned(Dataset::default())),
        }
    }
}

/// One data source: an attribute set bound to an optional dataset
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceSpec {
    pub data: Option<String>,
    pub attrs: AttrSpec,
}

/// Attribute name -> value. Dot-paths are already expanded into nesting.
pub type AttrSpec = BTreeMap<String, AttrValue>;

#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Literal(serde_json::Value),
    Nested(AttrSpec),
    Formula(Formula),
}

/// A deferred, data-bound expression such as `~price / carat`
#[derive(Debug, Clone, PartialEq)]
pub struct Formula {
    /// Source text including the leading `~`
    pub source: String,
    pub expr: Expr,
}

impl Formula {
    /// Printable source with the formula marker stripped
    pub fn label(&self) -> &str {
        self.source.trim_start().trim_start_matches('~').trim()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Str(String),
    Column(String),
    Neg(Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    Call(String, Vec<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
}

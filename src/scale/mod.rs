//! Scale mappers.
//!
//! Each mapper looks at one visual channel across every trace of the build,
//! derives a single shared scale from the union of the channel's values and
//! writes the scaled attributes back into each trace. Literal and `I()`
//! values are never read as mappings.

pub mod color;
pub mod linetype;
pub mod size;
pub mod symbol;

pub use color::map_color;
pub use linetype::map_linetype;
pub use size::map_size;
pub use symbol::map_symbol;

use crate::data::{number_to_json, Column, Factor};
use crate::ir::{BuildContext, Trace};
use crate::schema::{is_scatter_like, Vocabulary};
use anyhow::{bail, Result};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};

/// Does the trace draw markers? Scatter-like traces decide by mode, other
/// types by whether they carry a `marker` attribute at all.
pub fn has_marker(schema: &dyn Vocabulary, trace: &Trace) -> bool {
    has_geometry(schema, trace, "markers", "marker")
}

pub fn has_line(schema: &dyn Vocabulary, trace: &Trace) -> bool {
    has_geometry(schema, trace, "lines", "line")
}

pub fn has_text(schema: &dyn Vocabulary, trace: &Trace) -> bool {
    has_geometry(schema, trace, "text", "textfont")
}

/// Does the trace actually show any text to style?
pub fn carries_text(trace: &Trace) -> bool {
    trace.get("text").is_some() || trace.get("texttemplate").is_some()
}

fn has_geometry(schema: &dyn Vocabulary, trace: &Trace, mode_flag: &str, attr: &str) -> bool {
    let trace_type = trace.type_name().unwrap_or("scatter");
    if is_scatter_like(trace_type) {
        trace.mode().map(|m| m.contains(mode_flag)).unwrap_or(false)
    } else {
        schema.has_attr(trace_type, attr)
    }
}

/// Unwrap a `json!` object literal
pub(crate) fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Add a flag to a scatter trace's mode, noting the change
pub(crate) fn append_mode(trace: &mut Trace, flag: &str, why: &str, ctx: &mut BuildContext) {
    if !is_scatter_like(trace.type_name().unwrap_or("scatter")) {
        return;
    }
    let mode = match trace.mode() {
        Some(m) if m.split('+').any(|part| part == flag) => return,
        Some(m) => format!("{}+{}", m, flag),
        None => flag.to_string(),
    };
    ctx.note(format!("Adding {} to mode; otherwise {} would have no effect", flag, why));
    trace.set("mode", Value::String(mode));
}

/// Min and max over a set of numeric values
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MinMax {
    pub min: f64,
    pub max: f64,
}

impl MinMax {
    pub fn of<'a>(columns: impl IntoIterator<Item = &'a Column>) -> Option<MinMax> {
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for v in columns.into_iter().flat_map(Column::numeric_values) {
            if v < min {
                min = v;
            }
            if v > max {
                max = v;
            }
        }
        (min <= max).then_some(MinMax { min, max })
    }

    /// Linear map of `v` from this range into `to`; a zero-width range maps
    /// everything to the middle of `to`.
    pub fn rescale(&self, v: f64, to: [f64; 2]) -> f64 {
        if self.max > self.min {
            to[0] + (v - self.min) / (self.max - self.min) * (to[1] - to[0])
        } else {
            (to[0] + to[1]) / 2.0
        }
    }

    pub fn to_json(&self) -> Value {
        Value::Array(vec![number_to_json(Some(self.min)), number_to_json(Some(self.max))])
    }
}

/// Union of the levels of several discrete columns, in level order.
///
/// Declared levels keep their declared order no matter which trace holds
/// them; levels nobody declared follow in first-seen order.
pub fn global_levels<'a>(columns: impl IntoIterator<Item = &'a Column>) -> Vec<String> {
    let factors: Vec<Factor> = columns.into_iter().map(Column::to_discrete).collect();
    let mut present = Vec::new();
    let mut seen = HashSet::new();
    for level in factors.iter().flat_map(Factor::levels_in_use) {
        if seen.insert(level.clone()) {
            present.push(level);
        }
    }

    let mut out = Vec::new();
    let mut placed = HashSet::new();
    for declared in factors.iter().filter_map(|f| f.levels.as_ref()) {
        for level in declared {
            if seen.contains(level) && placed.insert(level.clone()) {
                out.push(level.clone());
            }
        }
    }
    out.extend(present.into_iter().filter(|l| !placed.contains(l)));
    out
}

/// Map every value of `column` through `table`. Unmapped values become null.
/// Missing rows (group breaks) stay null but don't count when deciding
/// whether the column collapses to a single scalar.
pub fn lookup(column: &Column, table: &HashMap<String, Value>) -> Value {
    let values: Vec<Option<Value>> = (0..column.len())
        .map(|i| {
            column
                .label(i)
                .map(|l| table.get(&l).cloned().unwrap_or(Value::Null))
        })
        .collect();
    collapse(values)
}

fn collapse(values: Vec<Option<Value>>) -> Value {
    let mut present = values.iter().flatten();
    if let Some(first) = present.next() {
        if present.all(|v| v == first) {
            return first.clone();
        }
    }
    Value::Array(values.into_iter().map(|v| v.unwrap_or(Value::Null)).collect())
}

/// A single value for attributes plotly only reads as scalars, such as
/// `line.color` and `line.dash`: the first non-null entry of an array.
pub fn scalar(value: Value) -> Value {
    match value {
        Value::Array(items) => items.into_iter().find(|v| !v.is_null()).unwrap_or(Value::Null),
        other => other,
    }
}

/// A discrete palette parameter: a single value, a list, or a map from
/// level to value.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscretePalette {
    pub entries: Vec<Value>,
    pub names: Option<Vec<String>>,
}

impl DiscretePalette {
    pub fn from_defaults(entries: &[&str]) -> Self {
        Self {
            entries: entries.iter().map(|e| Value::String(e.to_string())).collect(),
            names: None,
        }
    }

    pub fn from_value(value: &Value, what: &str) -> Result<Self> {
        match value {
            Value::Array(items) if !items.is_empty() => Ok(Self { entries: items.clone(), names: None }),
            Value::Object(map) if !map.is_empty() => Ok(Self {
                entries: map.values().cloned().collect(),
                names: Some(map.keys().cloned().collect()),
            }),
            Value::String(_) | Value::Number(_) => Ok(Self { entries: vec![value.clone()], names: None }),
            other => bail!("Invalid {} palette {}", what, other),
        }
    }

    /// Entries not found in the legal vocabulary
    pub fn invalid_entries(&self, legal: &[String]) -> Vec<String> {
        self.entries
            .iter()
            .map(|e| match e {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .filter(|e| !legal.contains(e))
            .collect()
    }

    /// Level -> palette entry. Named palettes match by name; otherwise entries
    /// are assigned in level order and surplus levels stay unmapped.
    pub fn assign(&self, levels: &[String]) -> HashMap<String, Value> {
        match &self.names {
            Some(names) => names.iter().cloned().zip(self.entries.iter().cloned()).collect(),
            None => levels.iter().cloned().zip(self.entries.iter().cloned()).collect(),
        }
    }
}

/// First palette parameter supplied by any trace that maps the channel
pub(crate) fn first_palette<'a>(
    traces: &'a [Trace],
    channel: &str,
    get: impl Fn(&'a Trace) -> Option<&'a Value>,
) -> Option<&'a Value> {
    traces
        .iter()
        .filter(|t| t.channel(channel).is_some())
        .find_map(get)
}

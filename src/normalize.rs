use crate::ir::{BuildContext, Figure};
use crate::schema::{is_scatter_like, Vocabulary};
use anyhow::Result;
use serde_json::{Map, Value};
use tracing::debug;

/// Attributes plotly.js only reads as arrays, even for a single point
const DATA_ARRAYS: [&str; 16] = [
    "x", "y", "z", "ids", "customdata", "i", "j", "k", "labels", "values", "r", "theta",
    "surfacecolor", "intensity", "q1", "q3",
];

/// Layout keys that hold lists of objects
pub const LAYOUT_ARRAYS: [&str; 5] = ["annotations", "shapes", "images", "sliders", "updatemenus"];

pub const DEFAULT_HOVER_MODE: &str = "closest";

/// Final pass over a finished figure
pub trait Normalizer {
    fn normalize(&self, figure: &mut Figure, schema: &dyn Vocabulary, ctx: &mut BuildContext) -> Result<()>;
}

/// Validates attribute names against the schema and fixes up the shapes
/// plotly.js expects.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlotlyNormalizer;

impl Normalizer for PlotlyNormalizer {
    fn normalize(&self, figure: &mut Figure, schema: &dyn Vocabulary, ctx: &mut BuildContext) -> Result<()> {
        validate_names(&figure.data, schema, ctx);
        for trace in figure.data.iter_mut().filter_map(Value::as_object_mut) {
            box_array_attrs(trace);
            complete_mode(trace, ctx);
        }
        force_array_attrs(&mut figure.layout, &LAYOUT_ARRAYS);
        default_hover_mode(&mut figure.layout);
        Ok(())
    }
}

/// Warn about trace attributes the trace type doesn't define
pub fn validate_names(traces: &[Value], schema: &dyn Vocabulary, ctx: &mut BuildContext) {
    for trace in traces.iter().filter_map(Value::as_object) {
        let trace_type = trace.get("type").and_then(Value::as_str).unwrap_or("scatter");
        let Some(known) = schema.attributes(trace_type) else {
            continue;
        };
        let unknown: Vec<&str> = trace
            .keys()
            .map(String::as_str)
            .filter(|k| !known.contains(k))
            .collect();
        if !unknown.is_empty() {
            ctx.warn(format!(
                "'{}' objects don't have these attributes: '{}'",
                trace_type,
                unknown.join("', '")
            ));
        }
    }
}

/// Wrap scalar values of data-array attributes into one-element arrays
pub fn box_array_attrs(trace: &mut Map<String, Value>) {
    for key in DATA_ARRAYS {
        if let Some(value) = trace.get_mut(key) {
            if !matches!(value, Value::Array(_) | Value::Object(_) | Value::Null) {
                *value = Value::Array(vec![value.take()]);
            }
        }
    }
}

/// Make sure a scatter trace's mode shows the geometry it has styling for
pub fn complete_mode(trace: &mut Map<String, Value>, ctx: &mut BuildContext) {
    let trace_type = trace.get("type").and_then(Value::as_str).unwrap_or("scatter");
    if !is_scatter_like(trace_type) {
        return;
    }
    for (attr, flag) in [("marker", "markers"), ("line", "lines"), ("textfont", "text")] {
        if !trace.get(attr).map(Value::is_object).unwrap_or(false) {
            continue;
        }
        let mode = trace.get("mode").and_then(Value::as_str).unwrap_or("");
        if mode.split('+').any(|m| m == flag) {
            continue;
        }
        let completed = if mode.is_empty() {
            flag.to_string()
        } else {
            format!("{}+{}", mode, flag)
        };
        ctx.note(format!(
            "A {} object has been specified, but {} is not in the mode; adding {} to the mode",
            attr, flag, flag
        ));
        trace.insert("mode".to_string(), Value::String(completed));
    }
}

/// Turn single objects under list-valued layout keys into one-element lists
pub fn force_array_attrs(layout: &mut Map<String, Value>, keys: &[&str]) {
    for key in keys {
        if let Some(value) = layout.get_mut(*key) {
            if value.is_object() {
                debug!("wrapping layout.{} in an array", key);
                *value = Value::Array(vec![value.take()]);
            }
        }
    }
}

pub fn default_hover_mode(layout: &mut Map<String, Value>) {
    layout
        .entry("hovermode")
        .or_insert_with(|| Value::String(DEFAULT_HOVER_MODE.to_string()));
}

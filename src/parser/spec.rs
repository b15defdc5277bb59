// JSON plot specification reader
//
// Format:
// {
//   "data": "mtcars",
//   "datasets": { "mtcars": { "rows": [...], "groups": [...], "factors": {...} } },
//   "traces": [ { "data": "mtcars", "x": "~wt", "y": "~mpg", "color": "~factor(cyl)" } ],
//   "layout": [ { "title": "Cars" } ],
//   "config": { "sizes": [10, 100] }
// }

use super::ast::{AttrSpec, AttrValue, PlotSpec, SourceSpec};
use super::formula::{is_formula, parse_formula};
use crate::data::Dataset;
use crate::BuildOptions;
use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

#[derive(Debug, Deserialize)]
struct RawPlot {
    #[serde(default)]
    data: Option<String>,
    #[serde(default)]
    datasets: BTreeMap<String, RawDataset>,
    #[serde(default)]
    traces: Vec<Map<String, Value>>,
    #[serde(default)]
    layout: Option<Value>,
    #[serde(default)]
    config: BuildOptions,
}

#[derive(Debug, Deserialize)]
struct RawDataset {
    rows: Value,
    #[serde(default)]
    groups: Vec<String>,
    #[serde(default)]
    factors: BTreeMap<String, RawFactor>,
}

#[derive(Debug, Deserialize)]
struct RawFactor {
    levels: Vec<String>,
    #[serde(default)]
    ordered: bool,
}

/// Parse a complete plot specification from JSON text
pub fn parse_plot_spec(input: &str) -> Result<PlotSpec> {
    let raw: RawPlot = serde_json::from_str(input).context("Failed to parse plot spec JSON")?;

    let mut datasets = BTreeMap::new();
    for (name, raw_ds) in raw.datasets {
        let dataset = build_dataset(raw_ds).with_context(|| format!("Invalid dataset '{}'", name))?;
        datasets.insert(name, dataset);
    }

    let traces = raw
        .traces
        .iter()
        .enumerate()
        .map(|(i, t)| parse_source(t).with_context(|| format!("Invalid trace {}", i + 1)))
        .collect::<Result<Vec<_>>>()?;

    // A single layout object is accepted as shorthand for a one-element list
    let layout_values = match raw.layout {
        None => Vec::new(),
        Some(Value::Array(items)) => items,
        Some(obj @ Value::Object(_)) => vec![obj],
        Some(other) => bail!("Layout must be an object or an array of objects, got {}", other),
    };
    let layouts = layout_values
        .iter()
        .enumerate()
        .map(|(i, v)| {
            let obj = v
                .as_object()
                .ok_or_else(|| anyhow!("Layout fragment {} must be an object", i + 1))?;
            parse_source(obj).with_context(|| format!("Invalid layout fragment {}", i + 1))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(PlotSpec {
        data: raw.data,
        datasets,
        traces,
        layouts,
        options: raw.config,
    })
}

fn build_dataset(raw: RawDataset) -> Result<Dataset> {
    let mut dataset = Dataset::from_json(&raw.rows)?;
    for (name, factor) in raw.factors {
        dataset.set_levels(&name, factor.levels, factor.ordered)?;
    }
    dataset.with_groups(raw.groups)
}

/// Parse one attribute object. The reserved `data` key names the dataset.
pub fn parse_source(obj: &Map<String, Value>) -> Result<SourceSpec> {
    let data = match obj.get("data") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(other) => bail!("'data' must name a dataset, got {}", other),
    };
    let mut attrs = AttrSpec::new();
    for (key, value) in obj.iter().filter(|(k, _)| k.as_str() != "data") {
        insert_path(&mut attrs, key, parse_value(value)?)?;
    }
    Ok(SourceSpec { data, attrs })
}

/// Convert an object into an attribute set, expanding dot-paths
pub fn parse_attrs(obj: &Map<String, Value>) -> Result<AttrSpec> {
    let mut attrs = AttrSpec::new();
    for (key, value) in obj {
        insert_path(&mut attrs, key, parse_value(value)?)?;
    }
    Ok(attrs)
}

fn parse_value(value: &Value) -> Result<AttrValue> {
    match value {
        Value::String(s) if is_formula(s) => Ok(AttrValue::Formula(parse_formula(s)?)),
        Value::Object(obj) => Ok(AttrValue::Nested(parse_attrs(obj)?)),
        other => Ok(AttrValue::Literal(other.clone())),
    }
}

/// Insert `value` at a dot-separated path, creating nested sets on the way
fn insert_path(attrs: &mut AttrSpec, path: &str, value: AttrValue) -> Result<()> {
    match path.split_once('.') {
        None => {
            let merge = matches!(
                (attrs.get(path), &value),
                (Some(AttrValue::Nested(_)), AttrValue::Nested(_))
            );
            if merge {
                if let (Some(AttrValue::Nested(existing)), AttrValue::Nested(incoming)) =
                    (attrs.get_mut(path), value)
                {
                    for (k, v) in incoming {
                        insert_path(existing, &k, v)?;
                    }
                }
            } else {
                attrs.insert(path.to_string(), value);
            }
            Ok(())
        }
        Some((head, rest)) => {
            let entry = attrs
                .entry(head.to_string())
                .or_insert_with(|| AttrValue::Nested(AttrSpec::new()));
            match entry {
                AttrValue::Nested(inner) => insert_path(inner, rest, value),
                _ => bail!("Attribute '{}' is not an object, cannot set '{}'", head, path),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_minimal_spec() {
        let spec = parse_plot_spec(r#"{"traces": [{"x": "~a", "y": [1, 2], "type": "scatter"}]}"#)
            .unwrap();
        assert_eq!(spec.traces.len(), 1);
        let attrs = &spec.traces[0].attrs;
        assert!(matches!(attrs.get("x"), Some(AttrValue::Formula(_))));
        assert_eq!(attrs.get("y"), Some(&AttrValue::Literal(json!([1, 2]))));
        assert!(spec.layouts.is_empty());
    }

    #[test]
    fn test_dot_paths_merge_with_nested() {
        let obj = json!({"marker": {"size": 4}, "marker.color": "red"});
        let source = parse_source(obj.as_object().unwrap()).unwrap();
        let marker = match source.attrs.get("marker") {
            Some(AttrValue::Nested(m)) => m,
            other => panic!("expected nested marker, got {:?}", other),
        };
        assert_eq!(marker.get("size"), Some(&AttrValue::Literal(json!(4))));
        assert_eq!(marker.get("color"), Some(&AttrValue::Literal(json!("red"))));
    }

    #[test]
    fn test_dot_path_through_literal_fails() {
        let obj = json!({"marker": 1, "marker.color": "red"});
        assert!(parse_source(obj.as_object().unwrap()).is_err());
    }

    #[test]
    fn test_datasets_and_layout_shorthand() {
        let input = r#"{
            "data": "d",
            "datasets": {"d": {"rows": [{"g": "a", "v": 1}], "groups": ["g"],
                               "factors": {"g": {"levels": ["b", "a"], "ordered": true}}}},
            "traces": [{"x": "~v"}],
            "layout": {"title": "T"}
        }"#;
        let spec = parse_plot_spec(input).unwrap();
        let d = &spec.datasets["d"];
        assert_eq!(d.groups, vec!["g".to_string()]);
        assert!(d.column("g").unwrap().is_ordered());
        assert_eq!(spec.layouts.len(), 1);
        assert_eq!(spec.data.as_deref(), Some("d"));
    }

    #[test]
    fn test_invalid_formula_reports_trace() {
        let err = parse_plot_spec(r#"{"traces": [{"x": "~a +"}]}"#).unwrap_err();
        assert!(format!("{:#}", err).contains("Invalid trace 1"));
    }
}

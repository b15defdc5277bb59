use crate::ir::attrs_to_json;
use crate::parser::ast::{AttrValue, PlotSpec, SourceSpec};
use crate::resolve::resolve_attrs;
use crate::schema::is_3d;
use anyhow::{Context, Result};
use serde_json::{Map, Value};
use tracing::debug;

/// Recursively override `base` with `overlay`, key by key.
///
/// Objects on both sides merge; anything else in `overlay` replaces the base
/// value. A `null` in `overlay` removes the key.
pub fn modify_list(base: &mut Map<String, Value>, overlay: Map<String, Value>) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (_, Value::Null) => {
                base.remove(&key);
            }
            (Some(Value::Object(existing)), Value::Object(inner)) => modify_list(existing, inner),
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

/// Evaluate every layout fragment against its dataset and fold them into one
/// layout, later fragments taking precedence.
pub fn merge_layouts(spec: &PlotSpec) -> Result<Map<String, Value>> {
    let mut layout = Map::new();
    for (i, fragment) in spec.layouts.iter().enumerate() {
        let data = spec.dataset_for(fragment)?;
        let attrs = resolve_attrs(&fragment.attrs, &data)
            .with_context(|| format!("Failed to evaluate layout fragment {}", i + 1))?;
        let mut resolved = attrs_to_json(&attrs);
        drop_empty(&mut resolved);
        debug!("merging layout fragment {} ({} keys)", i + 1, resolved.len());
        modify_list(&mut layout, resolved);
    }
    Ok(layout)
}

/// Remove null leaves, empty arrays and maps left empty by that removal
fn drop_empty(map: &mut Map<String, Value>) {
    map.retain(|_, v| {
        if let Value::Object(inner) = v {
            drop_empty(inner);
        }
        !is_empty_value(v)
    });
}

fn is_empty_value(v: &Value) -> bool {
    match v {
        Value::Null => true,
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        _ => false,
    }
}

/// Default axis titles from the formulas mapped to `x`, `y` and `z`.
///
/// 3-D trace types title their axes under `scene`; `z` is only titled for
/// them. Titles already present in the layout are kept.
pub fn infer_axis_titles(layout: &mut Map<String, Value>, source: &SourceSpec, trace_type: &str) {
    let three_d = is_3d(trace_type);
    for axis in ["x", "y", "z"] {
        if axis == "z" && !three_d {
            continue;
        }
        let Some(AttrValue::Formula(formula)) = source.attrs.get(axis) else {
            continue;
        };
        let axis_key = format!("{}axis", axis);
        let target = if three_d {
            match object_entry(layout, "scene") {
                Some(scene) => scene,
                None => continue,
            }
        } else {
            &mut *layout
        };
        let Some(axis_obj) = object_entry(target, &axis_key) else {
            continue;
        };
        if !axis_obj.contains_key("title") {
            axis_obj.insert("title".to_string(), Value::String(formula.label().to_string()));
        }
    }
}

/// The object stored under `key`, created when absent. `None` when the key
/// holds something other than an object.
fn object_entry<'a>(map: &'a mut Map<String, Value>, key: &str) -> Option<&'a mut Map<String, Value>> {
    map.entry(key.to_string())
        .or_insert_with(|| Value::Object(Map::new()))
        .as_object_mut()
}

use super::{carries_text, global_levels, has_line, has_marker, has_text, lookup, object, scalar, MinMax};
use crate::data::Column;
use crate::ir::{merge_defaults, Attrs, BuildContext, Node, Trace};
use crate::palette::{ColorPalette, ContinuousScale, Rgb};
use crate::schema::{Vocabulary, LINE_COLOR_ARRAY_TYPES, Z_COLOR_TYPES};
use crate::{BuildError, BuildOptions};
use anyhow::Result;
use serde_json::{json, Map, Value};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Number of stops in an emitted plotly colorscale
const COLORSCALE_STOPS: usize = 25;

fn is_z_type(trace: &Trace) -> bool {
    Z_COLOR_TYPES.contains(&trace.type_name().unwrap_or(""))
}

/// The values a trace colours by: its `color` mapping, or for z-bearing
/// types without one, a numeric `surfacecolor`/`z`.
fn color_values(trace: &Trace) -> Option<&Column> {
    trace.channel("color").or_else(|| {
        if !is_z_type(trace) {
            return None;
        }
        ["surfacecolor", "z"]
            .into_iter()
            .filter_map(|key| trace.column(key))
            .find(|c| !c.is_discrete())
    })
}

/// Shared colour scale across every trace that maps `color`.
///
/// Numeric values get a continuous scale and a colour bar, discrete values
/// a level -> colour lookup applied to whichever geometry the trace draws.
pub fn map_color(
    traces: &mut Vec<Trace>,
    schema: &dyn Vocabulary,
    opts: &BuildOptions,
    ctx: &mut BuildContext,
) -> Result<()> {
    let columns: Vec<&Column> = traces.iter().filter_map(color_values).collect();
    if columns.is_empty() {
        return Ok(());
    }
    let numeric = columns.iter().any(|c| !c.is_discrete());
    let discrete = columns.iter().any(|c| c.is_discrete());
    if numeric && discrete {
        return Err(BuildError::MixedColorMapping.into());
    }

    let supplied: Vec<&Value> = traces
        .iter()
        .filter(|t| color_values(t).is_some())
        .filter_map(|t| t.palettes.colors.as_ref())
        .collect();
    let mut distinct: Vec<&Value> = Vec::new();
    for p in supplied {
        if !distinct.contains(&p) {
            distinct.push(p);
        }
    }
    if distinct.len() > 1 {
        return Err(BuildError::MultiplePalettes.into());
    }
    let palette = distinct.first().map(|v| (*v).clone());

    if numeric {
        let Some(range) = MinMax::of(columns) else {
            return Ok(());
        };
        map_numeric(traces, palette, range, schema, opts, ctx)
    } else {
        let levels = global_levels(columns.iter().copied());
        let ordered = columns.iter().any(|c| c.is_ordered());
        map_discrete(traces, palette, &levels, ordered, schema, ctx)
    }
}

fn map_numeric(
    traces: &mut Vec<Trace>,
    palette: Option<Value>,
    range: MinMax,
    schema: &dyn Vocabulary,
    opts: &BuildOptions,
    ctx: &mut BuildContext,
) -> Result<()> {
    let base = match &palette {
        Some(value) => ColorPalette::from_value(value)?,
        None => ColorPalette::viridis(),
    };
    let scale = ContinuousScale::new(base, range.min, range.max);
    let colorscale = scale.colorscale(COLORSCALE_STOPS);
    let title = opts
        .color_title
        .clone()
        .or_else(|| traces.iter().find_map(|t| t.labels.get("color").cloned()))
        .unwrap_or_default();
    debug!("numeric colour scale over [{}, {}]", range.min, range.max);

    let scale_attrs = json!({
        "colorscale": colorscale.clone(),
        "cmin": range.min,
        "cmax": range.max,
    });
    let colorbar = json!({"title": title, "ticklen": 2});

    let mut needs_colorbar_trace = false;
    for trace in traces.iter_mut() {
        let Some(values) = color_values(trace).cloned() else {
            continue;
        };
        let trace_type = trace.type_name().unwrap_or("scatter").to_string();

        if is_z_type(trace) {
            let mut top = Map::new();
            top.insert("colorscale".into(), colorscale.clone());
            top.insert("colorbar".into(), colorbar.clone());
            merge_defaults(&mut trace.attrs, top);
            trace.colorbar = true;
            continue;
        }
        let color = Node::Data(values).to_json();

        if has_line(schema, trace) && !LINE_COLOR_ARRAY_TYPES.contains(&trace_type.as_str()) {
            ctx.warn(format!(
                "line.color doesn't (yet) support data arrays on '{}' traces; drawing markers only",
                trace_type
            ));
            trace.set("mode", json!("markers"));
        }
        if has_line(schema, trace) {
            let mut line = object(scale_attrs.clone());
            line.insert("color".into(), color.clone());
            trace.merge_under("line", line);
        }
        if has_marker(schema, trace) {
            let mut marker = object(scale_attrs.clone());
            marker.insert("color".into(), color.clone());
            marker.insert("showscale".into(), json!(false));
            trace.merge_under("marker", marker);
        }
        if has_text(schema, trace) && carries_text(trace) {
            ctx.warn("textfont.color doesn't (yet) support data arrays; text colour left unmapped");
        }
        needs_colorbar_trace = true;
    }

    if needs_colorbar_trace && opts.colorbar {
        let mut marker = object(scale_attrs);
        marker.insert("color".into(), range.to_json());
        marker.insert("showscale".into(), json!(true));
        marker.insert("colorbar".into(), colorbar);
        let bar = colorbar_trace(traces, marker);
        traces.push(bar);
    }
    Ok(())
}

/// Invisible trace carrying the colour bar, spanning the data of every trace
fn colorbar_trace(traces: &[Trace], marker: Map<String, Value>) -> Trace {
    let types: HashSet<&str> = traces.iter().filter_map(Trace::type_name).collect();
    let three_d = types.contains("scatter3d");
    let trace_type = if three_d {
        "scatter3d"
    } else if types.contains("scattergl") {
        "scattergl"
    } else {
        "scatter"
    };

    let mut attrs = Attrs::new();
    let axes: &[&str] = if three_d { &["x", "y", "z"] } else { &["x", "y"] };
    for axis in axes {
        if let Some(range) = MinMax::of(traces.iter().filter_map(|t| t.column(axis))) {
            attrs.insert(axis.to_string(), Node::Literal(range.to_json()));
        }
    }
    for (key, value) in [
        ("type", json!(trace_type)),
        ("mode", json!("markers")),
        ("opacity", json!(0)),
        ("hoverinfo", json!("none")),
        ("showlegend", json!(false)),
        ("marker", Value::Object(marker)),
    ] {
        attrs.insert(key.to_string(), Node::Literal(value));
    }

    let source = traces.last().map(|t| t.source).unwrap_or(0);
    let mut trace = Trace::new(attrs, source);
    trace.colorbar = true;
    trace
}

fn map_discrete(
    traces: &mut [Trace],
    palette: Option<Value>,
    levels: &[String],
    ordered: bool,
    schema: &dyn Vocabulary,
    ctx: &mut BuildContext,
) -> Result<()> {
    let palette = match &palette {
        Some(value) => ColorPalette::from_value(value)?,
        None if ordered => ColorPalette {
            colors: ColorPalette::viridis().ramp(levels.len()),
            names: None,
        },
        None => ColorPalette::set2(),
    };
    let table: HashMap<String, Value> = palette
        .assign_colors(levels)
        .into_iter()
        .map(|(level, color)| (level, Value::String(color)))
        .collect();
    debug!("discrete colour scale over {} levels", levels.len());

    for trace in traces.iter_mut() {
        let Some(values) = trace.channel("color") else {
            continue;
        };
        let color = lookup(values, &table);
        if is_z_type(trace) {
            ctx.warn("discrete colour mappings are ignored on z-coloured trace types");
            continue;
        }

        if has_marker(schema, trace) {
            trace.merge_under("marker", single("color", color.clone()));
        }
        if has_line(schema, trace) {
            trace.merge_under("line", single("color", scalar(color.clone())));
        }
        if has_text(schema, trace) && carries_text(trace) {
            trace.merge_under("textfont", single("color", color.clone()));
        }
        if let Some(fill) = fill_color(trace, &color) {
            merge_defaults(&mut trace.attrs, single("fillcolor", fill));
        }
    }
    Ok(())
}

fn single(key: &str, value: Value) -> Map<String, Value> {
    let mut map = Map::new();
    map.insert(key.to_string(), value);
    map
}

/// Half-transparent fill for traces that fill an area with a single colour
fn fill_color(trace: &Trace, color: &Value) -> Option<Value> {
    let fill = trace.get("fill").and_then(Node::as_str)?;
    if fill == "none" {
        return None;
    }
    let mut rgb = Rgb::parse(color.as_str()?).ok()?;
    rgb.a = 0.5;
    Some(Value::String(rgb.to_rgba()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Factor;
    use crate::schema::PlotlySchema;

    fn num(values: &[f64]) -> Node {
        Node::Data(Column::Numeric(values.iter().map(|v| Some(*v)).collect()))
    }

    fn cat(values: &[&str]) -> Node {
        Node::Data(Column::Discrete(Factor::new(
            values.iter().map(|s| Some(s.to_string())).collect(),
        )))
    }

    fn scatter(pairs: Vec<(&str, Node)>, mode: &str) -> Trace {
        let mut attrs: Attrs = pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect();
        attrs.insert("type".into(), Node::Literal(json!("scatter")));
        attrs.insert("mode".into(), Node::Literal(json!(mode)));
        Trace::new(attrs, 0)
    }

    fn run(traces: &mut Vec<Trace>) -> Result<BuildContext> {
        let mut ctx = BuildContext::new();
        map_color(traces, &PlotlySchema, &BuildOptions::default(), &mut ctx)?;
        Ok(ctx)
    }

    #[test]
    fn test_no_color_is_noop() {
        let mut traces = vec![scatter(vec![("x", num(&[1.0]))], "markers")];
        let before = traces.clone();
        run(&mut traces).unwrap();
        assert_eq!(traces, before);
    }

    #[test]
    fn test_numeric_color_adds_one_colorbar_trace() {
        let mut traces = vec![
            scatter(vec![("x", num(&[1.0, 2.0])), ("y", num(&[5.0, 6.0])), ("color", num(&[0.0, 1.0]))], "markers"),
            scatter(vec![("x", num(&[-3.0, 0.0])), ("y", num(&[9.0, 7.0])), ("color", num(&[4.0, 2.0]))], "markers"),
        ];
        run(&mut traces).unwrap();
        assert_eq!(traces.len(), 3);

        let bar = &traces[2];
        assert!(bar.colorbar);
        let json = Node::Map(bar.attrs.clone()).to_json();
        assert_eq!(json["opacity"], json!(0));
        assert_eq!(json["showlegend"], json!(false));
        assert_eq!(json["hoverinfo"], json!("none"));
        assert_eq!(json["marker"]["showscale"], json!(true));
        assert_eq!(json["x"], json!([-3.0, 2.0]));
        assert_eq!(json["y"], json!([5.0, 9.0]));
        assert_eq!(json["marker"]["cmin"], json!(0.0));
        assert_eq!(json["marker"]["cmax"], json!(4.0));

        let first = Node::Map(traces[0].attrs.clone()).to_json();
        assert_eq!(first["marker"]["color"], json!([0.0, 1.0]));
        assert_eq!(first["marker"]["showscale"], json!(false));
    }

    #[test]
    fn test_mixed_color_is_error() {
        let mut traces = vec![
            scatter(vec![("color", num(&[1.0]))], "markers"),
            scatter(vec![("color", cat(&["a"]))], "markers"),
        ];
        let err = run(&mut traces).unwrap_err();
        assert_eq!(err.downcast_ref::<BuildError>(), Some(&BuildError::MixedColorMapping));
    }

    #[test]
    fn test_numeric_color_on_lines_falls_back_to_markers() {
        let mut traces = vec![scatter(vec![("x", num(&[1.0, 2.0])), ("color", num(&[1.0, 2.0]))], "lines")];
        let ctx = run(&mut traces).unwrap();
        assert_eq!(traces[0].mode(), Some("markers"));
        assert_eq!(ctx.warnings().count(), 1);
    }

    #[test]
    fn test_discrete_color_uses_set2() {
        let mut traces = vec![
            scatter(vec![("color", cat(&["a", "a"]))], "markers+lines"),
            scatter(vec![("color", cat(&["b"]))], "markers+lines"),
        ];
        run(&mut traces).unwrap();
        let first = Node::Map(traces[0].attrs.clone()).to_json();
        assert_eq!(first["marker"]["color"], json!("rgba(102,194,165,1)"));
        assert_eq!(first["line"]["color"], json!("rgba(102,194,165,1)"));
        let second = Node::Map(traces[1].attrs.clone()).to_json();
        assert_eq!(second["marker"]["color"], json!("rgba(252,141,98,1)"));
        assert_eq!(traces.len(), 2);
    }

    #[test]
    fn test_existing_marker_color_wins() {
        let mut t = scatter(vec![("color", cat(&["a"]))], "markers");
        t.set("marker", json!({"color": "black"}));
        let mut traces = vec![t];
        run(&mut traces).unwrap();
        let json = Node::Map(traces[0].attrs.clone()).to_json();
        assert_eq!(json["marker"]["color"], json!("black"));
    }

    #[test]
    fn test_two_palettes_is_error() {
        let mut a = scatter(vec![("color", cat(&["a"]))], "markers");
        a.palettes.colors = Some(json!("Set1"));
        let mut b = scatter(vec![("color", cat(&["b"]))], "markers");
        b.palettes.colors = Some(json!(["red", "blue"]));
        let err = run(&mut vec![a, b]).unwrap_err();
        assert_eq!(err.downcast_ref::<BuildError>(), Some(&BuildError::MultiplePalettes));
    }

    #[test]
    fn test_bar_without_text_has_no_text_warning() {
        let mut attrs = Attrs::new();
        attrs.insert("type".into(), Node::Literal(json!("bar")));
        attrs.insert("x".into(), cat(&["a", "b"]));
        attrs.insert("y".into(), num(&[1.0, 2.0]));
        attrs.insert("color".into(), num(&[1.0, 2.0]));
        let mut traces = vec![Trace::new(attrs.clone(), 0)];
        let ctx = run(&mut traces).unwrap();
        assert_eq!(ctx.warnings().count(), 0);

        attrs.insert("text".into(), Node::Literal(json!("label")));
        let mut traces = vec![Trace::new(attrs, 0)];
        let ctx = run(&mut traces).unwrap();
        assert_eq!(ctx.warnings().count(), 1);
    }

    #[test]
    fn test_ordered_levels_get_viridis_in_declared_order() {
        let ordered = |level: &str| {
            Node::Data(Column::Discrete(Factor {
                values: vec![Some(level.to_string())],
                levels: Some(vec!["lo".into(), "mid".into(), "hi".into()]),
                ordered: true,
            }))
        };
        // emitted highest level first, as the splitter does for ordered factors
        let mut traces = vec![
            scatter(vec![("color", ordered("hi"))], "markers"),
            scatter(vec![("color", ordered("mid"))], "markers"),
            scatter(vec![("color", ordered("lo"))], "markers"),
        ];
        run(&mut traces).unwrap();
        let ramp = ColorPalette::viridis().ramp(3);
        let color_of = |t: &Trace| Node::Map(t.attrs.clone()).to_json()["marker"]["color"].clone();
        assert_eq!(color_of(&traces[2]), json!(ramp[0].to_rgba()));
        assert_eq!(color_of(&traces[0]), json!(ramp[2].to_rgba()));
    }

    #[test]
    fn test_heatmap_is_colorbar_carrier() {
        let mut attrs = Attrs::new();
        attrs.insert("type".into(), Node::Literal(json!("heatmap")));
        attrs.insert("z".into(), num(&[1.0, 2.0, 3.0]));
        let mut traces = vec![Trace::new(attrs, 0)];
        run(&mut traces).unwrap();
        assert_eq!(traces.len(), 1);
        assert!(traces[0].colorbar);
        assert!(traces[0].get("colorscale").is_some());
    }
}

use super::{carries_text, has_line, has_marker, has_text, MinMax};
use crate::data::Column;
use crate::ir::{BuildContext, Node, Trace};
use crate::schema::Vocabulary;
use crate::{BuildError, BuildOptions};
use anyhow::{bail, Result};
use serde_json::{json, Map, Value};
use tracing::debug;

/// Read a `sizes` parameter: exactly two numbers
fn size_range(value: &Value) -> Result<[f64; 2]> {
    match value.as_array().map(|a| a.as_slice()) {
        Some([lo, hi]) => match (lo.as_f64(), hi.as_f64()) {
            (Some(lo), Some(hi)) => Ok([lo, hi]),
            _ => bail!("'sizes' must hold two numbers, got {}", value),
        },
        _ => bail!("'sizes' must hold two numbers, got {}", value),
    }
}

/// Rescale every trace's `size` mapping into a shared output range and write
/// it as marker area.
pub fn map_size(
    traces: &mut [Trace],
    schema: &dyn Vocabulary,
    opts: &BuildOptions,
    ctx: &mut BuildContext,
) -> Result<()> {
    let columns: Vec<&Column> = traces.iter().filter_map(|t| t.channel("size")).collect();
    if columns.is_empty() {
        return Ok(());
    }
    if columns.iter().any(|c| c.is_discrete()) {
        return Err(BuildError::DiscreteSize.into());
    }
    let Some(range) = MinMax::of(columns) else {
        return Ok(());
    };
    let to = match traces
        .iter()
        .filter(|t| t.channel("size").is_some())
        .find_map(|t| t.palettes.sizes.as_ref())
    {
        Some(value) => size_range(value)?,
        None => opts.sizes,
    };
    debug!("size scale [{}, {}] -> {:?}", range.min, range.max, to);

    for trace in traces.iter_mut() {
        let Some(Column::Numeric(values)) = trace.channel("size") else {
            continue;
        };
        let scaled = Column::Numeric(
            values
                .iter()
                .map(|v| v.map(|v| range.rescale(v, to)))
                .collect(),
        );
        let size = Node::Data(scaled).to_json();

        if has_marker(schema, trace) {
            let mut marker = Map::new();
            marker.insert("size".into(), size);
            marker.insert("sizemode".into(), json!("area"));
            trace.merge_under("marker", marker);
        }
        if has_line(schema, trace) {
            ctx.warn("line.width does not currently support multiple values; size only applies to markers");
        }
        if has_text(schema, trace) && carries_text(trace) {
            ctx.warn("textfont.size does not currently support multiple values; size only applies to markers");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Factor;
    use crate::ir::Attrs;
    use crate::schema::PlotlySchema;

    fn trace(size: Column, mode: &str) -> Trace {
        let mut attrs = Attrs::new();
        attrs.insert("type".into(), Node::Literal(json!("scatter")));
        attrs.insert("mode".into(), Node::Literal(json!(mode)));
        attrs.insert("size".into(), Node::Data(size));
        Trace::new(attrs, 0)
    }

    fn run(traces: &mut [Trace]) -> Result<BuildContext> {
        let mut ctx = BuildContext::new();
        map_size(traces, &PlotlySchema, &BuildOptions::default(), &mut ctx)?;
        Ok(ctx)
    }

    #[test]
    fn test_sizes_shared_across_traces() {
        let mut traces = vec![
            trace(Column::Numeric(vec![Some(0.0), Some(5.0)]), "markers"),
            trace(Column::Numeric(vec![Some(10.0), None]), "markers"),
        ];
        run(&mut traces).unwrap();
        let first = Node::Map(traces[0].attrs.clone()).to_json();
        assert_eq!(first["marker"]["size"], json!([10.0, 55.0]));
        assert_eq!(first["marker"]["sizemode"], json!("area"));
        let second = Node::Map(traces[1].attrs.clone()).to_json();
        assert_eq!(second["marker"]["size"], json!([100.0, null]));
    }

    #[test]
    fn test_discrete_size_is_error() {
        let levels = Factor::new(vec![Some("a".into()), Some("b".into()), Some("c".into())]);
        let mut traces = vec![trace(Column::Discrete(levels), "markers")];
        let err = run(&mut traces).unwrap_err();
        assert_eq!(err.downcast_ref::<BuildError>(), Some(&BuildError::DiscreteSize));
    }

    #[test]
    fn test_size_on_lines_warns() {
        let mut traces = vec![trace(Column::Numeric(vec![Some(1.0), Some(2.0)]), "markers+lines")];
        let ctx = run(&mut traces).unwrap();
        assert_eq!(ctx.warnings().count(), 1);
    }

    #[test]
    fn test_size_on_bar_warns_only_with_text() {
        let mut attrs = Attrs::new();
        attrs.insert("type".into(), Node::Literal(json!("bar")));
        attrs.insert("size".into(), Node::Data(Column::Numeric(vec![Some(1.0), Some(2.0)])));
        let ctx = run(&mut [Trace::new(attrs.clone(), 0)]).unwrap();
        assert_eq!(ctx.warnings().count(), 0);

        attrs.insert("texttemplate".into(), Node::Literal(json!("%{y}")));
        let ctx = run(&mut [Trace::new(attrs, 0)]).unwrap();
        assert_eq!(ctx.warnings().count(), 1);
    }

    #[test]
    fn test_custom_sizes_parameter() {
        let mut t = trace(Column::Numeric(vec![Some(1.0), Some(3.0)]), "markers");
        t.palettes.sizes = Some(json!([2, 4]));
        let mut traces = vec![t];
        run(&mut traces).unwrap();
        let json = Node::Map(traces[0].attrs.clone()).to_json();
        assert_eq!(json["marker"]["size"], json!([2.0, 4.0]));
    }

    #[test]
    fn test_bad_sizes_parameter() {
        let mut t = trace(Column::Numeric(vec![Some(1.0)]), "markers");
        t.palettes.sizes = Some(json!([2]));
        assert!(run(&mut [t]).is_err());
    }
}

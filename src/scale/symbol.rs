use super::{append_mode, first_palette, global_levels, has_marker, lookup, DiscretePalette};
use crate::ir::{BuildContext, Trace};
use crate::schema::Vocabulary;
use crate::BuildError;
use anyhow::Result;
use serde_json::Map;
use tracing::debug;

/// Symbols beyond this many stop being distinguishable
const MAX_SYMBOLS: usize = 8;

const DEFAULT_SYMBOLS: [&str; MAX_SYMBOLS] = [
    "circle",
    "triangle-up",
    "square",
    "cross",
    "x",
    "diamond",
    "triangle-down",
    "star",
];

/// Assign a marker symbol to each level of the `symbol` mapping
pub fn map_symbol(traces: &mut [Trace], schema: &dyn Vocabulary, ctx: &mut BuildContext) -> Result<()> {
    if traces.iter().all(|t| t.channel("symbol").is_none()) {
        return Ok(());
    }
    if traces
        .iter()
        .filter_map(|t| t.channel("symbol"))
        .any(|c| !c.is_discrete())
    {
        ctx.warn("The `symbol` argument only works with discrete variables; numeric values are treated as categories");
    }

    let levels = global_levels(traces.iter().filter_map(|t| t.channel("symbol")));
    if levels.len() > MAX_SYMBOLS {
        ctx.warn(format!(
            "The shape palette can deal with a maximum of {} discrete values because more than {} \
             becomes difficult to discriminate; you have {}. Consider specifying shapes manually.",
            MAX_SYMBOLS,
            MAX_SYMBOLS,
            levels.len()
        ));
    }

    let palette = match first_palette(traces, "symbol", |t| t.palettes.symbols.as_ref()) {
        Some(value) => DiscretePalette::from_value(value, "symbol")?,
        None => DiscretePalette::from_defaults(&DEFAULT_SYMBOLS),
    };
    let legal = schema.symbols();
    let invalid = palette.invalid_entries(&legal);
    if !invalid.is_empty() {
        return Err(BuildError::InvalidSymbols {
            invalid: invalid.join("', '"),
            valid: legal.join("', '"),
        }
        .into());
    }
    let table = palette.assign(&levels);
    debug!("symbol scale over {} levels", levels.len());

    for trace in traces.iter_mut() {
        let Some(values) = trace.channel("symbol") else {
            continue;
        };
        let symbol = lookup(values, &table);
        if !schema.has_attr(trace.type_name().unwrap_or("scatter"), "marker") {
            ctx.warn(format!(
                "'{}' traces have no markers; symbol mapping ignored",
                trace.type_name().unwrap_or("scatter")
            ));
            continue;
        }
        append_mode(trace, "markers", "symbol", ctx);
        if has_marker(schema, trace) {
            let mut marker = Map::new();
            marker.insert("symbol".into(), symbol);
            trace.merge_under("marker", marker);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Column, Factor};
    use crate::ir::{Attrs, Node};
    use crate::schema::PlotlySchema;
    use serde_json::json;

    fn trace(level: &str, mode: &str) -> Trace {
        let mut attrs = Attrs::new();
        attrs.insert("type".into(), Node::Literal(json!("scatter")));
        attrs.insert("mode".into(), Node::Literal(json!(mode)));
        attrs.insert(
            "symbol".into(),
            Node::Data(Column::Discrete(Factor::new(vec![Some(level.to_string())]))),
        );
        Trace::new(attrs, 0)
    }

    fn symbol_of(trace: &Trace) -> serde_json::Value {
        Node::Map(trace.attrs.clone()).to_json()["marker"]["symbol"].clone()
    }

    #[test]
    fn test_symbols_in_level_order() {
        let mut traces = vec![trace("a", "markers"), trace("b", "markers")];
        let mut ctx = BuildContext::new();
        map_symbol(&mut traces, &PlotlySchema, &mut ctx).unwrap();
        assert_eq!(symbol_of(&traces[0]), json!("circle"));
        assert_eq!(symbol_of(&traces[1]), json!("triangle-up"));
        assert_eq!(ctx.warnings().count(), 0);
    }

    #[test]
    fn test_more_than_eight_levels_warns() {
        let names: Vec<String> = (0..10).map(|i| format!("l{}", i)).collect();
        let mut traces: Vec<Trace> = names.iter().map(|n| trace(n, "markers")).collect();
        let mut ctx = BuildContext::new();
        map_symbol(&mut traces, &PlotlySchema, &mut ctx).unwrap();
        assert_eq!(ctx.warnings().count(), 1);
        let assigned: Vec<_> = traces.iter().map(symbol_of).collect();
        let expected: Vec<_> = DEFAULT_SYMBOLS.iter().map(|s| json!(s)).collect();
        assert_eq!(&assigned[..8], &expected[..]);
        assert_eq!(assigned[8], serde_json::Value::Null);
    }

    #[test]
    fn test_invalid_palette_lists_legal_values() {
        let mut t = trace("a", "markers");
        t.palettes.symbols = Some(json!(["circle", "blob"]));
        let err = map_symbol(&mut [t], &PlotlySchema, &mut BuildContext::new()).unwrap_err();
        match err.downcast_ref::<BuildError>() {
            Some(BuildError::InvalidSymbols { invalid, valid }) => {
                assert_eq!(invalid, "blob");
                assert!(valid.contains("diamond-open"));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_numeric_symbol_treated_as_categories() {
        let mut attrs = Attrs::new();
        attrs.insert("type".into(), Node::Literal(json!("scatter")));
        attrs.insert("mode".into(), Node::Literal(json!("markers")));
        attrs.insert(
            "symbol".into(),
            Node::Data(Column::Numeric(vec![Some(4.0), Some(6.0), Some(4.0)])),
        );
        let mut traces = vec![Trace::new(attrs, 0)];
        let mut ctx = BuildContext::new();
        map_symbol(&mut traces, &PlotlySchema, &mut ctx).unwrap();
        let warnings: Vec<&str> = ctx.warnings().collect();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("discrete"));
        assert_eq!(symbol_of(&traces[0]), json!(["circle", "triangle-up", "circle"]));
    }

    #[test]
    fn test_adds_markers_to_mode() {
        let mut traces = vec![trace("a", "lines")];
        let mut ctx = BuildContext::new();
        map_symbol(&mut traces, &PlotlySchema, &mut ctx).unwrap();
        assert_eq!(traces[0].mode(), Some("lines+markers"));
        assert_eq!(symbol_of(&traces[0]), json!("circle"));
        assert_eq!(ctx.diagnostics.len(), 1);
    }
}

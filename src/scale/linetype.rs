use super::{append_mode, first_palette, global_levels, has_line, lookup, scalar, DiscretePalette};
use crate::ir::{BuildContext, Trace};
use crate::schema::{Vocabulary, DASHES};
use crate::BuildError;
use anyhow::Result;
use serde_json::Map;
use tracing::debug;

/// Assign a dash style to each level of the `linetype` mapping.
///
/// Levels beyond the end of the palette are left unstyled.
pub fn map_linetype(traces: &mut [Trace], schema: &dyn Vocabulary, ctx: &mut BuildContext) -> Result<()> {
    if traces.iter().all(|t| t.channel("linetype").is_none()) {
        return Ok(());
    }
    if traces
        .iter()
        .filter_map(|t| t.channel("linetype"))
        .any(|c| !c.is_discrete())
    {
        ctx.warn("The `linetype` argument only works with discrete variables; numeric values are treated as categories");
    }

    let levels = global_levels(traces.iter().filter_map(|t| t.channel("linetype")));
    let palette = match first_palette(traces, "linetype", |t| t.palettes.linetypes.as_ref()) {
        Some(value) => DiscretePalette::from_value(value, "linetype")?,
        None => DiscretePalette::from_defaults(&DASHES),
    };
    let legal = schema.dashes();
    let invalid = palette.invalid_entries(&legal);
    if !invalid.is_empty() {
        return Err(BuildError::InvalidLinetypes {
            invalid: invalid.join("', '"),
            valid: legal.join("', '"),
        }
        .into());
    }
    if palette.names.is_none() && levels.len() > palette.entries.len() {
        ctx.warn(format!(
            "The linetype palette has {} values but there are {} levels; the extra levels are drawn without a dash style",
            palette.entries.len(),
            levels.len()
        ));
    }
    let table = palette.assign(&levels);
    debug!("linetype scale over {} levels", levels.len());

    for trace in traces.iter_mut() {
        let Some(values) = trace.channel("linetype") else {
            continue;
        };
        let dash = scalar(lookup(values, &table));
        if !schema.has_attr(trace.type_name().unwrap_or("scatter"), "line") {
            ctx.warn(format!(
                "'{}' traces have no lines; linetype mapping ignored",
                trace.type_name().unwrap_or("scatter")
            ));
            continue;
        }
        append_mode(trace, "lines", "linetype", ctx);
        if has_line(schema, trace) {
            let mut line = Map::new();
            line.insert("dash".into(), dash);
            trace.merge_under("line", line);
        }
    }
    Ok(())
}

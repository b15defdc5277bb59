// Runtime executor: plot specification -> plotly figure

use crate::infer::{HeuristicTypes, TypeInferencer};
use crate::ir::{
    attrs_to_json, merge_defaults, Attrs, BuildContext, Diagnostic, Figure, Node, Palettes, Trace,
    CHANNELS, PALETTES,
};
use crate::layout::{infer_axis_titles, merge_layouts, modify_list};
use crate::normalize::{Normalizer, PlotlyNormalizer};
use crate::parser::ast::{AttrValue, PlotSpec, SourceSpec};
use crate::resolve::resolve_attrs;
use crate::scale::{map_color, map_linetype, map_size, map_symbol};
use crate::schema::{is_scatter_like, PlotlySchema, Vocabulary, Z_COLOR_TYPES};
use crate::transform::split_source;
use anyhow::{Context, Result};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Build a figure with the default collaborators
pub fn build_plot(spec: &PlotSpec) -> Result<Figure> {
    build_with_diagnostics(spec).map(|(figure, _)| figure)
}

/// Build a figure and return the warnings and notices raised on the way
pub fn build_with_diagnostics(spec: &PlotSpec) -> Result<(Figure, Vec<Diagnostic>)> {
    Pipeline::default().run(spec)
}

/// The build pipeline together with its pluggable collaborators
pub struct Pipeline {
    pub schema: Box<dyn Vocabulary>,
    pub inferencer: Box<dyn TypeInferencer>,
    pub normalizer: Box<dyn Normalizer>,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self {
            schema: Box::new(PlotlySchema),
            inferencer: Box::new(HeuristicTypes::default()),
            normalizer: Box::new(PlotlyNormalizer),
        }
    }
}

impl Pipeline {
    pub fn run(&self, spec: &PlotSpec) -> Result<(Figure, Vec<Diagnostic>)> {
        let schema = self.schema.as_ref();
        let opts = &spec.options;
        let mut ctx = BuildContext::new();

        // 1. Merge layouts
        let mut layout = merge_layouts(spec).context("Failed to build layout")?;

        // 2. A leading untyped source only carries shared defaults
        let skip_first = spec.traces.len() > 1 && !spec.traces[0].attrs.contains_key("type");
        if skip_first {
            debug!("dropping untyped leading trace");
        }

        // 3. Evaluate, type and split each source
        let mut traces: Vec<Trace> = Vec::new();
        for (index, source) in spec.traces.iter().enumerate().skip(usize::from(skip_first)) {
            let built = self
                .build_source(spec, index, source, &mut layout, &mut ctx)
                .with_context(|| format!("Failed to build trace {}", index + 1))?;
            traces.extend(built);
        }

        // 4. Shared scales
        map_color(&mut traces, schema, opts, &mut ctx)?;
        map_size(&mut traces, schema, opts, &mut ctx)?;
        map_symbol(&mut traces, schema, &mut ctx)?;
        map_linetype(&mut traces, schema, &mut ctx)?;

        // 5-6. Colour bar and legend placement
        reconcile_colorbar_legend(&mut traces, &mut layout);

        // 7-8. Drop bookkeeping, emit
        let data: Vec<Value> = traces.iter().map(finalize_trace).collect();
        let mut figure = Figure { data, layout };

        // 9. Normalize
        self.normalizer
            .normalize(&mut figure, schema, &mut ctx)
            .context("Failed to normalize figure")?;

        info!(
            "built {} trace(s), {} warning(s)",
            figure.data.len(),
            ctx.warnings().count()
        );
        Ok((figure, ctx.diagnostics))
    }

    fn build_source(
        &self,
        spec: &PlotSpec,
        index: usize,
        source: &SourceSpec,
        layout: &mut Map<String, Value>,
        ctx: &mut BuildContext,
    ) -> Result<Vec<Trace>> {
        let data = spec.dataset_for(source)?;
        let mut attrs = resolve_attrs(&source.attrs, &data)?;
        let palettes = take_palettes(&mut attrs);

        let mut template = Trace::new(attrs, index);
        self.inferencer.infer(&mut template, self.schema.as_ref(), ctx)?;
        default_mode(&mut template, spec.options.mode_threshold);
        let trace_type = template.type_name().unwrap_or("scatter").to_string();
        infer_axis_titles(layout, source, &trace_type);

        let labels = channel_labels(source);
        let mut traces = split_source(template.attrs, &data, index, ctx);
        debug!("source {} ({}) -> {} trace(s)", index + 1, trace_type, traces.len());
        for trace in &mut traces {
            trace.palettes = palettes.clone();
            trace.labels = labels.clone();
        }
        Ok(traces)
    }
}

/// Pull the palette parameters out of a source's attributes
fn take_palettes(attrs: &mut Attrs) -> Palettes {
    let mut take = |key: &str| attrs.remove(key).map(|node| node.to_json());
    Palettes {
        colors: take("colors"),
        sizes: take("sizes"),
        symbols: take("symbols"),
        linetypes: take("linetypes"),
    }
}

/// Formula text of every mapped channel
fn channel_labels(source: &SourceSpec) -> BTreeMap<String, String> {
    CHANNELS
        .iter()
        .filter_map(|ch| match source.attrs.get(*ch) {
            Some(AttrValue::Formula(f)) => Some((ch.to_string(), f.label().to_string())),
            _ => None,
        })
        .collect()
}

/// Scatter-like traces without a mode draw lines when dense, otherwise
/// markers joined by lines
fn default_mode(trace: &mut Trace, threshold: usize) {
    let scatter = trace.type_name().map(is_scatter_like).unwrap_or(false);
    if !scatter || trace.mode().is_some() {
        return;
    }
    let mode = if trace.max_len() > threshold {
        "lines"
    } else {
        "markers+lines"
    };
    trace.set("mode", json!(mode));
}

fn shows_legend(trace: &Trace) -> bool {
    !trace.colorbar && trace.get("showlegend") != Some(&Node::Literal(Value::Bool(false)))
}

/// Keep a colour bar and a legend from overlapping. With two traces or fewer
/// the legend is hidden; otherwise the colour bar takes the top half and the
/// legend the bottom half.
fn reconcile_colorbar_legend(traces: &mut [Trace], layout: &mut Map<String, Value>) {
    let has_colorbar = traces.iter().any(|t| t.colorbar);
    let has_legend = traces.iter().any(shows_legend);
    if !(has_colorbar && has_legend) {
        return;
    }
    if traces.len() <= 2 {
        layout.entry("showlegend").or_insert(Value::Bool(false));
        return;
    }

    let placement = json!({"len": 0.5, "lenmode": "fraction", "y": 1, "yanchor": "top"});
    for trace in traces.iter_mut().filter(|t| t.colorbar) {
        let mut defaults = Map::new();
        defaults.insert("colorbar".into(), placement.clone());
        if Z_COLOR_TYPES.contains(&trace.type_name().unwrap_or("")) {
            merge_defaults(&mut trace.attrs, defaults);
        } else {
            trace.merge_under("marker", defaults);
        }
    }

    let mut legend = json!({"y": 0.5, "yanchor": "top"})
        .as_object()
        .cloned()
        .unwrap_or_default();
    if let Some(Value::Object(existing)) = layout.remove("legend") {
        modify_list(&mut legend, existing);
    }
    layout.insert("legend".into(), Value::Object(legend));
}

/// JSON object of a trace without mapping channels or palette parameters
fn finalize_trace(trace: &Trace) -> Value {
    let mut obj = attrs_to_json(&trace.attrs);
    for key in CHANNELS.iter().chain(PALETTES.iter()) {
        obj.remove(*key);
    }
    Value::Object(obj)
}

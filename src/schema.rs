//! Legal vocabulary for trace attributes, marker symbols and dash styles.
//!
//! A compact embedding of the parts of the plotly.js schema that the build
//! pipeline consults. Everything goes through [`Vocabulary`] so a caller can
//! plug in a full schema instead.

/// Read-only lookup of schema-driven vocabularies
pub trait Vocabulary {
    /// Valid `marker.symbol` values, names and numeric codes
    fn symbols(&self) -> Vec<String>;
    /// Valid `line.dash` values
    fn dashes(&self) -> Vec<String>;
    /// Known trace types
    fn trace_types(&self) -> Vec<&'static str>;
    /// Top-level attribute names of a trace type, `None` if the type is unknown
    fn attributes(&self, trace_type: &str) -> Option<Vec<&'static str>>;

    fn has_attr(&self, trace_type: &str, attr: &str) -> bool {
        self.attributes(trace_type)
            .map(|attrs| attrs.contains(&attr))
            .unwrap_or(false)
    }
}

const SYMBOL_NAMES: [&str; 45] = [
    "circle", "square", "diamond", "cross", "x", "triangle-up", "triangle-down",
    "triangle-left", "triangle-right", "triangle-ne", "triangle-se", "triangle-sw",
    "triangle-nw", "pentagon", "hexagon", "hexagon2", "octagon", "star", "hexagram",
    "star-triangle-up", "star-triangle-down", "star-square", "star-diamond",
    "diamond-tall", "diamond-wide", "hourglass", "bowtie", "circle-cross", "circle-x",
    "square-cross", "square-x", "diamond-cross", "diamond-x", "cross-thin", "x-thin",
    "asterisk", "hash", "y-up", "y-down", "y-left", "y-right", "line-ew", "line-ns",
    "line-ne", "line-nw",
];

const SYMBOL_SUFFIXES: [(&str, usize); 4] = [("", 0), ("-open", 100), ("-dot", 200), ("-open-dot", 300)];

pub const DASHES: [&str; 6] = ["solid", "dot", "dash", "longdash", "dashdot", "longdashdot"];

/// Types with three spatial dimensions, titled under `layout.scene`
pub const TYPES_3D: [&str; 3] = ["scatter3d", "surface", "mesh3d"];

/// Types coloured through a top-level `z`/colorscale rather than markers
pub const Z_COLOR_TYPES: [&str; 5] = ["heatmap", "contour", "surface", "histogram2d", "histogram2dcontour"];

/// Types whose `line.color` accepts per-point arrays
pub const LINE_COLOR_ARRAY_TYPES: [&str; 1] = ["scatter3d"];

pub fn is_3d(trace_type: &str) -> bool {
    TYPES_3D.contains(&trace_type)
}

pub fn is_scatter_like(trace_type: &str) -> bool {
    trace_type.starts_with("scatter")
}

const COMMON: [&str; 20] = [
    "type", "name", "visible", "showlegend", "legendgroup", "legendrank", "opacity", "ids",
    "customdata", "meta", "hoverinfo", "hovertext", "hovertemplate", "hoverlabel", "uid",
    "uirevision", "selectedpoints", "stream", "xaxis", "yaxis",
];

const COLORSCALE: [&str; 10] = [
    "colorscale", "autocolorscale", "reversescale", "showscale", "colorbar", "coloraxis",
    "zauto", "zmin", "zmax", "zmid",
];

fn type_attributes(trace_type: &str) -> Option<Vec<&'static str>> {
    let specific: Vec<&'static str> = match trace_type {
        "scatter" | "scattergl" => vec![
            "x", "y", "x0", "dx", "y0", "dy", "mode", "text", "textposition", "textfont",
            "texttemplate", "line", "marker", "connectgaps", "fill", "fillcolor", "error_x",
            "error_y", "orientation", "groupnorm", "stackgroup", "stackgaps", "cliponaxis",
            "hoveron", "selected", "unselected",
        ],
        "bar" => vec![
            "x", "y", "x0", "dx", "y0", "dy", "text", "textposition", "textfont", "texttemplate",
            "textangle", "insidetextfont", "outsidetextfont", "marker", "orientation", "width",
            "offset", "base", "error_x", "error_y", "offsetgroup", "alignmentgroup", "cliponaxis",
            "constraintext",
        ],
        "histogram" => vec![
            "x", "y", "histfunc", "histnorm", "nbinsx", "nbinsy", "xbins", "ybins", "autobinx",
            "autobiny", "bingroup", "cumulative", "marker", "orientation", "text", "textfont",
            "error_x", "error_y", "offsetgroup", "alignmentgroup",
        ],
        "box" => vec![
            "x", "y", "x0", "y0", "boxpoints", "boxmean", "notched", "jitter", "pointpos",
            "orientation", "marker", "line", "fillcolor", "whiskerwidth", "width", "text", "q1",
            "median", "q3", "lowerfence", "upperfence", "mean", "sd", "offsetgroup",
            "alignmentgroup",
        ],
        "violin" => vec![
            "x", "y", "x0", "y0", "box", "meanline", "points", "side", "span", "spanmode",
            "bandwidth", "scalegroup", "scalemode", "jitter", "pointpos", "orientation", "marker",
            "line", "fillcolor", "width", "text", "offsetgroup", "alignmentgroup",
        ],
        "heatmap" => vec![
            "z", "x", "y", "x0", "dx", "y0", "dy", "text", "transpose", "xtype", "ytype",
            "zsmooth", "connectgaps", "xgap", "ygap", "zhoverformat",
        ],
        "contour" => vec![
            "z", "x", "y", "x0", "dx", "y0", "dy", "text", "transpose", "xtype", "ytype",
            "connectgaps", "contours", "line", "ncontours", "autocontour", "fillcolor",
        ],
        "histogram2d" => vec![
            "x", "y", "z", "histfunc", "histnorm", "nbinsx", "nbinsy", "xbins", "ybins",
            "autobinx", "autobiny", "marker", "zsmooth", "xgap", "ygap",
        ],
        "histogram2dcontour" => vec![
            "x", "y", "z", "histfunc", "histnorm", "nbinsx", "nbinsy", "xbins", "ybins",
            "autobinx", "autobiny", "marker", "contours", "line", "ncontours", "autocontour",
        ],
        "surface" => vec![
            "x", "y", "z", "surfacecolor", "cmin", "cmax", "cauto", "contours", "hidesurface",
            "lighting", "lightposition", "opacityscale", "text", "scene",
        ],
        "scatter3d" => vec![
            "x", "y", "z", "mode", "text", "textposition", "textfont", "line", "marker",
            "surfaceaxis", "surfacecolor", "projection", "error_x", "error_y", "error_z",
            "connectgaps", "scene",
        ],
        "mesh3d" => vec![
            "x", "y", "z", "i", "j", "k", "intensity", "intensitymode", "color", "vertexcolor",
            "facecolor", "cmin", "cmax", "alphahull", "delaunayaxis", "flatshading", "contour",
            "lighting", "lightposition", "text", "scene",
        ],
        "pie" => vec![
            "labels", "values", "label0", "dlabel", "marker", "text", "textinfo", "textposition",
            "textfont", "insidetextfont", "outsidetextfont", "hole", "sort", "direction",
            "rotation", "pull", "domain", "title", "scalegroup",
        ],
        "scatterpolar" => vec![
            "r", "theta", "mode", "text", "textposition", "textfont", "line", "marker", "fill",
            "fillcolor", "connectgaps", "subplot", "thetaunit",
        ],
        _ => return None,
    };
    let mut attrs: Vec<&'static str> = COMMON.to_vec();
    attrs.extend(specific);
    if Z_COLOR_TYPES.contains(&trace_type) || trace_type == "mesh3d" {
        attrs.extend(COLORSCALE);
    }
    Some(attrs)
}

const TRACE_TYPES: [&str; 15] = [
    "scatter", "scattergl", "bar", "histogram", "box", "violin", "heatmap", "contour",
    "histogram2d", "histogram2dcontour", "surface", "scatter3d", "mesh3d", "pie",
    "scatterpolar",
];

/// The embedded plotly.js vocabulary
#[derive(Debug, Clone, Copy, Default)]
pub struct PlotlySchema;

impl Vocabulary for PlotlySchema {
    fn symbols(&self) -> Vec<String> {
        let mut out = Vec::with_capacity(SYMBOL_NAMES.len() * 8);
        for (suffix, offset) in SYMBOL_SUFFIXES {
            for (code, name) in SYMBOL_NAMES.iter().enumerate() {
                out.push(format!("{}{}", name, suffix));
                out.push((code + offset).to_string());
            }
        }
        out
    }

    fn dashes(&self) -> Vec<String> {
        DASHES.iter().map(|d| d.to_string()).collect()
    }

    fn trace_types(&self) -> Vec<&'static str> {
        TRACE_TYPES.to_vec()
    }

    fn attributes(&self, trace_type: &str) -> Option<Vec<&'static str>> {
        type_attributes(trace_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbols_include_variants_and_codes() {
        let symbols = PlotlySchema.symbols();
        assert!(symbols.contains(&"circle".to_string()));
        assert!(symbols.contains(&"square-open-dot".to_string()));
        assert!(symbols.contains(&"344".to_string()));
        assert!(!symbols.contains(&"dot".to_string()));
    }

    #[test]
    fn test_has_attr() {
        assert!(PlotlySchema.has_attr("scatter", "marker"));
        assert!(!PlotlySchema.has_attr("heatmap", "marker"));
        assert!(PlotlySchema.has_attr("heatmap", "colorscale"));
        assert!(!PlotlySchema.has_attr("nope", "x"));
    }

    #[test]
    fn test_trace_types_unique() {
        let types = PlotlySchema.trace_types();
        let mut sorted = types.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), types.len());
    }
}

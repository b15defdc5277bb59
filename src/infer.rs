use crate::data::Column;
use crate::ir::{BuildContext, Node, Trace};
use crate::schema::Vocabulary;
use crate::BuildError;
use anyhow::Result;
use serde_json::Value;

/// Above this many points a numeric x/y trace becomes `scattergl`
pub const GL_THRESHOLD: usize = 15000;

/// Decides the `type` of a trace that does not name one and validates the
/// ones that do.
pub trait TypeInferencer {
    fn infer(&self, trace: &mut Trace, schema: &dyn Vocabulary, ctx: &mut BuildContext) -> Result<()>;
}

/// Picks a type from which positional attributes are present and whether
/// they are numeric.
#[derive(Debug, Clone, Copy)]
pub struct HeuristicTypes {
    pub gl_threshold: usize,
}

impl Default for HeuristicTypes {
    fn default() -> Self {
        Self { gl_threshold: GL_THRESHOLD }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Kind {
    Numeric,
    Discrete,
}

fn kind(node: Option<&Node>) -> Option<Kind> {
    match node? {
        Node::Data(c) | Node::AsIs(c) => Some(match c {
            Column::Numeric(_) => Kind::Numeric,
            Column::Discrete(_) => Kind::Discrete,
        }),
        Node::Literal(Value::Array(items)) if items.iter().all(|v| v.is_number() || v.is_null()) => {
            Some(Kind::Numeric)
        }
        Node::Literal(Value::Number(_)) => Some(Kind::Numeric),
        Node::Literal(Value::Null) => None,
        Node::Literal(_) => Some(Kind::Discrete),
        Node::Map(_) => None,
    }
}

impl HeuristicTypes {
    fn guess(&self, trace: &Trace) -> (&'static str, bool) {
        let x = kind(trace.get("x"));
        let y = kind(trace.get("y"));
        let z = kind(trace.get("z"));
        let has = |key: &str| trace.get(key).is_some();

        match (x, y, z) {
            (Some(_), Some(_), Some(_)) if has("i") && has("j") && has("k") => ("mesh3d", true),
            (Some(_), Some(_), Some(_)) => ("scatter3d", true),
            (Some(Kind::Numeric), Some(Kind::Numeric), None) => {
                if trace.max_len() > self.gl_threshold {
                    ("scattergl", true)
                } else {
                    ("scatter", true)
                }
            }
            (Some(Kind::Discrete), Some(Kind::Discrete), None) => ("histogram2d", true),
            (Some(_), Some(_), None) => ("bar", true),
            (Some(_), None, None) | (None, Some(_), None) => ("histogram", true),
            (None, None, Some(_)) => ("heatmap", true),
            _ => ("scatter", false),
        }
    }
}

impl TypeInferencer for HeuristicTypes {
    fn infer(&self, trace: &mut Trace, schema: &dyn Vocabulary, ctx: &mut BuildContext) -> Result<()> {
        if let Some(node) = trace.get("type") {
            let valid = schema.trace_types();
            return match node.as_str() {
                Some(t) if valid.contains(&t) => Ok(()),
                _ => Err(BuildError::UnknownTraceType {
                    got: node.to_json().to_string().trim_matches('"').to_string(),
                    valid: valid.join("', '"),
                }
                .into()),
            };
        }

        let (trace_type, confident) = self.guess(trace);
        if confident {
            ctx.note(format!(
                "No trace type specified: inferring a trace type of '{}'",
                trace_type
            ));
        } else {
            ctx.warn(format!(
                "No trace type specified and no positional attributes to go on: defaulting to '{}'",
                trace_type
            ));
        }
        trace.set("type", Value::String(trace_type.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Factor;
    use crate::ir::Attrs;
    use crate::schema::PlotlySchema;
    use serde_json::json;

    fn num(n: usize) -> Node {
        Node::Data(Column::Numeric((0..n).map(|i| Some(i as f64)).collect()))
    }

    fn cat(values: &[&str]) -> Node {
        Node::Data(Column::Discrete(Factor::new(
            values.iter().map(|s| Some(s.to_string())).collect(),
        )))
    }

    fn infer(pairs: Vec<(&str, Node)>) -> (Result<()>, Trace, BuildContext) {
        let attrs: Attrs = pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect();
        let mut trace = Trace::new(attrs, 0);
        let mut ctx = BuildContext::new();
        let result = HeuristicTypes::default().infer(&mut trace, &PlotlySchema, &mut ctx);
        (result, trace, ctx)
    }

    #[test]
    fn test_numeric_xy_is_scatter() {
        let (r, trace, _) = infer(vec![("x", num(3)), ("y", num(3))]);
        assert!(r.is_ok());
        assert_eq!(trace.type_name(), Some("scatter"));
    }

    #[test]
    fn test_large_xy_is_scattergl() {
        let (_, trace, _) = infer(vec![("x", num(GL_THRESHOLD + 1)), ("y", num(GL_THRESHOLD + 1))]);
        assert_eq!(trace.type_name(), Some("scattergl"));
    }

    #[test]
    fn test_discrete_x_numeric_y_is_bar() {
        let (_, trace, _) = infer(vec![("x", cat(&["a", "b"])), ("y", num(2))]);
        assert_eq!(trace.type_name(), Some("bar"));
    }

    #[test]
    fn test_single_axis_is_histogram() {
        let (_, trace, _) = infer(vec![("x", num(4))]);
        assert_eq!(trace.type_name(), Some("histogram"));
    }

    #[test]
    fn test_xyz_is_scatter3d() {
        let (_, trace, _) = infer(vec![("x", num(2)), ("y", num(2)), ("z", num(2))]);
        assert_eq!(trace.type_name(), Some("scatter3d"));
    }

    #[test]
    fn test_no_positions_warns() {
        let (r, trace, ctx) = infer(vec![("opacity", Node::Literal(json!(0.5)))]);
        assert!(r.is_ok());
        assert_eq!(trace.type_name(), Some("scatter"));
        assert_eq!(ctx.warnings().count(), 1);
    }

    #[test]
    fn test_unknown_type_is_error() {
        let (r, _, _) = infer(vec![("type", Node::Literal(json!("sankey-ish")))]);
        let err = r.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BuildError>(),
            Some(BuildError::UnknownTraceType { got, .. }) if got == "sankey-ish"
        ));
    }
}

use crate::data::Column;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::{info, warn};

// =============================================================================
// Phase 1: Resolution
// =============================================================================

/// Resolved attribute set: the attribute spec with every formula evaluated
pub type Attrs = BTreeMap<String, Node>;

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// A literal value from the spec. Never scaled.
    Literal(Value),
    /// Values computed from the dataset, eligible for scale mapping
    Data(Column),
    /// Values computed from the dataset but wrapped in `I()`
    AsIs(Column),
    Map(Attrs),
}

impl Node {
    /// Length used for row subsetting; `None` for scalars and maps
    pub fn row_len(&self) -> Option<usize> {
        match self {
            Node::Data(c) | Node::AsIs(c) => Some(c.len()),
            Node::Literal(Value::Array(items)) => Some(items.len()),
            _ => None,
        }
    }

    /// Structure-preserving row selection: every leaf of length `n` is
    /// rebuilt from `rows` (`None` yields a missing value), everything else
    /// is copied as-is.
    pub fn select_rows(&self, n: usize, rows: &[Option<usize>]) -> Node {
        match self {
            Node::Map(attrs) => Node::Map(select_rows(attrs, n, rows)),
            node if node.row_len() != Some(n) => node.clone(),
            Node::Data(c) => Node::Data(c.take(rows)),
            Node::AsIs(c) => Node::AsIs(c.take(rows)),
            Node::Literal(Value::Array(items)) => Node::Literal(Value::Array(
                rows.iter()
                    .map(|r| r.map(|i| items[i].clone()).unwrap_or(Value::Null))
                    .collect(),
            )),
            node => node.clone(),
        }
    }

    /// JSON form of the node; length-1 vectors are unboxed to scalars
    pub fn to_json(&self) -> Value {
        match self {
            Node::Literal(v) => v.clone(),
            Node::Data(c) | Node::AsIs(c) => match c.to_json() {
                Value::Array(mut items) if items.len() == 1 => items.remove(0),
                other => other,
            },
            Node::Map(attrs) => Value::Object(attrs_to_json(attrs)),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Node::Literal(Value::String(s)) => Some(s),
            _ => None,
        }
    }

    /// True for nodes that carry nothing: null, empty arrays, empty maps
    pub fn is_empty(&self) -> bool {
        match self {
            Node::Literal(Value::Null) => true,
            Node::Literal(Value::Array(a)) => a.is_empty(),
            Node::Literal(Value::Object(o)) => o.is_empty(),
            Node::Data(c) | Node::AsIs(c) => c.is_empty(),
            Node::Map(m) => m.is_empty(),
            Node::Literal(_) => false,
        }
    }
}

pub fn select_rows(attrs: &Attrs, n: usize, rows: &[Option<usize>]) -> Attrs {
    attrs
        .iter()
        .map(|(k, v)| (k.clone(), v.select_rows(n, rows)))
        .collect()
}

pub fn attrs_to_json(attrs: &Attrs) -> Map<String, Value> {
    attrs.iter().map(|(k, v)| (k.clone(), v.to_json())).collect()
}

/// Merge `defaults` under `target`: keys already present in `target` win,
/// nested maps are merged recursively.
pub fn merge_defaults(target: &mut Attrs, defaults: Map<String, Value>) {
    for (key, value) in defaults {
        match (target.get_mut(&key), value) {
            (None, value) => {
                target.insert(key, Node::Literal(value));
            }
            (Some(Node::Map(existing)), Value::Object(inner)) => merge_defaults(existing, inner),
            (Some(Node::Literal(Value::Object(existing))), Value::Object(inner)) => {
                let mut merged = inner;
                crate::layout::modify_list(&mut merged, std::mem::take(existing));
                *existing = merged;
            }
            (Some(_), _) => {}
        }
    }
}

// =============================================================================
// Phase 2: Trace skeletons
// =============================================================================

/// Palette parameters supplied alongside the channel mappings
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Palettes {
    pub colors: Option<Value>,
    pub sizes: Option<Value>,
    pub symbols: Option<Value>,
    pub linetypes: Option<Value>,
}

/// Attribute names consumed by the scale mappers rather than emitted
pub const CHANNELS: [&str; 5] = ["color", "size", "symbol", "linetype", "split"];
pub const PALETTES: [&str; 4] = ["colors", "sizes", "symbols", "linetypes"];

/// One trace-to-be
#[derive(Debug, Clone, PartialEq)]
pub struct Trace {
    pub attrs: Attrs,
    pub palettes: Palettes,
    /// Index of the data source this trace came from
    pub source: usize,
    /// Set on traces that display a shared numeric colour scale
    pub colorbar: bool,
    /// Formula text of each mapped channel, used to title its scale
    pub labels: BTreeMap<String, String>,
}

impl Trace {
    pub fn new(attrs: Attrs, source: usize) -> Self {
        Self {
            attrs,
            palettes: Palettes::default(),
            source,
            colorbar: false,
            labels: BTreeMap::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Node> {
        self.attrs.get(key)
    }

    pub fn type_name(&self) -> Option<&str> {
        self.get("type").and_then(Node::as_str)
    }

    pub fn mode(&self) -> Option<&str> {
        self.get("mode").and_then(Node::as_str)
    }

    pub fn set(&mut self, key: &str, value: Value) {
        self.attrs.insert(key.to_string(), Node::Literal(value));
    }

    /// Data-mapped channel value; constants and `I()` values are ignored
    pub fn channel(&self, name: &str) -> Option<&Column> {
        match self.attrs.get(name) {
            Some(Node::Data(c)) if !c.is_empty() => Some(c),
            _ => None,
        }
    }

    /// Data-valued attribute, mapped or `I()`
    pub fn column(&self, name: &str) -> Option<&Column> {
        match self.attrs.get(name) {
            Some(Node::Data(c)) | Some(Node::AsIs(c)) => Some(c),
            _ => None,
        }
    }

    /// Mutable access to a nested attribute map, creating it if needed
    pub fn map_mut(&mut self, key: &str) -> &mut Attrs {
        let entry = self
            .attrs
            .entry(key.to_string())
            .or_insert_with(|| Node::Map(Attrs::new()));
        if !matches!(entry, Node::Map(_)) {
            let previous = std::mem::replace(entry, Node::Map(Attrs::new()));
            if let (Node::Literal(Value::Object(obj)), Node::Map(map)) = (previous, &mut *entry) {
                for (k, v) in obj {
                    map.insert(k, Node::Literal(v));
                }
            }
        }
        match entry {
            Node::Map(map) => map,
            _ => unreachable!("entry was just replaced with a map"),
        }
    }

    /// Merge JSON defaults under a nested attribute (existing values win)
    pub fn merge_under(&mut self, key: &str, defaults: Map<String, Value>) {
        merge_defaults(self.map_mut(key), defaults);
    }

    /// Number of points: the longest data-valued attribute
    pub fn max_len(&self) -> usize {
        fn walk(attrs: &Attrs) -> usize {
            attrs
                .values()
                .map(|n| match n {
                    Node::Map(m) => walk(m),
                    n => n.row_len().unwrap_or(1),
                })
                .max()
                .unwrap_or(0)
        }
        walk(&self.attrs)
    }
}

// =============================================================================
// Phase 3: Output
// =============================================================================

/// The finished figure handed to the rendering collaborator
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Figure {
    pub data: Vec<Value>,
    pub layout: Map<String, Value>,
}

// =============================================================================
// Build context
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Warning,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub level: Level,
    pub message: String,
}

/// State scoped to a single build: the synthetic-name counter and the
/// diagnostics emitted so far.
#[derive(Debug, Default)]
pub struct BuildContext {
    next_id: usize,
    pub diagnostics: Vec<Diagnostic>,
}

impl BuildContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// A column name unique within this build
    pub fn fresh_name(&mut self, prefix: &str) -> String {
        let name = format!(".{}_{}", prefix, self.next_id);
        self.next_id += 1;
        name
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!("{}", message);
        self.diagnostics.push(Diagnostic {
            level: Level::Warning,
            message,
        });
    }

    pub fn note(&mut self, message: impl Into<String>) {
        let message = message.into();
        info!("{}", message);
        self.diagnostics.push(Diagnostic {
            level: Level::Info,
            message,
        });
    }

    pub fn warnings(&self) -> impl Iterator<Item = &str> {
        self.diagnostics
            .iter()
            .filter(|d| d.level == Level::Warning)
            .map(|d| d.message.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_select_rows_skips_scalars() {
        let mut attrs = Attrs::new();
        attrs.insert("x".into(), Node::Data(Column::Numeric(vec![Some(1.0), Some(2.0)])));
        attrs.insert("opacity".into(), Node::Literal(json!(0.5)));
        attrs.insert("text".into(), Node::Literal(json!(["a", "b"])));
        let out = select_rows(&attrs, 2, &[Some(1)]);
        assert_eq!(out["x"], Node::Data(Column::Numeric(vec![Some(2.0)])));
        assert_eq!(out["opacity"], Node::Literal(json!(0.5)));
        assert_eq!(out["text"], Node::Literal(json!(["b"])));
    }

    #[test]
    fn test_to_json_unboxes_single_values() {
        let node = Node::Data(Column::Numeric(vec![Some(3.0)]));
        assert_eq!(node.to_json(), json!(3.0));
    }

    #[test]
    fn test_merge_under_keeps_existing() {
        let mut trace = Trace::new(Attrs::new(), 0);
        trace.set("marker", json!({"color": "red"}));
        trace.merge_under("marker", json!({"color": "blue", "size": 4}).as_object().unwrap().clone());
        assert_eq!(
            Node::Map(trace.map_mut("marker").clone()).to_json(),
            json!({"color": "red", "size": 4})
        );
    }

    #[test]
    fn test_fresh_names_are_unique() {
        let mut ctx = BuildContext::new();
        assert_ne!(ctx.fresh_name("split"), ctx.fresh_name("split"));
    }
}

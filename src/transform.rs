use crate::data::{Column, Dataset, Factor};
use crate::ir::{select_rows, Attrs, BuildContext, Node, Trace};
use std::collections::HashMap;
use tracing::debug;

/// Channels that split a trace when mapped to a discrete variable.
/// `split` splits regardless of the variable's type.
const SPLIT_CANDIDATES: [&str; 4] = ["split", "symbol", "linetype", "color"];

/// Label separator for interactions of several split variables
const INTERACTION_SEP: &str = "<br>";

/// Main entry point: turn one resolved data source into trace skeletons.
///
/// Discrete split variables duplicate the trace once per level; grouping
/// keys of the dataset break each trace into disconnected segments by
/// inserting missing rows between groups.
pub fn split_source(
    attrs: Attrs,
    data: &Dataset,
    source: usize,
    ctx: &mut BuildContext,
) -> Vec<Trace> {
    let n = data.nrows();
    if n == 0 {
        return vec![Trace::new(attrs, source)];
    }

    // 1. Detect split variables
    let mut split_keys: Vec<(String, Column)> = Vec::new();
    for name in SPLIT_CANDIDATES {
        if let Some(Node::Data(column)) = attrs.get(name) {
            if column.len() == n && (name == "split" || column.is_discrete()) {
                let key = ctx.fresh_name("split");
                debug!("splitting source {} by '{}' ({})", source, name, key);
                split_keys.push((key, column.clone()));
            }
        }
    }
    let mut split = interaction(&split_keys);

    // 2. Break groups apart with missing rows
    let (attrs, n) = if data.groups.is_empty() {
        (attrs, n)
    } else {
        let mut keys: Vec<&Column> = split.iter().collect();
        keys.extend(data.groups.iter().filter_map(|g| data.column(g)));
        let plan = group_rows(&keys, n);
        split = split.map(|s| s.take(&plan.key_rows));
        (select_rows(&attrs, n, &plan.rows), plan.rows.len())
    };

    // 3. One trace per level
    traceify(attrs, split.as_ref(), n)
        .into_iter()
        .map(|a| Trace::new(a, source))
        .collect()
}

/// Combine split keys into a single key. Identical keys collapse; a single
/// key keeps its level order.
fn interaction(keys: &[(String, Column)]) -> Option<Column> {
    let mut distinct: Vec<&Column> = Vec::new();
    for (_, column) in keys {
        if !distinct.contains(&column) {
            distinct.push(column);
        }
    }
    match distinct.as_slice() {
        [] => None,
        [single] => Some(Column::Discrete(single.to_discrete())),
        many => {
            let n = many[0].len();
            let values = (0..n)
                .map(|i| {
                    many.iter()
                        .map(|c| c.label(i))
                        .collect::<Option<Vec<String>>>()
                        .map(|labels| labels.join(INTERACTION_SEP))
                })
                .collect();
            Some(Column::Discrete(Factor::new(values)))
        }
    }
}

/// Row order after group expansion.
///
/// `rows` indexes the original rows with `None` for each inserted missing
/// row; `key_rows` is the same plan but points the inserted rows at the last
/// row of the group they close, so key columns keep their group's value.
#[derive(Debug, Clone, PartialEq)]
pub struct RowPlan {
    pub rows: Vec<Option<usize>>,
    pub key_rows: Vec<Option<usize>>,
}

/// Order rows by group (groups in first-seen order, rows stable within a
/// group) and insert one missing row at every group boundary.
pub fn group_rows(keys: &[&Column], n: usize) -> RowPlan {
    let mut index: HashMap<Vec<Option<String>>, usize> = HashMap::new();
    let mut members: Vec<Vec<usize>> = Vec::new();
    for row in 0..n {
        let key: Vec<Option<String>> = keys.iter().map(|k| k.label(row)).collect();
        let next = members.len();
        let g = *index.entry(key).or_insert(next);
        if g == members.len() {
            members.push(Vec::new());
        }
        members[g].push(row);
    }

    let mut rows = Vec::with_capacity(n + members.len());
    let mut key_rows = Vec::with_capacity(n + members.len());
    for (g, group) in members.iter().enumerate() {
        rows.extend(group.iter().map(|&i| Some(i)));
        key_rows.extend(group.iter().map(|&i| Some(i)));
        if g + 1 < members.len() {
            rows.push(None);
            key_rows.push(group.last().copied());
        }
    }
    RowPlan { rows, key_rows }
}

/// Split one attribute set into one set per level of `levels`.
///
/// Every leaf whose length equals the row count is subset to the level's
/// rows; other leaves are copied. Each copy is named after its level unless
/// it already has a name.
pub fn traceify(attrs: Attrs, levels: Option<&Column>, n: usize) -> Vec<Attrs> {
    let Some(levels) = levels else {
        return vec![attrs];
    };
    let factor = levels.to_discrete();
    let lvls = factor.present_levels();
    if lvls.is_empty() {
        return vec![attrs];
    }

    lvls.into_iter()
        .map(|lvl| {
            let rows: Vec<Option<usize>> = factor
                .values
                .iter()
                .enumerate()
                .filter(|(_, v)| v.as_deref() == Some(lvl.as_str()))
                .map(|(i, _)| Some(i))
                .collect();
            let mut subset = select_rows(&attrs, n, &rows);
            subset
                .entry("name".to_string())
                .or_insert_with(|| Node::Literal(serde_json::Value::String(lvl)));
            subset
        })
        .collect()
}

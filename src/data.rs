use anyhow::{anyhow, bail, Context, Result};
use serde_json::Value;
use std::collections::HashSet;
use std::io::Read;

/// A categorical vector. `levels` holds the declared level order when the
/// values came from `factor()`/`ordered()` or a dataset declaration.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Factor {
    pub values: Vec<Option<String>>,
    pub levels: Option<Vec<String>>,
    pub ordered: bool,
}

impl Factor {
    pub fn new(values: Vec<Option<String>>) -> Self {
        Self {
            values,
            levels: None,
            ordered: false,
        }
    }

    /// Levels actually present in the data, in drawing order.
    ///
    /// Declared levels keep their declared order (unused ones dropped),
    /// otherwise first-seen order is used. Ordered factors are reversed so
    /// the highest level comes first.
    pub fn present_levels(&self) -> Vec<String> {
        let mut levels = self.levels_in_use();
        if self.ordered {
            levels.reverse();
        }
        levels
    }

    /// Levels present in the data in level order: declared order when levels
    /// were declared, first-seen order otherwise.
    pub fn levels_in_use(&self) -> Vec<String> {
        let seen = first_seen(&self.values);
        match &self.levels {
            Some(declared) => {
                let present: HashSet<&String> = seen.iter().collect();
                declared
                    .iter()
                    .filter(|l| present.contains(l))
                    .cloned()
                    .collect()
            }
            None => seen,
        }
    }
}

fn first_seen(values: &[Option<String>]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for v in values.iter().flatten() {
        if seen.insert(v.as_str()) {
            out.push(v.clone());
        }
    }
    out
}

/// A single dataset column. Missing values are `None`.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Numeric(Vec<Option<f64>>),
    Discrete(Factor),
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Column::Numeric(v) => v.len(),
            Column::Discrete(f) => f.values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_discrete(&self) -> bool {
        matches!(self, Column::Discrete(_))
    }

    pub fn is_ordered(&self) -> bool {
        matches!(self, Column::Discrete(f) if f.ordered)
    }

    /// Convert to a discrete column, formatting numbers as labels.
    pub fn to_discrete(&self) -> Factor {
        match self {
            Column::Discrete(f) => f.clone(),
            Column::Numeric(v) => Factor::new(
                v.iter()
                    .map(|x| x.map(format_number))
                    .collect(),
            ),
        }
    }

    /// Label of row `i` as it appears in a trace name or lookup key.
    pub fn label(&self, i: usize) -> Option<String> {
        match self {
            Column::Numeric(v) => v.get(i).copied().flatten().map(format_number),
            Column::Discrete(f) => f.values.get(i).cloned().flatten(),
        }
    }

    /// Reorder rows following `rows`; `None` entries become missing values.
    pub fn take(&self, rows: &[Option<usize>]) -> Column {
        match self {
            Column::Numeric(v) => {
                Column::Numeric(rows.iter().map(|r| r.and_then(|i| v[i])).collect())
            }
            Column::Discrete(f) => Column::Discrete(Factor {
                values: rows
                    .iter()
                    .map(|r| r.and_then(|i| f.values[i].clone()))
                    .collect(),
                levels: f.levels.clone(),
                ordered: f.ordered,
            }),
        }
    }

    pub fn numeric_values(&self) -> Vec<f64> {
        match self {
            Column::Numeric(v) => v.iter().flatten().copied().collect(),
            Column::Discrete(_) => Vec::new(),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Column::Numeric(v) => Value::Array(v.iter().map(|x| number_to_json(*x)).collect()),
            Column::Discrete(f) => Value::Array(
                f.values
                    .iter()
                    .map(|x| x.clone().map(Value::String).unwrap_or(Value::Null))
                    .collect(),
            ),
        }
    }
}

pub fn number_to_json(x: Option<f64>) -> Value {
    x.and_then(serde_json::Number::from_f64)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

pub fn format_number(x: f64) -> String {
    if x.fract() == 0.0 && x.abs() < 1e15 {
        format!("{}", x as i64)
    } else {
        format!("{}", x)
    }
}

/// An ordered table of named columns plus grouping keys.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    pub columns: Vec<(String, Column)>,
    pub groups: Vec<String>,
}

impl Dataset {
    pub fn new(columns: Vec<(String, Column)>) -> Self {
        Self {
            columns,
            groups: Vec::new(),
        }
    }

    pub fn with_groups(mut self, groups: Vec<String>) -> Result<Self> {
        for g in &groups {
            if self.column(g).is_none() {
                bail!("Grouping column '{}' not found", g);
            }
        }
        self.groups = groups;
        Ok(self)
    }

    pub fn nrows(&self) -> usize {
        self.columns.first().map(|(_, c)| c.len()).unwrap_or(0)
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, c)| c)
    }

    pub fn headers(&self) -> Vec<&str> {
        self.columns.iter().map(|(n, _)| n.as_str()).collect()
    }

    /// Declare a column as a factor with the given level order.
    pub fn set_levels(&mut self, name: &str, levels: Vec<String>, ordered: bool) -> Result<()> {
        let column = self
            .columns
            .iter_mut()
            .find(|(n, _)| n == name)
            .map(|(_, c)| c)
            .ok_or_else(|| anyhow!("Factor column '{}' not found", name))?;
        let mut factor = column.to_discrete();
        factor.levels = Some(levels);
        factor.ordered = ordered;
        *column = Column::Discrete(factor);
        Ok(())
    }

    /// Read a dataset from CSV. A column is numeric when every non-empty cell
    /// parses as a number.
    pub fn from_csv<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::Reader::from_reader(reader);
        let headers: Vec<String> = rdr
            .headers()
            .context("Failed to read CSV headers")?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        let mut cells: Vec<Vec<String>> = vec![Vec::new(); headers.len()];
        for (line, record) in rdr.records().enumerate() {
            let record = record.with_context(|| format!("Failed to read CSV row {}", line + 1))?;
            for (i, cell) in record.iter().enumerate().take(headers.len()) {
                cells[i].push(cell.trim().to_string());
            }
        }

        let columns = headers
            .into_iter()
            .zip(cells)
            .map(|(name, raw)| (name, infer_column(raw)))
            .collect();
        Ok(Self::new(columns))
    }

    /// Create a dataset from a JSON array of objects.
    pub fn from_json(value: &Value) -> Result<Self> {
        let array = value
            .as_array()
            .ok_or_else(|| anyhow!("Input data must be a JSON array of objects"))?;

        let mut headers: Vec<String> = Vec::new();
        for item in array {
            let obj = item
                .as_object()
                .ok_or_else(|| anyhow!("Items in array must be objects"))?;
            for key in obj.keys() {
                if !headers.contains(key) {
                    headers.push(key.clone());
                }
            }
        }

        let mut columns = Vec::new();
        for header in headers {
            let cells: Vec<Option<&Value>> = array
                .iter()
                .map(|item| item.get(&header).filter(|v| !v.is_null()))
                .collect();
            let numeric = cells.iter().flatten().all(|v| v.is_number());
            let column = if numeric {
                Column::Numeric(cells.iter().map(|v| v.and_then(Value::as_f64)).collect())
            } else {
                let mut values = Vec::with_capacity(cells.len());
                for cell in &cells {
                    values.push(match cell {
                        None => None,
                        Some(Value::String(s)) => Some(s.clone()),
                        Some(Value::Number(n)) => Some(n.to_string()),
                        Some(Value::Bool(b)) => Some(b.to_string()),
                        Some(_) => bail!("Unsupported value type for field '{}'", header),
                    });
                }
                Column::Discrete(Factor::new(values))
            };
            columns.push((header, column));
        }

        Ok(Self::new(columns))
    }
}

fn infer_column(raw: Vec<String>) -> Column {
    let numeric = raw
        .iter()
        .filter(|s| !is_missing(s))
        .all(|s| s.parse::<f64>().is_ok());
    if numeric {
        Column::Numeric(
            raw.iter()
                .map(|s| if is_missing(s) { None } else { s.parse().ok() })
                .collect(),
        )
    } else {
        Column::Discrete(Factor::new(
            raw.into_iter()
                .map(|s| if is_missing(&s) { None } else { Some(s) })
                .collect(),
        ))
    }
}

fn is_missing(s: &str) -> bool {
    s.is_empty() || s == "NA"
}

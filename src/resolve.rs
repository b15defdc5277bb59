use crate::data::{format_number, Column, Dataset, Factor};
use crate::ir::{Attrs, Node};
use crate::parser::ast::{AttrSpec, AttrValue, BinOp, Expr, Formula};
use crate::BuildError;
use anyhow::{bail, Result};

/// Resolve every leaf of an attribute set against a dataset.
///
/// Literals pass through unchanged; formulas are evaluated. A formula whose
/// outermost call is `I()` yields an [`Node::AsIs`] leaf.
pub fn resolve_attrs(spec: &AttrSpec, data: &Dataset) -> Result<Attrs> {
    spec.iter()
        .map(|(name, value)| Ok((name.clone(), resolve_value(value, data)?)))
        .collect()
}

pub fn resolve_value(value: &AttrValue, data: &Dataset) -> Result<Node> {
    match value {
        AttrValue::Literal(v) => Ok(Node::Literal(v.clone())),
        AttrValue::Nested(spec) => Ok(Node::Map(resolve_attrs(spec, data)?)),
        AttrValue::Formula(f) => evaluate_formula(f, data),
    }
}

pub fn evaluate_formula(formula: &Formula, data: &Dataset) -> Result<Node> {
    match &formula.expr {
        Expr::Call(name, args) if name == "I" && args.len() == 1 => {
            Ok(Node::AsIs(evaluate(&args[0], data)?))
        }
        expr => Ok(Node::Data(evaluate(expr, data)?)),
    }
}

/// Evaluate an expression to a column. Literals evaluate to length-1 columns.
pub fn evaluate(expr: &Expr, data: &Dataset) -> Result<Column> {
    match expr {
        Expr::Number(x) => Ok(Column::Numeric(vec![Some(*x)])),
        Expr::Str(s) => Ok(Column::Discrete(Factor::new(vec![Some(s.clone())]))),
        Expr::Column(name) => data.column(name).cloned().ok_or_else(|| {
            BuildError::UndefinedColumn {
                name: name.clone(),
                available: data.headers().join(", "),
            }
            .into()
        }),
        Expr::Neg(inner) => {
            let values = numeric(evaluate(inner, data)?, "-")?;
            Ok(Column::Numeric(values.into_iter().map(|x| x.map(|v| -v)).collect()))
        }
        Expr::Binary(op, lhs, rhs) => {
            let l = numeric(evaluate(lhs, data)?, op_symbol(*op))?;
            let r = numeric(evaluate(rhs, data)?, op_symbol(*op))?;
            let n = broadcast_len(l.len(), r.len())?;
            let values = (0..n)
                .map(|i| {
                    let (a, b) = (l[i % l.len()]?, r[i % r.len()]?);
                    let v = match op {
                        BinOp::Add => a + b,
                        BinOp::Sub => a - b,
                        BinOp::Mul => a * b,
                        BinOp::Div => a / b,
                    };
                    v.is_finite().then_some(v)
                })
                .collect();
            Ok(Column::Numeric(values))
        }
        Expr::Call(name, args) => call(name, args, data),
    }
}

fn call(name: &str, args: &[Expr], data: &Dataset) -> Result<Column> {
    let values = args
        .iter()
        .map(|a| evaluate(a, data))
        .collect::<Result<Vec<_>>>()?;

    match (name, values.as_slice()) {
        ("I", [x]) => Ok(x.clone()),
        ("factor", [x]) => Ok(Column::Discrete(to_factor(x, false))),
        ("ordered" | "as.ordered", [x]) => Ok(Column::Discrete(to_factor(x, true))),
        ("as.character", [x]) => {
            let mut f = x.to_discrete();
            f.levels = None;
            f.ordered = false;
            Ok(Column::Discrete(f))
        }
        ("as.numeric", [x]) => Ok(match x {
            Column::Numeric(_) => x.clone(),
            Column::Discrete(f) => Column::Numeric(
                f.values
                    .iter()
                    .map(|v| v.as_deref().and_then(|s| s.parse().ok()))
                    .collect(),
            ),
        }),
        ("log", [x]) => unary_math(name, x, f64::ln),
        ("log10", [x]) => unary_math(name, x, f64::log10),
        ("sqrt", [x]) => unary_math(name, x, f64::sqrt),
        ("abs", [x]) => unary_math(name, x, f64::abs),
        ("exp", [x]) => unary_math(name, x, f64::exp),
        ("round", [x]) => unary_math(name, x, f64::round),
        ("round", [x, digits]) => {
            let d = numeric(digits.clone(), name)?
                .first()
                .copied()
                .flatten()
                .unwrap_or(0.0);
            let scale = 10f64.powi(d as i32);
            unary_math(name, x, |v| (v * scale).round() / scale)
        }
        ("paste", parts) if !parts.is_empty() => paste(parts),
        _ => Err(BuildError::Evaluation(format!(
            "unknown function '{}' with {} argument(s)",
            name,
            args.len()
        ))
        .into()),
    }
}

fn to_factor(x: &Column, ordered: bool) -> Factor {
    let mut f = x.to_discrete();
    if f.levels.is_none() {
        f.levels = Some(match x {
            Column::Numeric(v) => {
                let mut nums: Vec<f64> = v.iter().flatten().copied().collect();
                nums.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
                nums.dedup();
                nums.into_iter().map(format_number).collect()
            }
            Column::Discrete(d) => {
                let mut labels: Vec<String> = d.values.iter().flatten().cloned().collect();
                labels.sort();
                labels.dedup();
                labels
            }
        });
    }
    f.ordered = ordered;
    f
}

fn paste(parts: &[Column]) -> Result<Column> {
    let n = parts
        .iter()
        .try_fold(1, |acc, p| broadcast_len(acc, p.len()))?;
    let values = (0..n)
        .map(|i| {
            let labels: Vec<String> = parts
                .iter()
                .map(|p| p.label(i % p.len()).unwrap_or_else(|| "NA".to_string()))
                .collect();
            Some(labels.join(" "))
        })
        .collect();
    Ok(Column::Discrete(Factor::new(values)))
}

fn unary_math(name: &str, x: &Column, f: impl Fn(f64) -> f64) -> Result<Column> {
    let values = numeric(x.clone(), name)?;
    Ok(Column::Numeric(
        values
            .into_iter()
            .map(|v| v.map(&f).filter(|r| r.is_finite()))
            .collect(),
    ))
}

fn numeric(column: Column, op: &str) -> Result<Vec<Option<f64>>> {
    match column {
        Column::Numeric(v) => Ok(v),
        Column::Discrete(_) => bail!(BuildError::Evaluation(format!(
            "non-numeric argument to '{}'",
            op
        ))),
    }
}

fn broadcast_len(a: usize, b: usize) -> Result<usize> {
    match (a, b) {
        (a, b) if a == b => Ok(a),
        (1, b) => Ok(b),
        (a, 1) => Ok(a),
        (a, b) => bail!(BuildError::Evaluation(format!(
            "operands have incompatible lengths {} and {}",
            a, b
        ))),
    }
}

fn op_symbol(op: BinOp) -> &'static str {
    match op {
        BinOp::Add => "+",
        BinOp::Sub => "-",
        BinOp::Mul => "*",
        BinOp::Div => "/",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::formula::parse_formula;
    use serde_json::json;

    fn make_data() -> Dataset {
        Dataset::new(vec![
            ("a".to_string(), Column::Numeric(vec![Some(1.0), Some(2.0), None])),
            (
                "g".to_string(),
                Column::Discrete(Factor::new(vec![
                    Some("y".into()),
                    Some("x".into()),
                    Some("y".into()),
                ])),
            ),
        ])
    }

    fn eval(src: &str) -> Result<Node> {
        evaluate_formula(&parse_formula(src).unwrap(), &make_data())
    }

    #[test]
    fn test_arithmetic_broadcasts() {
        assert_eq!(
            eval("~a * 2 + 1").unwrap(),
            Node::Data(Column::Numeric(vec![Some(3.0), Some(5.0), None]))
        );
    }

    #[test]
    fn test_undefined_column_is_error() {
        let err = eval("~missing + 1").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BuildError>(),
            Some(BuildError::UndefinedColumn { name, .. }) if name == "missing"
        ));
    }

    #[test]
    fn test_factor_sorts_levels() {
        match eval("~factor(g)").unwrap() {
            Node::Data(Column::Discrete(f)) => {
                assert_eq!(f.levels, Some(vec!["x".to_string(), "y".to_string()]));
                assert!(!f.ordered);
            }
            other => panic!("expected factor, got {:?}", other),
        }
    }

    #[test]
    fn test_ordered_numeric() {
        match eval("~ordered(a)").unwrap() {
            Node::Data(Column::Discrete(f)) => {
                assert!(f.ordered);
                assert_eq!(f.levels, Some(vec!["1".to_string(), "2".to_string()]));
            }
            other => panic!("expected ordered factor, got {:?}", other),
        }
    }

    #[test]
    fn test_as_is_wrapper() {
        assert!(matches!(eval("~I(a)").unwrap(), Node::AsIs(_)));
    }

    #[test]
    fn test_arithmetic_on_discrete_fails() {
        assert!(eval("~g + 1").is_err());
    }

    #[test]
    fn test_paste() {
        assert_eq!(
            eval("~paste(g, a)").unwrap().to_json(),
            json!(["y 1", "x 2", "y NA"])
        );
    }

    #[test]
    fn test_literals_pass_through() {
        let mut spec = AttrSpec::new();
        spec.insert("opacity".into(), AttrValue::Literal(json!(0.3)));
        let attrs = resolve_attrs(&spec, &make_data()).unwrap();
        assert_eq!(attrs["opacity"], Node::Literal(json!(0.3)));
    }
}

//! Condition parser
//!
//! Compiles `wait_for` entries of the form
//!
//! ```text
//! result[<index>][<path>] [not] <operator> <operand>
//! ```
//!
//! - `<operator>` is a word (`eq`, `neq`/`ne`, `gt`, `ge`, `lt`, `le`,
//!   `contains`, `matches`) or a symbol (`==`, `!=`, `>`, `>=`, `<`, `<=`).
//! - `not` negates the operator that follows; `not contains` is its own operator.
//! - `<path>` is optional: `.key`, `[2]` or `['key']` steps into a JSON result.
//! - `<operand>` is the remaining text, trimmed. Wrapped in `'` or `"` it is
//!   kept verbatim as a string; otherwise it becomes a number if it parses as one.
//!
//! Every error is a `ConditionSyntax` error carrying the raw condition text.

use crate::conditions::{ConditionExpr, Operand, Operator, PathSegment};
use crate::error::RunError;

/// Symbolic operators, longest first so `>=` wins over `>`
const SYMBOLS: &[(&str, Operator)] = &[
    (">=", Operator::Ge),
    ("<=", Operator::Le),
    ("==", Operator::Eq),
    ("!=", Operator::Neq),
    (">", Operator::Gt),
    ("<", Operator::Lt),
];

/// Parse one condition.
pub fn parse_condition(raw: &str) -> Result<ConditionExpr, RunError> {
    let syntax = |msg: String| RunError::syntax(raw, msg);

    let rest = raw.trim_start().strip_prefix("result[").ok_or_else(|| {
        syntax("expected a result[<index>] reference".into())
    })?;
    let close = rest.find(']').ok_or_else(|| syntax("unterminated result index".into()))?;
    let index_text = rest[..close].trim();
    let result_index: usize = index_text.parse().map_err(|_| {
        syntax(format!("invalid result index {:?}", index_text))
    })?;

    let mut rest = &rest[close + 1..];
    let path = parse_path(&mut rest).map_err(syntax)?;
    let (operator, negate, rest) = parse_operator(rest.trim_start()).map_err(syntax)?;

    let operand_text = rest.trim();
    if operand_text.is_empty() {
        return Err(syntax("missing operand".into()));
    }
    let operand = match unquote(operand_text) {
        Some(inner) => Operand::Text(inner.to_string()),
        None => Operand::coerce(operand_text),
    };

    ConditionExpr::new(raw, result_index, path, operator, negate, operand)
}

/// Parse every condition up front, failing on the first malformed one.
pub fn parse_conditions<S: AsRef<str>>(raws: &[S]) -> Result<Vec<ConditionExpr>, RunError> {
    raws.iter().map(|r| parse_condition(r.as_ref())).collect()
}

/// Consume `.key`, `[n]` and `['key']` steps following the result index.
fn parse_path(rest: &mut &str) -> Result<Vec<PathSegment>, String> {
    let mut path = Vec::new();
    loop {
        let s = *rest;
        if let Some(after) = s.strip_prefix('.') {
            let end = after
                .find(|c: char| c == '.' || c == '[' || c.is_whitespace())
                .unwrap_or(after.len());
            if end == 0 {
                return Err("empty key in result path".into());
            }
            path.push(PathSegment::Key(after[..end].to_string()));
            *rest = &after[end..];
        } else if let Some(after) = s.strip_prefix('[') {
            let close = after.find(']').ok_or("unterminated '[' in result path")?;
            let inner = after[..close].trim();
            let segment = if let Some(key) = unquote(inner) {
                PathSegment::Key(key.to_string())
            } else if let Ok(i) = inner.parse::<usize>() {
                PathSegment::Index(i)
            } else if inner.is_empty() {
                return Err("empty '[]' in result path".into());
            } else {
                PathSegment::Key(inner.to_string())
            };
            path.push(segment);
            *rest = &after[close + 1..];
        } else {
            break;
        }
    }
    Ok(path)
}

/// Parse `[not] <operator>` and return the operator, the negation flag and
/// the text after the operator.
fn parse_operator(s: &str) -> Result<(Operator, bool, &str), String> {
    let (negate, s) = match split_word(s) {
        ("not", after) => (true, after.trim_start()),
        _ => (false, s),
    };

    let (operator, after) = if let Some(&(sym, op)) = SYMBOLS.iter().find(|(sym, _)| s.starts_with(sym)) {
        (op, &s[sym.len()..])
    } else {
        let (word, after) = split_word(s);
        let op = match word {
            "eq" => Operator::Eq,
            "neq" | "ne" => Operator::Neq,
            "gt" => Operator::Gt,
            "ge" => Operator::Ge,
            "lt" => Operator::Lt,
            "le" => Operator::Le,
            "contains" => Operator::Contains,
            "matches" => Operator::Matches,
            "" => return Err("missing operator".into()),
            other => return Err(format!("unknown operator {:?}", other)),
        };
        (op, after)
    };

    Ok(match (operator, negate) {
        (Operator::Contains, true) => (Operator::NotContains, false, after),
        (op, negate) => (op, negate, after),
    })
}

/// Split off the leading run of non-whitespace characters.
fn split_word(s: &str) -> (&str, &str) {
    let end = s.find(char::is_whitespace).unwrap_or(s.len());
    (&s[..end], &s[end..])
}

/// Strip one pair of matching `'` or `"` delimiters.
fn unquote(s: &str) -> Option<&str> {
    let bytes = s.as_bytes();
    if bytes.len() >= 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if first == last && (first == b'\'' || first == b'"') {
            return Some(&s[1..s.len() - 1]);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_parse_contains() {
        let c = parse_condition("result[0] contains MES").unwrap();
        assert_eq!(c.result_index(), 0);
        assert_eq!(c.operator(), Operator::Contains);
        assert!(!c.is_negated());
        assert_eq!(*c.operand(), Operand::Text("MES".into()));
        assert_eq!(c.raw(), "result[0] contains MES");
        assert!(c.path().is_empty());
    }

    #[test]
    fn test_parse_word_operators() {
        let cases = [
            ("result[1] eq 5", Operator::Eq),
            ("result[1] neq 5", Operator::Neq),
            ("result[1] ne 5", Operator::Neq),
            ("result[1] gt 5", Operator::Gt),
            ("result[1] ge 5", Operator::Ge),
            ("result[1] lt 5", Operator::Lt),
            ("result[1] le 5", Operator::Le),
            ("result[1] matches ^up", Operator::Matches),
        ];
        for (raw, op) in cases {
            assert_eq!(parse_condition(raw).unwrap().operator(), op, "{}", raw);
        }
    }

    #[test]
    fn test_parse_symbolic_operators() {
        let cases = [
            ("result[0] == 1", Operator::Eq),
            ("result[0] != 1", Operator::Neq),
            ("result[0] > 1", Operator::Gt),
            ("result[0] >= 1", Operator::Ge),
            ("result[0] < 1", Operator::Lt),
            ("result[0] <= 1", Operator::Le),
            ("result[0]>=1", Operator::Ge),
        ];
        for (raw, op) in cases {
            let c = parse_condition(raw).unwrap();
            assert_eq!(c.operator(), op, "{}", raw);
            assert_eq!(c.operand().as_text(), "1");
        }
    }

    #[test]
    fn test_parse_not() {
        let c = parse_condition("result[0] not contains error").unwrap();
        assert_eq!(c.operator(), Operator::NotContains);
        assert!(!c.is_negated());

        let c = parse_condition("result[0] not matches ^%").unwrap();
        assert_eq!(c.operator(), Operator::Matches);
        assert!(c.is_negated());

        let c = parse_condition("result[0] not == 3").unwrap();
        assert_eq!(c.operator(), Operator::Eq);
        assert!(c.is_negated());
    }

    #[test]
    fn test_operand_keeps_inner_whitespace() {
        let c = parse_condition("result[0] contains   Vlan 10   is up  ").unwrap();
        assert_eq!(*c.operand(), Operand::Text("Vlan 10   is up".into()));

        let c = parse_condition("result[0] eq '  padded  '").unwrap();
        assert_eq!(*c.operand(), Operand::Text("  padded  ".into()));
    }

    #[test]
    fn test_operand_number_coercion() {
        let c = parse_condition("result[2] gt 1.5").unwrap();
        assert!(matches!(c.operand(), Operand::Number { value, .. } if *value == 1.5));

        // quoted numbers stay strings
        let c = parse_condition("result[2] eq \"15\"").unwrap();
        assert_eq!(*c.operand(), Operand::Text("15".into()));
    }

    #[test]
    fn test_parse_path() {
        let c = parse_condition("result[0].interfaces[3]['admin state'] eq up").unwrap();
        assert_eq!(c.path(), vec![
            PathSegment::Key("interfaces".into()),
            PathSegment::Index(3),
            PathSegment::Key("admin state".into()),
        ]);
        assert_eq!(c.operand().as_text(), "up");
    }

    #[test]
    fn test_parse_errors() {
        let bad = [
            ("output contains x", "result[<index>]"),
            ("result[a] eq 1", "invalid result index"),
            ("result[0 eq 1", "unterminated result index"),
            ("result[0] resembles x", "unknown operator"),
            ("result[0]", "missing operator"),
            ("result[0] not", "missing operator"),
            ("result[0] contains", "missing operand"),
            ("result[0] matches (unclosed", "invalid regex"),
            ("result[0]. eq 1", "empty key"),
        ];
        for (raw, msg) in bad {
            let err = parse_condition(raw).unwrap_err();
            assert_eq!(err.kind, ErrorKind::ConditionSyntax, "{}", raw);
            assert!(err.message.contains(msg), "{}: {}", raw, err.message);
            assert_eq!(err.condition.as_deref(), Some(raw));
        }
    }

    #[test]
    fn test_parse_conditions_stops_at_first_error() {
        let raws = vec!["result[0] contains a", "bogus", "result[1] contains b"];
        let err = parse_conditions(&raws).unwrap_err();
        assert_eq!(err.condition.as_deref(), Some("bogus"));

        let ok = parse_conditions(&["result[0] contains a", "result[1] eq 2"]).unwrap();
        assert_eq!(ok.len(), 2);
    }
}

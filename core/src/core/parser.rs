use crate::{ChannelRef, SimError, SiteOp};
use std::collections::HashMap;

/// One term as produced by the parser: a coefficient, one or two
/// site-operators, and an optional channel binding (3: Term).
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedTerm {
    pub coefficient: f64,
    pub operators: Vec<(SiteOp, usize)>,
    pub channel: Option<ChannelRef>,
}

/// Parses the `h_str` document format (Section 6): an ordered list of
/// term strings plus a variable environment, exactly mirroring
/// `original_source`'s `HamiltonianParsingUtil::tryParse(json, vars)`
/// wire contract. Each entry is parsed independently; a single failing
/// entry does not affect the others already parsed (failures stop at
/// that entry and are reported with its index).
pub fn parse_hamiltonian_document(
    h_str: &[String],
    vars: &HashMap<String, f64>,
) -> Result<Vec<ParsedTerm>, SimError> {
    let mut terms = Vec::new();
    for (i, entry) in h_str.iter().enumerate() {
        let parsed = parse_term(entry, vars).map_err(|e| {
            tracing::warn!(index = i, term = %entry, reason = %e, "Hamiltonian term parse failure");
            SimError::ParseError(format!("h_str[{}] ({}): {}", i, entry, e))
        })?;
        terms.extend(parsed);
    }
    Ok(terms)
}

/// Parses a single term string, trying `_SUM`, then a channel-bound
/// term, then a plain static term — the same ordering `tryParse`
/// attempts in `original_source` (4.4).
fn parse_term(input: &str, vars: &HashMap<String, f64>) -> Result<Vec<ParsedTerm>, String> {
    let s = strip_whitespace(input);
    if s.is_empty() {
        return Err("empty term".into());
    }

    if let Some(rest) = strip_prefix_ci(&s, "_SUM[") {
        return parse_sum(rest, vars);
    }

    let (body, channel) = split_channel(&s)?;
    let channel = match channel {
        Some(ch) => Some(parse_channel(&ch)?),
        None => None,
    };
    let terms = parse_static_expr(&body, vars)?;
    Ok(terms
        .into_iter()
        .map(|(coefficient, operators)| ParsedTerm {
            coefficient,
            operators,
            channel,
        })
        .collect())
}

/// `_SUM[var,lo,hi,expr]`: an inclusive loop unrolled at parse time
/// (4.4). `var` may appear bare (`{i}`) or in a sub-expression
/// (`{i+1}`) inside `expr`; both are resolved via a tiny scalar
/// expression engine (`eval_index_expr`) before substitution.
fn parse_sum(rest: &str, vars: &HashMap<String, f64>) -> Result<Vec<ParsedTerm>, String> {
    let inner = strip_matching_bracket(rest, ']')?;
    if inner.contains("_SUM[") || inner.to_uppercase().contains("_SUM[") {
        return Err("nested _SUM is not supported".into());
    }
    let parts = split_top_level_commas(&inner, 4)?;
    let var = parts[0].trim().to_string();
    let lo: i64 = parts[1]
        .trim()
        .parse()
        .map_err(|_| format!("bad _SUM lower bound: {}", parts[1]))?;
    let hi: i64 = parts[2]
        .trim()
        .parse()
        .map_err(|_| format!("bad _SUM upper bound: {}", parts[2]))?;
    let expr = parts[3].clone();

    let mut out = Vec::new();
    for i in lo..=hi {
        let substituted = substitute_loop_var(&expr, &var, i);
        out.extend(parse_term(&substituted, vars)?);
    }
    Ok(out)
}

/// Replaces every `{var}` and `{var+k}`/`{var-k}` occurrence with its
/// evaluated integer value for this loop iteration.
fn substitute_loop_var(expr: &str, var: &str, i: i64) -> String {
    let mut out = String::with_capacity(expr.len());
    let mut chars = expr.char_indices().peekable();
    while let Some((idx, c)) = chars.next() {
        if c == '{' {
            if let Some(end) = expr[idx..].find('}') {
                let inner = &expr[idx + 1..idx + end];
                if let Some(value) = eval_index_expr(inner, var, i) {
                    out.push_str(&value.to_string());
                    for _ in 0..end {
                        chars.next();
                    }
                    continue;
                }
            }
        }
        out.push(c);
    }
    out
}

/// Evaluates `var`, `var+k`, or `var-k` against the bound loop value
/// `i`. Returns `None` if `inner` does not reference `var` at all (in
/// which case the caller leaves the `{...}` text untouched).
fn eval_index_expr(inner: &str, var: &str, i: i64) -> Option<i64> {
    let inner = inner.trim();
    if inner == var {
        return Some(i);
    }
    if let Some(rest) = inner.strip_prefix(var) {
        let rest = rest.trim();
        if let Some(k) = rest.strip_prefix('+') {
            return k.trim().parse::<i64>().ok().map(|k| i + k);
        }
        if let Some(k) = rest.strip_prefix('-') {
            return k.trim().parse::<i64>().ok().map(|k| i - k);
        }
    }
    None
}

/// Renders a single [`ParsedTerm`] back into the `h_str` grammar (4.4),
/// the inverse of [`parse_term`] restricted to the flat, already-unrolled
/// shape the parser itself produces (no `_SUM`, no `(A+-B)` distribution
/// — those exist only in the input text, never in a parsed term). Used to
/// exercise Section 8 invariant 3, `parse(serialize(t)) = t`, on the
/// subset of terms this function can produce.
pub fn serialize_term(term: &ParsedTerm) -> String {
    let ops: Vec<String> = term
        .operators
        .iter()
        .map(|(op, site)| format!("{}{}", op.wire_name(), site))
        .collect();
    let mut s = format!("{}*{}", term.coefficient, ops.join("*"));
    if let Some(channel) = term.channel {
        let ch = match channel {
            ChannelRef::Drive(k) => format!("D{}", k),
            ChannelRef::Control(k) => format!("U{}", k),
        };
        s.push_str("||");
        s.push_str(&ch);
    }
    s
}

/// Splits off a trailing `||Ch` channel binding, if present.
fn split_channel(s: &str) -> Result<(String, Option<String>), String> {
    if let Some(pos) = s.find("||") {
        let body = s[..pos].to_string();
        let ch = s[pos + 2..].to_string();
        if ch.is_empty() {
            return Err("empty channel name after ||".into());
        }
        Ok((body, Some(ch)))
    } else {
        Ok((s.to_string(), None))
    }
}

fn parse_channel(name: &str) -> Result<ChannelRef, String> {
    let bytes = name.as_bytes();
    if bytes.is_empty() {
        return Err("empty channel name".into());
    }
    let idx: usize = name[1..]
        .parse()
        .map_err(|_| format!("malformed channel name: {}", name))?;
    match bytes[0].to_ascii_uppercase() {
        b'D' => Ok(ChannelRef::Drive(idx)),
        b'U' => Ok(ChannelRef::Control(idx)),
        _ => Err(format!("malformed channel name: {}", name)),
    }
}

/// `StaticTerm := coef "*" (opAtSite | "(" StaticTerm "+-" StaticTerm ")")`.
/// Distributes `c * (A +- B)` into `c*A +- c*B` (4.4 guarantee),
/// returning a flat list of `(coefficient, operators)` pairs — each
/// entry still independently a 1- or 2-operator term.
fn parse_static_expr(s: &str, vars: &HashMap<String, f64>) -> Result<Vec<(f64, Vec<(SiteOp, usize)>)>, String> {
    let star = s.find('*').ok_or_else(|| format!("missing '*' in term: {}", s))?;
    let coef_str = s[..star].trim();
    let coef = eval_coefficient(coef_str, vars)?;
    let rest = s[star + 1..].trim();

    if rest.starts_with('(') {
        let inner = strip_matching_paren(rest)?;
        let (left, op, right) = split_pm(&inner)?;
        let left_terms = parse_opterm(&left)?;
        let right_terms = parse_opterm(&right)?;
        let sign = if op == '-' { -1.0 } else { 1.0 };
        return Ok(vec![(coef, left_terms), (coef * sign, right_terms)]);
    }

    let ops = parse_opterm(rest)?;
    Ok(vec![(coef, ops)])
}

/// Parses one `opAtSite[, opAtSite]` shape, i.e. a product of one or
/// two site-operators (no further distribution possible at this level).
fn parse_opterm(s: &str) -> Result<Vec<(SiteOp, usize)>, String> {
    let s = s.trim();
    let pieces: Vec<&str> = s.split(['*', ' ']).filter(|p| !p.is_empty()).collect();
    if pieces.is_empty() || pieces.len() > 2 {
        return Err(format!("expected 1 or 2 operators, got: {}", s));
    }
    pieces.iter().map(|p| parse_op_at_site(p)).collect()
}

fn parse_op_at_site(tok: &str) -> Result<(SiteOp, usize), String> {
    let split_at = tok
        .find(|c: char| c.is_ascii_digit())
        .ok_or_else(|| format!("missing site index in: {}", tok))?;
    let (name, digits) = tok.split_at(split_at);
    let op = SiteOp::from_str(name).ok_or_else(|| format!("unknown operator symbol: {}", name))?;
    let site: usize = digits
        .parse()
        .map_err(|_| format!("malformed site index: {}", digits))?;
    Ok((op, site))
}

fn eval_coefficient(s: &str, vars: &HashMap<String, f64>) -> Result<f64, String> {
    if let Ok(v) = s.parse::<f64>() {
        return Ok(v);
    }
    vars.get(s)
        .copied()
        .ok_or_else(|| format!("unresolved variable: {}", s))
}

fn split_pm(s: &str) -> Result<(String, char, String), String> {
    // Find the first top-level +/- (not inside nested parens).
    let mut depth = 0i32;
    for (i, c) in s.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth -= 1,
            '+' | '-' if depth == 0 && i > 0 => {
                return Ok((s[..i].trim().to_string(), c, s[i + 1..].trim().to_string()));
            }
            _ => {}
        }
    }
    Err(format!("expected '+' or '-' inside parentheses: {}", s))
}

fn strip_matching_paren(s: &str) -> Result<String, String> {
    if !s.starts_with('(') {
        return Err(format!("expected '(': {}", s));
    }
    let mut depth = 0i32;
    for (i, c) in s.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    if i != s.len() - 1 {
                        return Err(format!("unexpected trailing text after ')': {}", s));
                    }
                    return Ok(s[1..i].to_string());
                }
            }
            _ => {}
        }
    }
    Err(format!("unmatched parentheses: {}", s))
}

fn strip_matching_bracket(s: &str, close: char) -> Result<String, String> {
    let mut depth = 1i32;
    for (i, c) in s.char_indices() {
        if c == '[' {
            depth += 1;
        } else if c == close {
            depth -= 1;
            if depth == 0 {
                return Ok(s[..i].to_string());
            }
        }
    }
    Err("unmatched '['".into())
}

fn split_top_level_commas(s: &str, expected: usize) -> Result<Vec<String>, String> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0usize;
    for (i, c) in s.char_indices() {
        match c {
            '[' | '(' => depth += 1,
            ']' | ')' => depth -= 1,
            ',' if depth == 0 => {
                parts.push(s[start..i].to_string());
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(s[start..].to_string());
    if parts.len() != expected {
        return Err(format!(
            "expected {} comma-separated fields, got {}",
            expected,
            parts.len()
        ));
    }
    Ok(parts)
}

fn strip_whitespace(s: &str) -> String {
    s.chars().filter(|c| !c.is_whitespace()).collect()
}

fn strip_prefix_ci<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    if s.len() >= prefix.len() && s[..prefix.len()].eq_ignore_ascii_case(prefix) {
        Some(&s[prefix.len()..])
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sum_unrolls_inclusive_range() {
        let terms = parse_term("_SUM[i,0,2,1.0*X{i}]", &HashMap::new()).unwrap();
        assert_eq!(terms.len(), 3);
        for (k, term) in terms.iter().enumerate() {
            assert_eq!(term.coefficient, 1.0);
            assert_eq!(term.operators, vec![(SiteOp::X, k)]);
        }
    }

    #[test]
    fn channel_bound_distribution() {
        let mut vars = HashMap::new();
        vars.insert("w".to_string(), 0.5);
        let terms = parse_term("w*(X0+Y0)||D1", &vars).unwrap();
        assert_eq!(terms.len(), 2);
        for term in &terms {
            assert_eq!(term.coefficient, 0.5);
            assert_eq!(term.channel, Some(ChannelRef::Drive(1)));
        }
    }

    #[test]
    fn unknown_operator_is_a_parse_error() {
        let r = parse_term("1.0*Q0", &HashMap::new());
        assert!(r.is_err());
    }

    #[test]
    fn unmatched_parens_is_a_parse_error() {
        let r = parse_term("1.0*(X0+Y0", &HashMap::new());
        assert!(r.is_err());
    }

    #[test]
    fn two_operator_term() {
        let terms = parse_term("2.0*X0*Z1", &HashMap::new()).unwrap();
        assert_eq!(terms.len(), 1);
        assert_eq!(terms[0].operators, vec![(SiteOp::X, 0), (SiteOp::Z, 1)]);
    }

    #[test]
    fn round_trips_single_operator_static_term() {
        let terms = parse_term("2.5*X0", &HashMap::new()).unwrap();
        let serialized = serialize_term(&terms[0]);
        let reparsed = parse_term(&serialized, &HashMap::new()).unwrap();
        assert_eq!(reparsed, terms);
    }

    #[test]
    fn round_trips_two_operator_channel_bound_term() {
        let terms = parse_term("1.5*SP0*SM1||U2", &HashMap::new()).unwrap();
        let serialized = serialize_term(&terms[0]);
        let reparsed = parse_term(&serialized, &HashMap::new()).unwrap();
        assert_eq!(reparsed, terms);
    }
}

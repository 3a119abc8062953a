//! Parse type tags into [`Hint`] / [`Type`] using PEST.

use crate::ast::{Hint, Type, Unit};
use crate::error::TypeTagError;
use pest::error::InputLocation;
use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser as PestParser;
use std::str::FromStr;

#[derive(PestParser)]
#[grammar = "type_tag.pest"]
struct TypeTagParser;

/// Parse a data-describing tag. Wildcards (`?`) are rejected.
pub fn parse_type(tag: &str) -> Result<Type, TypeTagError> {
    let hint = parse_hint(tag)?;
    hint.into_type().ok_or_else(|| {
        let body = strip_comment(tag);
        let at = body.find('?').unwrap_or(0);
        TypeTagError::new(tag, &body[at..], "wildcard '?' is only allowed in type hints")
    })
}

/// Parse a hint tag, which may contain wildcards.
pub fn parse_hint(tag: &str) -> Result<Hint, TypeTagError> {
    let body = strip_comment(tag);
    let pairs = TypeTagParser::parse(Rule::tag, body).map_err(|e| {
        let pos = match e.location {
            InputLocation::Pos(p) => p,
            InputLocation::Span((start, _)) => start,
        };
        TypeTagError::new(tag, body.get(pos..).unwrap_or(""), e.variant.message())
    })?;
    let root = pairs
        .into_iter()
        .next()
        .ok_or_else(|| TypeTagError::new(tag, body, "empty parse"))?;
    let mut elements = Vec::new();
    for inner in root.into_inner() {
        if inner.as_rule() == Rule::EOI {
            continue;
        }
        elements.push(build_element(tag, inner)?);
    }
    Ok(match elements.len() {
        0 => Hint::None,
        1 => elements.remove(0),
        _ => Hint::Cluster(elements),
    })
}

/// Parse several hint tags at once, in order.
pub fn hints(tags: &[&str]) -> Result<Vec<Hint>, TypeTagError> {
    tags.iter().map(|t| parse_hint(t)).collect()
}

fn strip_comment(tag: &str) -> &str {
    tag.split_once(':').map_or(tag, |(body, _)| body)
}

fn build_element(tag: &str, pair: Pair<Rule>) -> Result<Hint, TypeTagError> {
    match pair.as_rule() {
        Rule::none => Ok(Hint::None),
        Rule::boolean => Ok(Hint::Bool),
        Rule::int => Ok(Hint::Int),
        Rule::word => Ok(Hint::Word),
        Rule::string => Ok(Hint::Str),
        Rule::time => Ok(Hint::Time),
        Rule::wildcard => Ok(Hint::Wildcard),
        Rule::value => Ok(Hint::Value(build_unit(pair))),
        Rule::complex => Ok(Hint::Complex(build_unit(pair))),
        Rule::cluster => {
            let members = pair
                .into_inner()
                .map(|p| build_element(tag, p))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Hint::Cluster(members))
        }
        Rule::list => build_list(tag, pair),
        Rule::error => {
            let payload = match pair.into_inner().next() {
                Some(p) => Some(Box::new(build_element(tag, p)?)),
                None => None,
            };
            Ok(Hint::Error(payload))
        }
        other => Err(TypeTagError::new(
            tag,
            pair.as_str(),
            format!("unexpected rule {:?}", other),
        )),
    }
}

fn build_list(tag: &str, pair: Pair<Rule>) -> Result<Hint, TypeTagError> {
    let text = pair.as_str();
    let mut depth = 1u8;
    let mut elem = None;
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::depth => {
                depth = inner
                    .as_str()
                    .parse()
                    .map_err(|_| TypeTagError::new(tag, text, "list depth must be a digit"))?;
                if depth == 0 {
                    return Err(TypeTagError::new(tag, text, "list depth must be at least 1"));
                }
            }
            Rule::empty_elem => elem = None,
            _ => elem = Some(Box::new(build_element(tag, inner)?)),
        }
    }
    Ok(Hint::List { elem, depth })
}

fn build_unit(pair: Pair<Rule>) -> Unit {
    let label = pair
        .into_inner()
        .next()
        .and_then(|units| units.into_inner().next())
        .map(|l| l.as_str().trim());
    match label {
        None => Unit::Unspecified,
        Some(l) => Unit::from_label(l),
    }
}

impl FromStr for Type {
    type Err = TypeTagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_type(s)
    }
}

impl FromStr for Hint {
    type Err = TypeTagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_hint(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_rejected_in_data_tags() {
        let err = parse_type("ww?").unwrap_err();
        assert_eq!(err.fragment, "?");
        assert_eq!(
            parse_hint("ww?").unwrap(),
            Hint::Cluster(vec![Hint::Word, Hint::Word, Hint::Wildcard])
        );
    }

    #[test]
    fn depth_zero_rejected() {
        assert!(parse_type("*0i").is_err());
    }

    #[test]
    fn malformed_tags_report_fragment() {
        for bad in ["(", "()", "x", "*", "*2", "v[m", "ii)", "E)"] {
            assert!(parse_type(bad).is_err(), "{:?} should not parse", bad);
        }
        let err = parse_type("iix").unwrap_err();
        assert_eq!(err.tag, "iix");
        assert!(err.fragment.starts_with('x'), "fragment {:?}", err.fragment);
    }

    #[test]
    fn unit_labels_are_verbatim() {
        assert_eq!(parse_type("v[ m/s^2 ]").unwrap(), Type::Value(Unit::Named("m/s^2".into())));
        assert_eq!(parse_type("c[]").unwrap(), Type::Complex(Unit::Empty));
    }
}

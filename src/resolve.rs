//! Type hint resolution: pick the first hint the data satisfies and fill in its unknowns.
//!
//! Matching rules:
//! - `?` matches anything and becomes the inferred type of the matched sub-value.
//! - Bare `v`/`c` take the data's own unit; `v[]` needs dimensionless data; `v[u]` needs data
//!   whose unit is compatible with `u` and still resolves to the data's own unit.
//!   Plain numbers never satisfy a named unit.
//! - Clusters match tuples of equal arity, member-wise.
//! - Lists match list-like data of the same depth. Every element must satisfy the element hint
//!   and the per-element results must unify. Empty branches stay unknown while their siblings
//!   decide; whatever is still unknown at the end takes the hint's data-free default.
//! - `i` and `w` reject integers outside their ranges.

use crate::ast::{Hint, Type, Unit};
use crate::error::FlatteningError;
use crate::infer::{ambiguous_tag, infer};
use crate::units::{StandardUnits, Units};
use crate::value::{Data, GridError};
use log::debug;

/// Resolve with the default unit table ([`StandardUnits`]).
pub fn resolve(data: &Data, hints: &[Hint]) -> Result<Type, FlatteningError> {
    resolve_with(data, hints, &StandardUnits::default())
}

/// Try `hints` in order and return the first that `data` satisfies, fully resolved.
///
/// With no hints this is [`infer`]. With exactly one hint its own failure is returned,
/// otherwise [`FlatteningError::NoMatchingHint`].
pub fn resolve_with(
    data: &Data,
    hints: &[Hint],
    units: &dyn Units,
) -> Result<Type, FlatteningError> {
    if hints.is_empty() {
        return Ok(infer(data)?);
    }
    let mut last_err = None;
    for hint in hints {
        match resolve_one(data, hint, units) {
            Ok(ty) => {
                debug!("hint '{}' accepted {} as '{}'", hint, data.kind(), ty);
                return Ok(ty);
            }
            Err(e) => {
                debug!("hint '{}' rejected {}: {}", hint, data.kind(), e);
                last_err = Some(e);
            }
        }
    }
    match last_err {
        Some(e) if hints.len() == 1 => Err(e),
        _ => Err(FlatteningError::NoMatchingHint {
            found: data.kind(),
            hints: hints
                .iter()
                .map(|h| format!("'{}'", h))
                .collect::<Vec<_>>()
                .join(", "),
        }),
    }
}

fn resolve_one(data: &Data, hint: &Hint, units: &dyn Units) -> Result<Type, FlatteningError> {
    let ty = fill_defaults(fit(data, hint, units)?, hint);
    if ty.prints_ambiguously() {
        return Err(ambiguous_tag(data).into());
    }
    Ok(ty)
}

fn fit(data: &Data, hint: &Hint, units: &dyn Units) -> Result<Type, FlatteningError> {
    let mismatch = || FlatteningError::Mismatch {
        expected: hint.to_string(),
        found: data.kind(),
    };
    match hint {
        Hint::Wildcard => Ok(infer(data)?),
        Hint::None => match data {
            Data::None => Ok(Type::None),
            _ => Err(mismatch()),
        },
        Hint::Bool => match data {
            Data::Bool(_) => Ok(Type::Bool),
            _ => Err(mismatch()),
        },
        Hint::Int => {
            check_int(integer(data).ok_or_else(mismatch)?)?;
            Ok(Type::Int)
        }
        Hint::Word => {
            check_word(integer(data).ok_or_else(mismatch)?)?;
            Ok(Type::Word)
        }
        Hint::Str => match data {
            Data::Bytes(_) | Data::Text(_) => Ok(Type::Str),
            _ => Err(mismatch()),
        },
        Hint::Time => match data {
            Data::Time(_) => Ok(Type::Time),
            _ => Err(mismatch()),
        },
        Hint::Value(unit) => match data {
            Data::Float(_) | Data::Int(_) | Data::Word(_) => plain_unit(unit).map(Type::Value),
            Data::Value(_, have) => data_unit(unit, have, units).map(Type::Value),
            _ => Err(mismatch()),
        },
        Hint::Complex(unit) => match data {
            Data::Complex(_) | Data::Float(_) | Data::Int(_) | Data::Word(_) => {
                plain_unit(unit).map(Type::Complex)
            }
            Data::ComplexValue(_, have) | Data::Value(_, have) => {
                data_unit(unit, have, units).map(Type::Complex)
            }
            _ => Err(mismatch()),
        },
        Hint::Cluster(members) => match data {
            Data::Tuple(items) if items.len() == members.len() => members
                .iter()
                .zip(items)
                .map(|(h, d)| fit(d, h, units))
                .collect::<Result<Vec<_>, _>>()
                .map(Type::Cluster),
            Data::Tuple(items) => Err(FlatteningError::ArityMismatch {
                expected: hint.to_string(),
                arity: members.len(),
                found: items.len(),
            }),
            _ => Err(mismatch()),
        },
        Hint::List { elem, depth } => {
            let grid = data
                .grid(*depth)
                .map_err(|e| grid_error(e, *depth, data))?;
            let mut unified: Option<Type> = None;
            for leaf in &grid.leaves {
                let h = elem.as_deref().ok_or_else(mismatch)?;
                let ty = fit(leaf, h, units)?;
                unified = Some(match unified {
                    None => ty,
                    Some(u) if u == ty => u,
                    Some(u) => {
                        let tag = u.to_string();
                        unify(u, ty).ok_or_else(|| FlatteningError::Conflict {
                            unified: tag,
                            found: leaf.kind(),
                        })?
                    }
                });
            }
            Ok(Type::list_of_depth(unified, *depth))
        }
        Hint::Error(payload) => match data {
            Data::Error(e) => match (payload, &e.payload) {
                (None, None) => Ok(Type::Error(None)),
                (Some(h), Some(p)) => Ok(Type::Error(Some(Box::new(fit(p, h, units)?)))),
                (Some(_), None) => Ok(Type::Error(None)),
                (None, Some(_)) => Err(mismatch()),
            },
            _ => Err(mismatch()),
        },
    }
}

/// Merge two per-element results of one list hint. Unknown list elements and missing error
/// payloads give way to the other side; anything else must agree exactly.
fn unify(a: Type, b: Type) -> Option<Type> {
    if a == b {
        return Some(a);
    }
    match (a, b) {
        (Type::List { elem: Some(x), depth: da }, Type::List { elem: Some(y), depth: db })
            if da == db =>
        {
            Some(Type::list_of_depth(Some(unify(*x, *y)?), da))
        }
        (Type::List { elem: None, depth: da }, Type::List { elem, depth: db })
        | (Type::List { elem, depth: da }, Type::List { elem: None, depth: db })
            if da == db =>
        {
            Some(Type::List { elem, depth: da })
        }
        (Type::Cluster(xs), Type::Cluster(ys)) if xs.len() == ys.len() => xs
            .into_iter()
            .zip(ys)
            .map(|(x, y)| unify(x, y))
            .collect::<Option<Vec<_>>>()
            .map(Type::Cluster),
        (Type::Error(Some(x)), Type::Error(Some(y))) => {
            Some(Type::Error(Some(Box::new(unify(*x, *y)?))))
        }
        (Type::Error(None), Type::Error(p)) | (Type::Error(p), Type::Error(None)) => {
            Some(Type::Error(p))
        }
        _ => None,
    }
}

/// Fill element types no data decided with what `hint` says on its own (bare `v` becomes `v[]`).
fn fill_defaults(ty: Type, hint: &Hint) -> Type {
    match (ty, hint) {
        (Type::List { elem: None, depth }, Hint::List { elem: Some(h), .. }) => Type::List {
            elem: h.without_data().map(Box::new),
            depth,
        },
        (Type::List { elem: Some(t), depth }, Hint::List { elem: Some(h), .. }) => {
            Type::list_of_depth(Some(fill_defaults(*t, h)), depth)
        }
        (Type::Cluster(ts), Hint::Cluster(hs)) if ts.len() == hs.len() => Type::Cluster(
            ts.into_iter()
                .zip(hs)
                .map(|(t, h)| fill_defaults(t, h))
                .collect(),
        ),
        (Type::Error(None), Hint::Error(Some(h))) => Type::Error(h.without_data().map(Box::new)),
        (Type::Error(Some(t)), Hint::Error(Some(h))) => {
            Type::Error(Some(Box::new(fill_defaults(*t, h))))
        }
        (ty, _) => ty,
    }
}

/// Unit for dimensionless data under a hint's unit state.
fn plain_unit(hint: &Unit) -> Result<Unit, FlatteningError> {
    match hint {
        Unit::Unspecified | Unit::Empty => Ok(Unit::Empty),
        Unit::Named(want) => Err(FlatteningError::UnitMismatch {
            expected: want.clone(),
            found: String::new(),
        }),
    }
}

/// Unit for data labelled `have` under a hint's unit state. Always the data's own label.
fn data_unit(hint: &Unit, have: &str, units: &dyn Units) -> Result<Unit, FlatteningError> {
    if have.is_empty() {
        return plain_unit(hint);
    }
    match hint {
        Unit::Unspecified => Ok(Unit::from_label(have)),
        Unit::Named(want) if units.compatible(have, want) => Ok(Unit::from_label(have)),
        _ => Err(FlatteningError::UnitMismatch {
            expected: hint.label().unwrap_or_default().to_string(),
            found: have.to_string(),
        }),
    }
}

pub(crate) fn integer(data: &Data) -> Option<i128> {
    match data {
        Data::Int(n) => Some(*n as i128),
        Data::Word(n) => Some(*n as i128),
        _ => None,
    }
}

pub(crate) fn check_int(n: i128) -> Result<i32, FlatteningError> {
    i32::try_from(n).map_err(|_| FlatteningError::OutOfRange {
        value: n,
        target: "i",
    })
}

pub(crate) fn check_word(n: i128) -> Result<u32, FlatteningError> {
    u32::try_from(n).map_err(|_| FlatteningError::OutOfRange {
        value: n,
        target: "w",
    })
}

pub(crate) fn grid_error(e: GridError, depth: u8, data: &Data) -> FlatteningError {
    match e {
        GridError::NotASequence { .. } => FlatteningError::NotAList {
            depth,
            found: data.kind(),
        },
        GridError::Ragged {
            level,
            first,
            other,
        } => FlatteningError::Ragged {
            depth,
            level,
            first,
            other,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{hints, parse_type};
    use crate::units::ExactUnits;
    use crate::value::RemoteError;

    #[test]
    fn first_compatible_hint_wins() {
        let ty = resolve(&Data::Int(1), &hints(&["s", "w", "i"]).unwrap()).unwrap();
        assert_eq!(ty, Type::Word);
    }

    #[test]
    fn single_hint_reports_its_own_error() {
        let err = resolve(&Data::Int(-1), &hints(&["w"]).unwrap()).unwrap_err();
        assert_eq!(err, FlatteningError::OutOfRange { value: -1, target: "w" });
        let err = resolve(&Data::Int(-1), &hints(&["w", "s"]).unwrap()).unwrap_err();
        assert!(matches!(err, FlatteningError::NoMatchingHint { .. }));
    }

    #[test]
    fn exact_units_reject_other_labels() {
        let data = Data::value(5.0, "ft");
        let h = hints(&["v[m]"]).unwrap();
        assert_eq!(resolve(&data, &h).unwrap(), Type::value_in("ft"));
        assert!(resolve_with(&data, &h, &ExactUnits).is_err());
    }

    #[test]
    fn list_hint_checks_every_element() {
        let data = Data::List(vec![Data::Int(1), Data::Int(-1)]);
        let ty = resolve(&data, &hints(&["*w", "*i"]).unwrap()).unwrap();
        assert_eq!(ty, Type::list(Type::Int));

        let mixed = Data::List(vec![Data::value(1.0, "m"), Data::value(2.0, "s")]);
        let err = resolve(&mixed, &hints(&["*v[m]", "*?"]).unwrap()).unwrap_err();
        assert!(matches!(err, FlatteningError::NoMatchingHint { .. }), "{:?}", err);
    }

    #[test]
    fn empty_branch_waits_for_sibling_unit() {
        let data = Data::List(vec![
            Data::Tuple(vec![Data::List(vec![])]),
            Data::Tuple(vec![Data::List(vec![Data::value(5.0, "m")])]),
        ]);
        let ty = resolve(&data, &hints(&["*(*v)"]).unwrap()).unwrap();
        assert_eq!(ty, parse_type("*(*v[m])").unwrap());

        let all_empty = Data::List(vec![Data::Tuple(vec![Data::List(vec![])])]);
        let ty = resolve(&all_empty, &hints(&["*(*v)"]).unwrap()).unwrap();
        assert_eq!(ty, parse_type("*(*v[])").unwrap());
    }

    #[test]
    fn missing_error_payload_takes_hint_default() {
        let data = Data::List(vec![
            Data::Error(RemoteError::new(1, "a")),
            Data::Error(RemoteError::new(2, "b").with_payload(Data::Int(3))),
        ]);
        assert_eq!(resolve(&data, &hints(&["*E?"]).unwrap()).unwrap(), parse_type("*Ei").unwrap());
        let lone = Data::Error(RemoteError::new(1, "a"));
        assert_eq!(resolve(&lone, &hints(&["Ew"]).unwrap()).unwrap(), parse_type("Ew").unwrap());
    }

    #[test]
    fn bare_error_before_another_member_is_rejected() {
        let data = Data::Tuple(vec![Data::Error(RemoteError::new(1, "a")), Data::Int(2)]);
        let err = resolve(&data, &hints(&["??"]).unwrap()).unwrap_err();
        assert!(matches!(err, FlatteningError::Inference(_)), "{:?}", err);
        let ty = resolve(&data, &hints(&["(Ewi)"]).unwrap()).unwrap();
        assert_eq!(ty, parse_type("(Ewi)").unwrap());
    }

    #[test]
    fn unify_fills_unknown_lists() {
        let known = parse_type("(*v[m]w)").unwrap();
        let open = Type::Cluster(vec![Type::list_of_depth(None, 1), Type::Word]);
        assert_eq!(unify(open.clone(), known.clone()), Some(known.clone()));
        assert_eq!(unify(known.clone(), open), Some(known));
        assert_eq!(unify(Type::Int, Type::Word), None);
    }
}

//! Type tag AST: resolved types, hints (which may hold wildcards), and canonical stringification.
//!
//! Two trees are kept apart on purpose: a [`Type`] describes data on the wire and can never hold a
//! wildcard, while a [`Hint`] is what callers propose to the resolver and may hold `?` anywhere.

use std::fmt;

/// Unit state of a `v` or `c` tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Unit {
    /// Bare `v` / `c`: unit not known yet.
    Unspecified,
    /// `v[]`: explicitly dimensionless.
    Empty,
    /// `v[unit]`: opaque unit label, never converted.
    Named(String),
}

impl Unit {
    /// Unit for a label carried by data; the empty label is dimensionless.
    pub fn from_label(label: &str) -> Self {
        if label.is_empty() {
            Unit::Empty
        } else {
            Unit::Named(label.to_string())
        }
    }

    /// Label as written between the brackets, if brackets are written at all.
    pub fn label(&self) -> Option<&str> {
        match self {
            Unit::Unspecified => None,
            Unit::Empty => Some(""),
            Unit::Named(u) => Some(u),
        }
    }

    fn write_brackets(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.label() {
            Some(label) => write!(f, "[{}]", label),
            None => Ok(()),
        }
    }
}

/// A data-describing type. Never contains a wildcard.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    None,
    Bool,
    Int,
    Word,
    Str,
    Time,
    Value(Unit),
    Complex(Unit),
    /// Non-empty ordered members.
    Cluster(Vec<Type>),
    /// `elem == None` is the `*_` placeholder: element type not known (only valid for empty lists).
    List { elem: Option<Box<Type>>, depth: u8 },
    Error(Option<Box<Type>>),
}

impl Type {
    pub fn list(elem: Type) -> Self {
        Type::List {
            elem: Some(Box::new(elem)),
            depth: 1,
        }
    }

    pub fn list_of_depth(elem: Option<Type>, depth: u8) -> Self {
        Type::List {
            elem: elem.map(Box::new),
            depth,
        }
    }

    /// Dimensionless value, `v[]`.
    pub fn value() -> Self {
        Type::Value(Unit::Empty)
    }

    pub fn value_in(unit: &str) -> Self {
        Type::Value(Unit::from_label(unit))
    }

    /// True when no `*_` placeholder and no bare `v`/`c` remain anywhere in the tree.
    pub fn is_concrete(&self) -> bool {
        match self {
            Type::Value(u) | Type::Complex(u) => *u != Unit::Unspecified,
            Type::Cluster(members) => members.iter().all(Type::is_concrete),
            Type::List { elem, .. } => elem.as_deref().map_or(false, Type::is_concrete),
            Type::Error(payload) => payload.as_deref().map_or(true, Type::is_concrete),
            _ => true,
        }
    }

    /// Whether the printed tag reparses as a different type. A cluster member whose tag ends
    /// in a bare `E` swallows the next member as its payload: `(Ei)` reads back as `(E<i>)`.
    pub fn prints_ambiguously(&self) -> bool {
        match self {
            Type::Cluster(members) => {
                members.iter().any(Type::prints_ambiguously)
                    || members
                        .split_last()
                        .map_or(false, |(_, init)| init.iter().any(Type::ends_in_bare_error))
            }
            Type::List { elem: Some(e), .. } => e.prints_ambiguously(),
            Type::Error(Some(p)) => p.prints_ambiguously(),
            _ => false,
        }
    }

    fn ends_in_bare_error(&self) -> bool {
        match self {
            Type::Error(None) => true,
            Type::Error(Some(p)) => p.ends_in_bare_error(),
            Type::List { elem: Some(e), .. } => e.ends_in_bare_error(),
            _ => false,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::None => f.write_str("_"),
            Type::Bool => f.write_str("b"),
            Type::Int => f.write_str("i"),
            Type::Word => f.write_str("w"),
            Type::Str => f.write_str("s"),
            Type::Time => f.write_str("t"),
            Type::Value(u) => {
                f.write_str("v")?;
                u.write_brackets(f)
            }
            Type::Complex(u) => {
                f.write_str("c")?;
                u.write_brackets(f)
            }
            Type::Cluster(members) => {
                f.write_str("(")?;
                for m in members {
                    write!(f, "{}", m)?;
                }
                f.write_str(")")
            }
            Type::List { elem, depth } => {
                f.write_str("*")?;
                if *depth > 1 {
                    write!(f, "{}", depth)?;
                }
                match elem {
                    Some(e) => write!(f, "{}", e),
                    None => f.write_str("_"),
                }
            }
            Type::Error(payload) => {
                f.write_str("E")?;
                match payload {
                    Some(p) => write!(f, "{}", p),
                    None => Ok(()),
                }
            }
        }
    }
}

/// A candidate type proposed to the resolver. Same shape as [`Type`] plus `?`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Hint {
    None,
    Bool,
    Int,
    Word,
    Str,
    Time,
    Value(Unit),
    Complex(Unit),
    Cluster(Vec<Hint>),
    List { elem: Option<Box<Hint>>, depth: u8 },
    Error(Option<Box<Hint>>),
    Wildcard,
}

impl Hint {
    /// Convert to a [`Type`] when no wildcard is present.
    pub fn into_type(self) -> Option<Type> {
        Some(match self {
            Hint::None => Type::None,
            Hint::Bool => Type::Bool,
            Hint::Int => Type::Int,
            Hint::Word => Type::Word,
            Hint::Str => Type::Str,
            Hint::Time => Type::Time,
            Hint::Value(u) => Type::Value(u),
            Hint::Complex(u) => Type::Complex(u),
            Hint::Cluster(members) => Type::Cluster(
                members
                    .into_iter()
                    .map(Hint::into_type)
                    .collect::<Option<Vec<_>>>()?,
            ),
            Hint::List { elem, depth } => Type::List {
                elem: match elem {
                    Some(e) => Some(Box::new(e.into_type()?)),
                    None => None,
                },
                depth,
            },
            Hint::Error(payload) => Type::Error(match payload {
                Some(p) => Some(Box::new(p.into_type()?)),
                None => None,
            }),
            Hint::Wildcard => return None,
        })
    }

    /// Best type this hint describes without any data to look at: bare units become
    /// dimensionless and anything holding a wildcard is unknown (`None`).
    pub fn without_data(&self) -> Option<Type> {
        Some(match self {
            Hint::None => Type::None,
            Hint::Bool => Type::Bool,
            Hint::Int => Type::Int,
            Hint::Word => Type::Word,
            Hint::Str => Type::Str,
            Hint::Time => Type::Time,
            Hint::Value(Unit::Unspecified) => Type::Value(Unit::Empty),
            Hint::Value(u) => Type::Value(u.clone()),
            Hint::Complex(Unit::Unspecified) => Type::Complex(Unit::Empty),
            Hint::Complex(u) => Type::Complex(u.clone()),
            Hint::Cluster(members) => Type::Cluster(
                members
                    .iter()
                    .map(Hint::without_data)
                    .collect::<Option<Vec<_>>>()?,
            ),
            Hint::List { elem, depth } => Type::List {
                elem: elem.as_deref().and_then(Hint::without_data).map(Box::new),
                depth: *depth,
            },
            Hint::Error(payload) => Type::Error(match payload {
                Some(p) => Some(Box::new(p.without_data()?)),
                None => None,
            }),
            Hint::Wildcard => return None,
        })
    }

    /// Whether `ty` is an instance of this hint: `?` matches anything, bare `v`/`c` match any unit.
    pub fn matches(&self, ty: &Type) -> bool {
        match (self, ty) {
            (Hint::Wildcard, _) => true,
            (Hint::None, Type::None)
            | (Hint::Bool, Type::Bool)
            | (Hint::Int, Type::Int)
            | (Hint::Word, Type::Word)
            | (Hint::Str, Type::Str)
            | (Hint::Time, Type::Time) => true,
            (Hint::Value(h), Type::Value(t)) | (Hint::Complex(h), Type::Complex(t)) => {
                *h == Unit::Unspecified || h == t
            }
            (Hint::Cluster(hs), Type::Cluster(ts)) => {
                hs.len() == ts.len() && hs.iter().zip(ts).all(|(h, t)| h.matches(t))
            }
            (
                Hint::List { elem: he, depth: hd },
                Type::List { elem: te, depth: td },
            ) => {
                hd == td
                    && match (he, te) {
                        (None, None) => true,
                        (Some(h), Some(t)) => h.matches(t),
                        _ => false,
                    }
            }
            (Hint::Error(hp), Type::Error(tp)) => match (hp, tp) {
                (None, None) => true,
                (Some(h), Some(t)) => h.matches(t),
                _ => false,
            },
            _ => false,
        }
    }
}

impl From<Type> for Hint {
    fn from(ty: Type) -> Self {
        match ty {
            Type::None => Hint::None,
            Type::Bool => Hint::Bool,
            Type::Int => Hint::Int,
            Type::Word => Hint::Word,
            Type::Str => Hint::Str,
            Type::Time => Hint::Time,
            Type::Value(u) => Hint::Value(u),
            Type::Complex(u) => Hint::Complex(u),
            Type::Cluster(members) => Hint::Cluster(members.into_iter().map(Hint::from).collect()),
            Type::List { elem, depth } => Hint::List {
                elem: elem.map(|e| Box::new(Hint::from(*e))),
                depth,
            },
            Type::Error(payload) => Hint::Error(payload.map(|p| Box::new(Hint::from(*p)))),
        }
    }
}

impl fmt::Display for Hint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Hint::Wildcard => f.write_str("?"),
            Hint::Value(u) => {
                f.write_str("v")?;
                u.write_brackets(f)
            }
            Hint::Complex(u) => {
                f.write_str("c")?;
                u.write_brackets(f)
            }
            Hint::Cluster(members) => {
                f.write_str("(")?;
                for m in members {
                    write!(f, "{}", m)?;
                }
                f.write_str(")")
            }
            Hint::List { elem, depth } => {
                f.write_str("*")?;
                if *depth > 1 {
                    write!(f, "{}", depth)?;
                }
                match elem {
                    Some(e) => write!(f, "{}", e),
                    None => f.write_str("_"),
                }
            }
            Hint::Error(payload) => {
                f.write_str("E")?;
                match payload {
                    Some(p) => write!(f, "{}", p),
                    None => Ok(()),
                }
            }
            Hint::None => f.write_str("_"),
            Hint::Bool => f.write_str("b"),
            Hint::Int => f.write_str("i"),
            Hint::Word => f.write_str("w"),
            Hint::Str => f.write_str("s"),
            Hint::Time => f.write_str("t"),
        }
    }
}

//! Terms: the values the engine can unify.
//!
//! A [Term] is a tagged sum: a logic variable, a primitive, an array, a
//! logic list, or a record. `cons`/`nil` build the canonical list
//! representation; arrays are structural but not recursively list-shaped.
// krelation 2024

use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_VAR_ID: AtomicU64 = AtomicU64::new(0);

/// Resets the logic variable counter. Tests run `#[serial]` because this
/// counter is global, so assertions on generated ids need a stable
/// starting point.
pub fn clear_var_counter() {
    NEXT_VAR_ID.store(0, Ordering::Relaxed);
}

/// A logic variable. Identity is entirely by `id`: two `Var`s are the same
/// variable iff their ids are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Var {
    pub id: String,
}

impl Var {
    /// Allocates a fresh variable whose id is `name` concatenated with the
    /// next counter value.
    pub fn fresh(name: &str) -> Var {
        let n = NEXT_VAR_ID.fetch_add(1, Ordering::Relaxed);
        Var { id: format!("{name}_{n}") }
    }

    /// A variable with a caller-chosen id, bypassing the counter. Used when
    /// rebuilding variables deterministically (e.g. in tests and when a
    /// query builder mints named variables through a proxy).
    pub fn named(id: impl Into<String>) -> Var {
        Var { id: id.into() }
    }
}

impl fmt::Display for Var {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "${}", self.id)
    }
}

/// A singly linked logic list: `cons(head, tail) | nil`.
#[derive(Debug, Clone, PartialEq)]
pub enum LogicList {
    Cons { head: Rc<Term>, tail: Rc<Term> },
    Nil,
}

/// Any value the engine can unify.
#[derive(Debug, Clone, PartialEq)]
pub enum Term {
    Var(Var),
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    Null,
    Array(Vec<Term>),
    List(LogicList),
    /// Field order is preserved for Display, but unification treats it as
    /// a set of key/value pairs: two records must have the same key set
    /// to unify at all.
    Record(Vec<(String, Term)>),
}

impl Term {
    pub fn var(name: &str) -> Term {
        Term::Var(Var::fresh(name))
    }

    pub fn atom(s: impl Into<String>) -> Term {
        Term::Str(s.into())
    }

    /// Builds `cons(head, tail)`.
    pub fn cons(head: Term, tail: Term) -> Term {
        Term::List(LogicList::Cons { head: Rc::new(head), tail: Rc::new(tail) })
    }

    pub fn nil() -> Term {
        Term::List(LogicList::Nil)
    }

    /// Builds a proper logic list from a vector of terms: `[a, b, c]`.
    pub fn list(items: Vec<Term>) -> Term {
        let mut out = Term::nil();
        for item in items.into_iter().rev() {
            out = Term::cons(item, out);
        }
        out
    }

    /// Converts a proper logic list into a `Vec<Term>`. Returns `None` if
    /// the term is not a proper list (e.g. it ends in a variable tail).
    pub fn list_to_vec(&self) -> Option<Vec<Term>> {
        let mut out = Vec::new();
        let mut cur = self;
        loop {
            match cur {
                Term::List(LogicList::Nil) => return Some(out),
                Term::List(LogicList::Cons { head, tail }) => {
                    out.push((**head).clone());
                    cur = tail;
                }
                _ => return None,
            }
        }
    }

    pub fn is_var(&self) -> bool {
        matches!(self, Term::Var(_))
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Term::Var(v) => write!(f, "{v}"),
            Term::Int(i) => write!(f, "{i}"),
            Term::Float(x) => write!(f, "{x}"),
            Term::Str(s) => write!(f, "{s}"),
            Term::Bool(b) => write!(f, "{b}"),
            Term::Null => write!(f, "null"),
            Term::Array(items) => {
                write!(f, "[")?;
                for (i, t) in items.iter().enumerate() {
                    if i > 0 { write!(f, ", ")?; }
                    write!(f, "{t}")?;
                }
                write!(f, "]")
            }
            Term::List(list) => {
                write!(f, "[")?;
                let mut first = true;
                let mut cur = list;
                loop {
                    match cur {
                        LogicList::Nil => break,
                        LogicList::Cons { head, tail } => {
                            if !first { write!(f, ", ")?; }
                            first = false;
                            write!(f, "{head}")?;
                            match &**tail {
                                Term::List(inner) => cur = inner,
                                other => {
                                    write!(f, " | {other}")?;
                                    break;
                                }
                            }
                        }
                    }
                }
                write!(f, "]")
            }
            Term::Record(fields) => {
                write!(f, "{{")?;
                for (i, (k, v)) in fields.iter().enumerate() {
                    if i > 0 { write!(f, ", ")?; }
                    write!(f, "{k}: {v}")?;
                }
                write!(f, "}}")
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn list_round_trip() {
        let l = Term::list(vec![Term::Int(1), Term::Int(2), Term::Int(3)]);
        assert_eq!(
            l.list_to_vec(),
            Some(vec![Term::Int(1), Term::Int(2), Term::Int(3)])
        );
        assert_eq!(format!("{l}"), "[1, 2, 3]");
    }

    #[test]
    fn open_list_is_not_a_proper_list() {
        let tail = Term::var("Tail");
        let l = Term::cons(Term::Int(1), tail);
        assert_eq!(l.list_to_vec(), None);
    }

    #[test]
    fn fresh_vars_get_distinct_ids() {
        let a = Var::fresh("X");
        let b = Var::fresh("X");
        assert_ne!(a.id, b.id);
    }
}

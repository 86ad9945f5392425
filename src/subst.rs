//! Substitutions: persistent variable bindings plus engine metadata.
//!
//! A substitution never rebinds an existing variable id, and a substitution
//! returned by unification is either the input or a strict superset.
//! Bindings are stored as a persistent, singly linked
//! list of frames so that `extend` is O(1) and sharing a substitution
//! across the branches of `or` never aliases mutation into a sibling
//! branch: copying an entire binding set on every extension would be the
//! alternative, and that cost grows with the substitution's size rather
//! than staying constant.
// krelation 2024

use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;

use crate::registry::GoalHandle;
use crate::suspend::SuspendedConstraint;
use crate::term::Term;

enum Frame {
    Empty,
    Bind { id: String, term: Rc<Term>, parent: Rc<Frame> },
}

/// One frame of enclosing conjunction/disjunction, used to reconstruct the
/// `GOAL_GROUP_PATH` meta key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupKind { Conj, Disj }

#[derive(Debug, Clone)]
pub struct GroupFrame {
    pub kind: GroupKind,
    pub id: u64,
    pub branch: Option<usize>,
}

/// The well-known meta keys threaded alongside every substitution. Kept
/// as a typed side-channel rather than symbol keys baked into the map
/// itself.
#[derive(Debug, Clone, Default)]
pub struct Meta {
    pub group_id: Option<u64>,
    pub group_path: Rc<Vec<GroupFrame>>,
    pub conj_goals: Rc<HashSet<GoalHandle>>,
    pub all_goals: Rc<HashSet<GoalHandle>>,
    pub suspended: Rc<Vec<SuspendedConstraint>>,
    pub row_cache: Rc<crate::facts::sql::RowCache>,
}

/// A persistent mapping from logic variable id to term, plus metadata.
#[derive(Clone)]
pub struct Substitution {
    bindings: Rc<Frame>,
    pub meta: Meta,
}

impl Default for Substitution {
    fn default() -> Self { Substitution::empty() }
}

impl Substitution {
    pub fn empty() -> Substitution {
        Substitution { bindings: Rc::new(Frame::Empty), meta: Meta::default() }
    }

    /// Returns the term the given variable id is bound to directly (does
    /// not chase further bindings -- see [walk]).
    pub fn get(&self, id: &str) -> Option<Rc<Term>> {
        let mut frame = &self.bindings;
        loop {
            match &**frame {
                Frame::Empty => return None,
                Frame::Bind { id: fid, term, parent } => {
                    if fid == id { return Some(Rc::clone(term)); }
                    frame = parent;
                }
            }
        }
    }

    pub fn is_bound(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Extends the substitution with `id -> term`. An id already present
    /// in the map must never be rebound.
    pub fn extend(&self, id: String, term: Term) -> Substitution {
        debug_assert!(!self.is_bound(&id), "substitution.rs - attempted to rebind {id}");
        let bindings = Rc::new(Frame::Bind { id, term: Rc::new(term), parent: Rc::clone(&self.bindings) });
        Substitution { bindings, meta: self.meta.clone() }
    }

    pub fn with_meta(&self, meta: Meta) -> Substitution {
        Substitution { bindings: Rc::clone(&self.bindings), meta }
    }

    /// Ids bound in `self` but not yet in `before`. `before` must be an
    /// ancestor of `self`'s binding chain -- true of any substitution built
    /// up from `before` by zero or more `extend` calls, which is how
    /// `unify_raw` always threads it forward. Walking the chain this way
    /// finds every id actually bound, including ones reached only by
    /// chasing an alias (e.g. binding `Z` while resolving a unification
    /// given only `X` and `5`, because `X` was already bound to `Z`), not
    /// just ids that appear syntactically in the original terms.
    pub fn bound_since(&self, before: &Substitution) -> Vec<String> {
        let mut ids = Vec::new();
        let mut frame = &self.bindings;
        loop {
            if Rc::ptr_eq(frame, &before.bindings) { break; }
            match &**frame {
                Frame::Empty => break,
                Frame::Bind { id, parent, .. } => {
                    ids.push(id.clone());
                    frame = parent;
                }
            }
        }
        ids
    }
}

/// Resolves a term under a substitution until no further top-level
/// binding applies. Does not recurse into cons cells, arrays or records --
/// see [walk_deep] for that.
pub fn walk(term: &Term, s: &Substitution) -> Term {
    let mut cur = term.clone();
    loop {
        match cur {
            Term::Var(ref v) => match s.get(&v.id) {
                Some(bound) => cur = (*bound).clone(),
                None => return cur,
            },
            other => return other,
        }
    }
}

/// Like [walk], but also walks into the structure of arrays, lists and
/// records -- used by operators that need a fully-resolved value (e.g. the
/// SQL relation reading a ground column value, or aggregation collecting
/// result terms).
pub fn walk_deep(term: &Term, s: &Substitution) -> Term {
    let shallow = walk(term, s);
    match shallow {
        Term::Array(items) => Term::Array(items.iter().map(|t| walk_deep(t, s)).collect()),
        Term::List(crate::term::LogicList::Cons { head, tail }) => Term::cons(
            walk_deep(&head, s),
            walk_deep(&tail, s),
        ),
        Term::Record(fields) => Term::Record(
            fields.into_iter().map(|(k, v)| (k, walk_deep(&v, s))).collect(),
        ),
        other => other,
    }
}

impl fmt::Debug for Substitution {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut frame = &self.bindings;
        let mut pairs = Vec::new();
        loop {
            match &**frame {
                Frame::Empty => break,
                Frame::Bind { id, term, parent } => {
                    pairs.push(format!("{id} = {term}"));
                    frame = parent;
                }
            }
        }
        pairs.reverse();
        write!(f, "Substitution{{ {} }}", pairs.join(", "))
    }
}

//! Suspended constraints: predicates deferred until more variables ground.
//!
//! A goal may declare itself suspendable by supplying a term list and a
//! decision function. The function is re-run whenever a variable it
//! depends on becomes bound, in priority order, first-come within a
//! priority bucket.
// krelation 2024

use std::fmt;
use std::rc::Rc;

use crate::subst::Substitution;
use crate::term::Term;

/// What a suspended constraint's decision function may return.
pub enum Decision {
    /// Succeed, possibly having extended the substitution further.
    Succeed(Substitution),
    /// Fail outright: the branch is dropped.
    Fail,
    /// Not enough information yet; keep waiting.
    CheckLater,
}

type DecisionFn = dyn Fn(&[Term], &Substitution) -> Decision;

/// A deferred predicate. Stored keyed by the ids of its free variables;
/// removed on definite success or failure.
#[derive(Clone)]
pub struct SuspendedConstraint {
    pub name: &'static str,
    pub variables: Vec<Term>,
    pub body: Rc<DecisionFn>,
    /// Lower fires first. Ties break by insertion order, which the
    /// wake-up loop preserves by iterating in registration order.
    pub priority: i32,
}

impl fmt::Debug for SuspendedConstraint {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "SuspendedConstraint({}, priority={})", self.name, self.priority)
    }
}

impl SuspendedConstraint {
    pub fn new(
        name: &'static str,
        variables: Vec<Term>,
        priority: i32,
        body: impl Fn(&[Term], &Substitution) -> Decision + 'static,
    ) -> SuspendedConstraint {
        SuspendedConstraint { name, variables, body: Rc::new(body), priority }
    }

    /// The variable ids this constraint is not yet grounded on.
    pub fn free_ids(&self, s: &Substitution) -> Vec<String> {
        self.variables
            .iter()
            .filter_map(|t| match crate::subst::walk(t, s) {
                Term::Var(v) => Some(v.id),
                _ => None,
            })
            .collect()
    }

    /// The ids of every variable this constraint was registered on,
    /// regardless of whether they are bound yet. Used to decide whether a
    /// newly-bound id is one this constraint cares about -- `free_ids`
    /// cannot answer that question once the binding has already happened,
    /// since the id in question is no longer free in the substitution
    /// being checked.
    fn tracked_ids(&self) -> Vec<String> {
        self.variables
            .iter()
            .filter_map(|t| match t {
                Term::Var(v) => Some(v.id.clone()),
                _ => None,
            })
            .collect()
    }

    fn eval(&self, s: &Substitution) -> Decision {
        let values: Vec<Term> = self.variables.iter().map(|t| crate::subst::walk_deep(t, s)).collect();
        (self.body)(&values, s)
    }
}

/// Evaluates a constraint for the first time. If it decides `CheckLater`,
/// it is installed into `s`'s suspended set.
pub fn suspend_or_decide(c: SuspendedConstraint, s: &Substitution) -> Option<Substitution> {
    match c.eval(s) {
        Decision::Succeed(s2) => Some(s2),
        Decision::Fail => None,
        Decision::CheckLater => {
            let mut suspended = (*s.meta.suspended).clone();
            suspended.push(c);
            let mut meta = s.meta.clone();
            meta.suspended = Rc::new(suspended);
            Some(s.with_meta(meta))
        }
    }
}

/// Re-fires every suspended constraint keyed (even partially) on
/// `bound_ids`, in priority order. Returns `None` if any wakened
/// constraint fails.
pub fn wake(bound_ids: &[String], s: &Substitution) -> Option<Substitution> {
    if s.meta.suspended.is_empty() || bound_ids.is_empty() {
        return Some(s.clone());
    }

    let mut pending: Vec<SuspendedConstraint> = Vec::new();
    let mut woken: Vec<SuspendedConstraint> = Vec::new();
    for c in s.meta.suspended.iter() {
        if c.tracked_ids().iter().any(|id| bound_ids.contains(id)) {
            woken.push(c.clone());
        } else {
            pending.push(c.clone());
        }
    }
    woken.sort_by_key(|c| c.priority);
    if !woken.is_empty() {
        tracing::trace!(count = woken.len(), ?bound_ids, "waking suspended constraints");
    }

    let mut cur = {
        let mut meta = s.meta.clone();
        meta.suspended = Rc::new(pending);
        s.with_meta(meta)
    };

    for c in woken {
        match c.eval(&cur) {
            Decision::Succeed(s2) => { cur = s2; }
            Decision::Fail => return None,
            Decision::CheckLater => {
                let mut suspended = (*cur.meta.suspended).clone();
                suspended.push(c);
                let mut meta = cur.meta.clone();
                meta.suspended = Rc::new(suspended);
                cur = cur.with_meta(meta);
            }
        }
    }
    Some(cur)
}

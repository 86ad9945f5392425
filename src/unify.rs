//! Unification with occurs-check, and constraint-wakeup on top of it.
// krelation 2024

use crate::subst::{walk, Substitution};
use crate::suspend::wake;
use crate::term::{LogicList, Term};

/// Does `v` occur structurally inside `t`, under substitution `s`?
/// Guards against binding a variable to a term that contains it.
pub fn occurs_check(v: &str, t: &Term, s: &Substitution) -> bool {
    match walk(t, s) {
        Term::Var(ref w) => w.id == v,
        Term::Array(items) => items.iter().any(|item| occurs_check(v, item, s)),
        Term::List(LogicList::Cons { head, tail }) => {
            occurs_check(v, &head, s) || occurs_check(v, &tail, s)
        }
        Term::Record(fields) => fields.iter().any(|(_, val)| occurs_check(v, val, s)),
        _ => false,
    }
}

/// Binds `v` to `val` after an occurs-check. Returns `None` if the check
/// fails.
pub fn extend_subst(v: &str, val: Term, s: &Substitution) -> Option<Substitution> {
    if occurs_check(v, &val, s) { return None; }
    Some(s.extend(v.to_string(), val))
}

/// Unifies two terms under substitution `s`, without waking suspended
/// constraints. See [unify] for the constraint-aware wrapper most callers
/// should use.
pub fn unify_raw(u: &Term, v: &Term, s: &Substitution) -> Option<Substitution> {
    let u = walk(u, s);
    let v = walk(v, s);

    if u == v { return Some(s.clone()); }

    match (&u, &v) {
        (Term::Var(a), Term::Var(b)) => {
            if a.id == b.id { Some(s.clone()) } else { extend_subst(&a.id, v.clone(), s) }
        }
        (Term::Var(a), _) => extend_subst(&a.id, v.clone(), s),
        (_, Term::Var(b)) => extend_subst(&b.id, u.clone(), s),

        (Term::List(LogicList::Cons { head: h1, tail: t1 }),
         Term::List(LogicList::Cons { head: h2, tail: t2 })) => {
            let s2 = unify_raw(h1, h2, s)?;
            unify_raw(t1, t2, &s2)
        }
        (Term::List(LogicList::Nil), Term::List(LogicList::Nil)) => Some(s.clone()),

        (Term::Array(a), Term::Array(b)) => {
            if a.len() != b.len() { return None; }
            let mut cur = s.clone();
            for (x, y) in a.iter().zip(b.iter()) {
                cur = unify_raw(x, y, &cur)?;
            }
            Some(cur)
        }

        (Term::Record(a), Term::Record(b)) => {
            if a.len() != b.len() { return None; }
            let mut cur = s.clone();
            for (k, x) in a {
                let y = b.iter().find(|(k2, _)| k2 == k).map(|(_, y)| y)?;
                cur = unify_raw(x, y, &cur)?;
            }
            Some(cur)
        }

        _ => None,
    }
}

/// Unifies `u` and `v`, then wakes any suspended constraints keyed on the
/// variables that became bound as a result. If a wakened constraint fails,
/// the whole unification fails.
///
/// The newly-bound set is read directly off `after`'s binding chain rather
/// than scanning `u`/`v` for `Term::Var` occurrences, because a binding can
/// land on a variable that appears in neither term literally -- e.g. `u`
/// may already be bound to some other variable `w`, in which case this
/// unification actually binds `w`, not any id written in `u`/`v` themselves.
pub fn unify(u: &Term, v: &Term, s: &Substitution) -> Option<Substitution> {
    let after = unify_raw(u, v, s)?;
    let bound = after.bound_since(s);
    wake(&bound, &after)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::term::Var;

    #[test]
    fn occurs_check_rejects_self_reference() {
        let s = Substitution::empty();
        let x = Term::Var(Var::named("X"));
        let list = Term::cons(x.clone(), Term::nil());
        assert!(unify(&x, &list, &s).is_none());
    }

    #[test]
    fn unify_is_symmetric_modulo_orientation() {
        let s = Substitution::empty();
        let x = Term::Var(Var::named("X"));
        let seven = Term::Int(7);

        let s1 = unify(&x, &seven, &s).unwrap();
        let s2 = unify(&seven, &x, &s).unwrap();
        assert_eq!(crate::subst::walk(&x, &s1), Term::Int(7));
        assert_eq!(crate::subst::walk(&x, &s2), Term::Int(7));
    }

    #[test]
    fn unify_walks_both_sides_first() {
        let s = Substitution::empty();
        let x = Term::Var(Var::named("X"));
        let y = Term::Var(Var::named("Y"));
        let s = unify(&x, &Term::Int(1), &s).unwrap();
        assert!(unify(&y, &x, &s).is_some());
        let s2 = unify(&y, &x, &s).unwrap();
        assert_eq!(crate::subst::walk(&y, &s2), Term::Int(1));
    }

    #[test]
    fn lists_unify_elementwise() {
        let s = Substitution::empty();
        let a = Term::list(vec![Term::Int(1), Term::Int(2)]);
        let x = Term::Var(Var::named("X"));
        let y = Term::Var(Var::named("Y"));
        let b = Term::list(vec![x.clone(), y.clone()]);
        let s = unify(&a, &b, &s).unwrap();
        assert_eq!(crate::subst::walk(&x, &s), Term::Int(1));
        assert_eq!(crate::subst::walk(&y, &s), Term::Int(2));
    }

    #[test]
    fn mismatched_arrays_fail() {
        let s = Substitution::empty();
        let a = Term::Array(vec![Term::Int(1)]);
        let b = Term::Array(vec![Term::Int(1), Term::Int(2)]);
        assert!(unify(&a, &b, &s).is_none());
    }
}

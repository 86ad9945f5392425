//! Black-box unification tests: occurs-check, array/record shape
//! mismatches, and the constraint wake-up path that sits above raw
//! unification.

use krelation::subst::Substitution;
use krelation::suspend::{suspend_or_decide, Decision, SuspendedConstraint};
use krelation::unify::unify;
use krelation::{Term, Var};

#[test]
fn occurs_check_blocks_infinite_structure() {
    let s = Substitution::empty();
    let x = Term::Var(Var::named("X"));
    let cyclic = Term::Array(vec![x.clone()]);
    assert!(unify(&x, &cyclic, &s).is_none());
}

#[test]
fn records_unify_by_key_set_regardless_of_order() {
    let s = Substitution::empty();
    let a = Term::Record(vec![("a".into(), Term::Int(1)), ("b".into(), Term::Int(2))]);
    let b = Term::Record(vec![("b".into(), Term::Int(2)), ("a".into(), Term::Int(1))]);
    assert!(unify(&a, &b, &s).is_some());
}

#[test]
fn records_with_different_keys_fail() {
    let s = Substitution::empty();
    let a = Term::Record(vec![("a".into(), Term::Int(1))]);
    let b = Term::Record(vec![("b".into(), Term::Int(1))]);
    assert!(unify(&a, &b, &s).is_none());
}

#[test]
fn chained_variables_resolve_to_the_same_ground_value() {
    let s = Substitution::empty();
    let x = Term::Var(Var::named("X"));
    let y = Term::Var(Var::named("Y"));
    let z = Term::Var(Var::named("Z"));
    let s = unify(&x, &y, &s).unwrap();
    let s = unify(&y, &z, &s).unwrap();
    let s = unify(&z, &Term::Int(9), &s).unwrap();
    assert_eq!(krelation::walk(&x, &s), Term::Int(9));
    assert_eq!(krelation::walk(&y, &s), Term::Int(9));
}

#[test]
fn constraint_wakes_when_its_variable_is_bound_only_through_an_alias() {
    let x = Term::Var(Var::named("X"));
    let z = Term::Var(Var::named("Z"));

    // A constraint tracked on Z, not X.
    let c = SuspendedConstraint::new("positive", vec![z.clone()], 0, |values, s| {
        match &values[0] {
            Term::Int(n) if *n > 0 => Decision::Succeed(s.clone()),
            Term::Int(_) => Decision::Fail,
            _ => Decision::CheckLater,
        }
    });
    let s = Substitution::empty();
    let s = suspend_or_decide(c, &s).unwrap();
    assert_eq!(s.meta.suspended.len(), 1);

    // X aliases to Z first, so Z is still unbound and the constraint stays suspended.
    let s = unify(&x, &z, &s).unwrap();
    assert_eq!(s.meta.suspended.len(), 1);

    // Binding X to 5 actually binds Z (X was already aliased to it), which
    // must wake the constraint even though "Z" never appears in this call's
    // own arguments.
    let s = unify(&x, &Term::Int(5), &s).unwrap();
    assert!(s.meta.suspended.is_empty());
    assert_eq!(krelation::walk(&z, &s), Term::Int(5));
}

#[test]
fn constraint_failure_through_an_alias_aborts_unification() {
    let x = Term::Var(Var::named("X"));
    let z = Term::Var(Var::named("Z"));
    let c = SuspendedConstraint::new("positive", vec![z.clone()], 0, |values, s| {
        match &values[0] {
            Term::Int(n) if *n > 0 => Decision::Succeed(s.clone()),
            Term::Int(_) => Decision::Fail,
            _ => Decision::CheckLater,
        }
    });
    let s = Substitution::empty();
    let s = suspend_or_decide(c, &s).unwrap();
    let s = unify(&x, &z, &s).unwrap();
    assert!(unify(&x, &Term::Int(-5), &s).is_none());
}

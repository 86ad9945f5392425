//! Black-box tests for the fluent query builder.

use krelation::facts::MemoryRelation;
use krelation::goal::eq;
use krelation::query::query;
use krelation::{Term, Var};
use std::rc::Rc;

#[test]
fn select_projects_multiple_terms_in_declared_order() {
    let x = Term::Var(Var::named("X"));
    let y = Term::Var(Var::named("Y"));
    let q = query()
        .select(vec![y.clone(), x.clone()])
        .filter(eq(x.clone(), Term::Int(1)))
        .filter(eq(y.clone(), Term::Int(2)))
        .build()
        .unwrap();
    let rows = q.to_vec().unwrap();
    assert_eq!(rows, vec![vec![Term::Int(2), Term::Int(1)]]);
}

#[test]
fn as_goal_lets_a_built_query_be_reused_as_a_sub_goal() {
    let mut rel = MemoryRelation::new(1);
    rel.set(vec![Term::atom("red")]);
    rel.set(vec![Term::atom("blue")]);
    let rel = Rc::new(rel);

    let c = Term::Var(Var::named("C"));
    let inner = query().select(vec![c.clone()]).filter(rel.as_goal(vec![c.clone()])).build().unwrap();

    let outer = query().select(vec![c.clone()]).filter(inner.as_goal()).build().unwrap();
    let mut rows: Vec<Term> = outer.to_vec().unwrap().into_iter().flatten().collect();
    rows.sort_by_key(|t| t.to_string());
    assert_eq!(rows, vec![Term::atom("blue"), Term::atom("red")]);
}

#[test]
fn to_vec_on_a_contradictory_query_is_empty_not_an_error() {
    let q = query()
        .select(vec![Term::Int(1)])
        .filter(eq(Term::Int(1), Term::Int(2)))
        .build()
        .unwrap();
    assert_eq!(q.to_vec().unwrap(), Vec::<Vec<Term>>::new());
}

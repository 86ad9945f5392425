//! Black-box tests for subqueries and stream-level aggregators.

use krelation::aggregate::{
    collect_distincto, count_distincto, count_valueo, sort_by_streamo, take_streamo, SortOrder,
};
use krelation::goal::{and, eq, or};
use krelation::stream::SStream;
use krelation::subst::{walk, walk_deep, Substitution};
use krelation::{Term, Var};

fn run(g: &krelation::BoxGoal) -> Vec<Substitution> {
    g.apply(SStream::of(Substitution::empty())).collect_results().unwrap()
}

fn colors(c: Term) -> krelation::BoxGoal {
    or(vec![
        eq(c.clone(), Term::atom("red")),
        eq(c.clone(), Term::atom("red")),
        eq(c.clone(), Term::atom("blue")),
    ])
}

#[test]
fn collect_distincto_drops_duplicate_values_but_keeps_the_count_right() {
    let c = Term::Var(Var::named("C"));
    let l = Term::Var(Var::named("L"));
    let out = run(&collect_distincto(c.clone(), colors(c), l.clone()));
    assert_eq!(out.len(), 1);
    let list = walk(&l, &out[0]).list_to_vec().unwrap();
    assert_eq!(list.len(), 2);
}

#[test]
fn count_distincto_counts_unique_values_not_solutions() {
    let c = Term::Var(Var::named("C"));
    let n = Term::Var(Var::named("N"));
    let out = run(&count_distincto(c.clone(), colors(c), n.clone()));
    assert_eq!(walk(&n, &out[0]), Term::Int(2));
}

#[test]
fn count_valueo_counts_occurrences_of_an_outer_bound_value() {
    let c = Term::Var(Var::named("C"));
    let n = Term::Var(Var::named("N"));
    let target = Term::atom("red");
    let out = run(&count_valueo(c.clone(), colors(c), target, n.clone()));
    assert_eq!(walk(&n, &out[0]), Term::Int(2));
}

#[test]
fn sort_by_streamo_descending_reverses_order() {
    let x = Term::Var(Var::named("X"));
    let g = or(vec![
        eq(x.clone(), Term::Int(1)),
        eq(x.clone(), Term::Int(3)),
        eq(x.clone(), Term::Int(2)),
    ]);
    let sorted = and(vec![g, sort_by_streamo(x.clone(), SortOrder::Desc)]);
    let out = run(&sorted);
    let values: Vec<i64> = out.iter().map(|s| match walk(&x, s) { Term::Int(n) => n, _ => 0 }).collect();
    assert_eq!(values, vec![3, 2, 1]);
}

#[test]
fn take_streamo_caps_result_count_after_sorting() {
    let x = Term::Var(Var::named("X"));
    let g = or(vec![
        eq(x.clone(), Term::Int(1)),
        eq(x.clone(), Term::Int(3)),
        eq(x.clone(), Term::Int(2)),
    ]);
    let capped = and(vec![g, sort_by_streamo(x.clone(), SortOrder::Asc), take_streamo(2)]);
    let out = run(&capped);
    let values: Vec<i64> = out.iter().map(|s| match walk_deep(&x, s) { Term::Int(n) => n, _ => 0 }).collect();
    assert_eq!(values, vec![1, 2]);
}

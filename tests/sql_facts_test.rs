//! Black-box tests for the SQL-backed fact relation: query merging across
//! sibling goals, the subsumption row cache, and symmetric desugaring,
//! exercised against the bundled family-tree example data set.

use krelation::facts::{RelationConfig, SqlRelationFactory, SqliteStore};
use krelation::goal::{and, eq};
use krelation::lists::membero;
use krelation::stream::SStream;
use krelation::subst::{walk, Substitution};
use krelation::{Term, Var};
use rusqlite::Connection;

fn family_db() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(include_str!("../demos/family.sql")).unwrap();
    conn
}

#[test]
fn grandparent_query_merges_two_family_goals_into_one_select() {
    let factory = SqlRelationFactory::new(SqliteStore::new(family_db()));
    let gp = Term::Var(Var::named("GP"));
    let p = Term::Var(Var::named("P"));
    let k = Term::Var(Var::named("K"));

    let goal = and(vec![
        eq(k.clone(), Term::atom("charles")),
        factory.make("family", vec![("parent", gp.clone()), ("kid", p.clone())], RelationConfig::default()),
        factory.make("family", vec![("parent", p.clone()), ("kid", k.clone())], RelationConfig::default()),
    ]);
    let out = goal.apply(SStream::of(Substitution::empty())).collect_results().unwrap();
    assert_eq!(out.len(), 1);
    assert_eq!(walk(&gp, &out[0]), Term::atom("george"));
    assert_eq!(walk(&p, &out[0]), Term::atom("elizabeth"));
    assert_eq!(factory.query_count(), 1);
}

#[test]
fn subsumption_cache_reuses_a_broader_prior_query() {
    let factory = SqlRelationFactory::new(SqliteStore::new(family_db()));
    let x = Term::Var(Var::named("X"));

    let all_kids = factory.make("family", vec![("kid", x.clone())], RelationConfig::default());
    let _ = all_kids.apply(SStream::of(Substitution::empty())).collect_results().unwrap();
    assert_eq!(factory.query_count(), 1);

    let one_kid = factory.make(
        "family",
        vec![("kid", Term::atom("charles"))],
        RelationConfig::default(),
    );
    let narrowed = one_kid.apply(SStream::of(Substitution::empty())).collect_results().unwrap();
    assert!(!narrowed.is_empty());
    assert_eq!(factory.query_count(), 1, "narrower query should have been served from cache");
}

#[test]
fn symmetric_relationship_matches_regardless_of_stored_orientation() {
    let factory = SqlRelationFactory::new(SqliteStore::new(family_db()));
    let x = Term::Var(Var::named("X"));
    let goal = factory.make_symmetric(
        "relationship",
        "a",
        "b",
        Term::atom("diana"),
        x.clone(),
        RelationConfig::default(),
    );
    let out = goal.apply(SStream::of(Substitution::empty())).collect_results().unwrap();
    assert_eq!(out.len(), 1);
    assert_eq!(walk(&x, &out[0]), Term::atom("charles"));
}

#[test]
fn nested_combinator_ahead_of_two_sql_goals_still_merges_into_one_select() {
    let factory = SqlRelationFactory::new(SqliteStore::new(family_db()));
    let x = Term::Var(Var::named("X"));
    let color = Term::Var(Var::named("Color"));
    let number = Term::Var(Var::named("Number"));

    // membero desugars through fresh/conde into Or. It carries no SQL goal
    // of its own and sits ahead of both people_info goals in this
    // conjunction's scope; it must not hide either from the other's peer
    // search just because the stream passed through it first. "nobody"
    // forces membero through a recursive conde branch before it reaches the
    // one candidate that actually matches.
    let candidates = Term::list(vec![Term::atom("nobody"), Term::atom("elizabeth")]);
    let goal = and(vec![
        membero(x.clone(), candidates),
        factory.make("people_info", vec![("person", x.clone()), ("color", color.clone())], RelationConfig::default()),
        factory.make("people_info", vec![("person", x.clone()), ("number", number.clone())], RelationConfig::default()),
    ]);
    let out = goal.apply(SStream::of(Substitution::empty())).collect_results().unwrap();
    assert_eq!(out.len(), 1);
    assert_eq!(walk(&x, &out[0]), Term::atom("elizabeth"));
    assert_eq!(
        factory.query_count(),
        1,
        "sql goals should still discover each other as peers across a nested membero/conde"
    );
}

#[test]
fn disabling_query_merging_issues_one_query_per_goal() {
    let factory = SqlRelationFactory::new(SqliteStore::new(family_db()));
    let gp = Term::Var(Var::named("GP"));
    let p = Term::Var(Var::named("P"));
    let k = Term::Var(Var::named("K"));
    let config = RelationConfig::default().with_query_merging(false).with_caching(false);

    let goal = and(vec![
        factory.make("family", vec![("parent", gp.clone()), ("kid", p.clone())], config.clone()),
        factory.make("family", vec![("parent", p.clone()), ("kid", k.clone())], config),
    ]);
    let out = goal.apply(SStream::of(Substitution::empty())).collect_results().unwrap();
    assert!(!out.is_empty());
    assert_eq!(factory.query_count(), 2);
}

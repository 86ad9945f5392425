//! Benchmarks the two hot paths: raw unification and a SQL-merged query,
//! since this crate's hot path is unification/streaming rather than list
//! sorting expressed as logic clauses.
// krelation 2024

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use krelation::facts::sql::{RelationConfig, SqlRelationFactory, SqliteStore};
use krelation::{and, query, Term, Var};
use krelation::subst::Substitution;
use rusqlite::Connection;

fn bench_unify(c: &mut Criterion) {
    c.bench_function("unify_nested_lists", |b| {
        b.iter(|| {
            let s = Substitution::empty();
            let x = Term::Var(Var::named("X"));
            let y = Term::Var(Var::named("Y"));
            let a = Term::list(vec![Term::Int(1), x.clone(), Term::Int(3)]);
            let bb = Term::list(vec![Term::Int(1), Term::Int(2), y.clone()]);
            black_box(krelation::unify::unify(&a, &bb, &s));
        })
    });
}

fn seeded_db() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch("CREATE TABLE people (id TEXT, name TEXT, color TEXT);").unwrap();
    for i in 0..200 {
        conn.execute(
            "INSERT INTO people VALUES (?1, ?2, ?3)",
            rusqlite::params![format!("id{i}"), format!("name{i}"), format!("color{i}")],
        ).unwrap();
    }
    conn
}

fn bench_sql_merge(c: &mut Criterion) {
    c.bench_function("sql_merged_sibling_goals", |b| {
        b.iter(|| {
            let factory = SqlRelationFactory::new(SqliteStore::new(seeded_db()));
            let id = Term::Var(Var::named("Id"));
            let name = Term::Var(Var::named("Name"));
            let color = Term::Var(Var::named("Color"));
            let goal = and(vec![
                factory.make("people", vec![("id", id.clone()), ("name", name.clone())], RelationConfig::default()),
                factory.make("people", vec![("id", id), ("color", color.clone())], RelationConfig::default()),
            ]);
            let q = query().select(vec![name, color]).filter(goal).build().unwrap();
            black_box(q.to_vec().unwrap());
        })
    });
}

criterion_group!(benches, bench_unify, bench_sql_merge);
criterion_main!(benches);

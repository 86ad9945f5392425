//! Worked example: querying the family/people data set, including one
//! aggregation (grandchildren grouped by grandparent) on top of the SQL
//! fact relation, bundled as a small standalone demo alongside the core
//! library.
// krelation 2024

use krelation::facts::sql::{RelationConfig, SqlRelationFactory, SqliteStore};
use krelation::{and, query, Term, Var};
use krelation::aggregate::group_by_collecto;
use rusqlite::Connection;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let conn = Connection::open_in_memory().expect("open in-memory db");
    conn.execute_batch(include_str!("../../family.sql")).expect("seed demo database");
    let factory = SqlRelationFactory::new(SqliteStore::new(conn));

    let gp = Term::Var(Var::named("GP"));
    let p = Term::Var(Var::named("P"));
    let k = Term::Var(Var::named("K"));
    let grandkids = Term::Var(Var::named("Grandkids"));

    let pairs = and(vec![
        factory.make("family", vec![("parent", gp.clone()), ("kid", p.clone())], RelationConfig::default()),
        factory.make("family", vec![("parent", p), ("kid", k.clone())], RelationConfig::default()),
    ]);

    let grouped = group_by_collecto(gp.clone(), k, pairs, grandkids.clone());
    let q = query()
        .select(vec![gp, grandkids])
        .filter(grouped)
        .build()
        .expect("query builds");

    println!("grandchildren by grandparent:");
    for row in q.to_vec().expect("query runs") {
        println!("  {row:?}");
    }
    println!("sql queries issued: {}", factory.query_count());
}

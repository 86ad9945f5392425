//! `query`: a fixed demonstration of the engine over the family/people
//! example data set. There is no surface query language, so rather than
//! reading source from stdin this binary simply runs a small, fixed
//! script and prints what it finds.
// krelation 2024

use std::rc::Rc;

use krelation::facts::sql::{RelationConfig, SqlRelationFactory, SqliteStore, WhereCondition, WhereOp};
use krelation::facts::MemoryRelation;
use krelation::{and, eq, query, Term, Var};
use rusqlite::Connection;

fn open_demo_db() -> rusqlite::Result<Connection> {
    let conn = Connection::open_in_memory()?;
    conn.execute_batch(include_str!("../demos/family.sql"))?;
    Ok(conn)
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let conn = open_demo_db().expect("seed demo database");
    let factory = SqlRelationFactory::new(SqliteStore::new(conn));

    println!("-- grandparents of charles's children --");
    let gp = Term::Var(Var::named("GP"));
    let p = Term::Var(Var::named("P"));
    let k = Term::Var(Var::named("K"));
    let grandparents = query()
        .select(vec![gp.clone(), k.clone()])
        .filter(and(vec![
            factory.make("family", vec![("parent", gp.clone()), ("kid", p.clone())], RelationConfig::default()),
            factory.make("family", vec![("parent", p), ("kid", k)], RelationConfig::default()),
        ]))
        .build()
        .expect("query builds");
    for row in grandparents.to_vec().expect("query runs") {
        println!("{row:?}");
    }

    println!("-- favourite colors of people over 50 --");
    let person = Term::Var(Var::named("Person"));
    let color = Term::Var(Var::named("Color"));
    let number = Term::Var(Var::named("Number"));
    let over_fifty = query()
        .select(vec![person.clone(), color.clone()])
        .filter(factory.make_filtered(
            "people_info",
            vec![("person", person), ("color", color), ("number", number)],
            vec![WhereCondition { column: "number".to_string(), op: WhereOp::Gt, values: vec![Term::Int(50)] }],
            RelationConfig::default(),
        ))
        .build()
        .expect("query builds");
    for row in over_fifty.to_vec().expect("query runs") {
        println!("{row:?}");
    }

    println!("-- siblings, via an in-memory relation --");
    let mut siblings = MemoryRelation::new(2);
    siblings.set(vec![Term::atom("charles"), Term::atom("anne")]);
    siblings.set(vec![Term::atom("william"), Term::atom("harry")]);
    let siblings = Rc::new(siblings);
    let a = Term::Var(Var::named("A"));
    let b = Term::Var(Var::named("B"));
    let sibling_query = query()
        .select(vec![a.clone(), b.clone()])
        .filter(siblings.as_goal(vec![a, b]))
        .build()
        .expect("query builds");
    for row in sibling_query.to_vec().expect("query runs") {
        println!("{row:?}");
    }

    println!("-- a goal that always fails, wrapped in not() --");
    let refuted = query()
        .select(vec![Term::Int(1)])
        .filter(krelation::not(eq(Term::Int(1), Term::Int(2))))
        .build()
        .expect("query builds");
    println!("{:?}", refuted.to_vec().expect("query runs"));
}

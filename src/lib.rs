//! krelation: an embedded relational/logic query engine.
//!
//! A small miniKanren-style core (terms, substitutions, unification,
//! goals) supports a goal algebra (`and`/`or`/`conde`/`not`/soft-cut),
//! suspended constraints that re-fire as variables ground, aggregation
//! and subqueries, and two kinds of fact relation: an in-memory indexed
//! one and a SQL-backed one that batches sibling goals into merged
//! queries and caches rows across cache-compatible peers.
//!
//! Everything here is synchronous and single-threaded: a [goal::Goal] is
//! a plain function from a [stream::SStream] to a [stream::SStream], and
//! a query runs to completion by pulling that stream to exhaustion (or
//! to a `limit`). There is no surface query language; queries are built
//! in Rust with the [query] module's builder.
// krelation 2024

pub mod aggregate;
pub mod error;
pub mod facts;
pub mod goal;
pub mod lists;
pub mod query;
pub mod registry;
pub mod stream;
pub mod subst;
pub mod suspend;
pub mod term;
pub mod unify;

pub use error::{EngineError, EngineResult};
pub use goal::{and, conde, eq, fresh, ifte, not, onceo, or, BoxGoal, Goal};
pub use query::{query, Query, QueryBuilder};
pub use stream::SStream;
pub use subst::{walk, walk_deep, Substitution};
pub use term::{Term, Var};

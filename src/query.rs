//! The fluent query builder.
//!
//! Wraps goal construction and solution iteration behind one call,
//! expressed as an ordinary builder rather than a macro, since the
//! pieces it assembles (a projection, a goal, an optional limit) are
//! runtime values, not syntax.
// krelation 2024

use std::rc::Rc;

use crate::error::{EngineError, EngineResult};
use crate::goal::{and, BoxGoal};
use crate::stream::SStream;
use crate::subst::{walk_deep, Substitution};
use crate::term::Term;

/// Accumulates a query's pieces; `build()` raises [EngineError::BuildError]
/// for programming errors -- a missing `select`/`filter` call -- rather
/// than letting them surface silently as empty results.
#[derive(Default)]
pub struct QueryBuilder {
    select: Vec<Term>,
    goals: Vec<BoxGoal>,
    limit: Option<usize>,
}

pub fn query() -> QueryBuilder {
    QueryBuilder::default()
}

impl QueryBuilder {
    /// The terms to project out of each solution, in order.
    pub fn select(mut self, terms: Vec<Term>) -> QueryBuilder {
        self.select = terms;
        self
    }

    /// Adds one goal to the query's conjunction. May be called more than
    /// once; every call's goal is conjoined with the rest.
    pub fn filter(mut self, goal: BoxGoal) -> QueryBuilder {
        self.goals.push(goal);
        self
    }

    pub fn limit(mut self, n: usize) -> QueryBuilder {
        self.limit = Some(n);
        self
    }

    pub fn build(self) -> EngineResult<Query> {
        if self.select.is_empty() {
            return Err(EngineError::BuildError("query has no select() terms".to_string()));
        }
        if self.goals.is_empty() {
            return Err(EngineError::BuildError("query has no filter() goal".to_string()));
        }
        let goal = if self.goals.len() == 1 {
            self.goals.into_iter().next().unwrap()
        } else {
            and(self.goals)
        };
        Ok(Query { select: self.select, goal, limit: self.limit })
    }
}

/// A built, runnable query.
pub struct Query {
    select: Vec<Term>,
    goal: BoxGoal,
    limit: Option<usize>,
}

impl Query {
    /// Runs the query to completion, returning one row (the walked
    /// `select` terms) per solution.
    pub fn to_vec(&self) -> EngineResult<Vec<Vec<Term>>> {
        let stream = self.goal.apply(SStream::of(Substitution::empty()));
        let stream = match self.limit {
            Some(n) => stream.take(n),
            None => stream,
        };
        let solutions = stream.collect_results()?;
        Ok(solutions.iter().map(|s| self.project(s)).collect())
    }

    fn project(&self, s: &Substitution) -> Vec<Term> {
        self.select.iter().map(|t| walk_deep(t, s)).collect()
    }

    /// Runs the query but stops after the first solution, if any.
    pub fn first(&self) -> EngineResult<Option<Vec<Term>>> {
        let stream = self.goal.apply(SStream::of(Substitution::empty())).take(1);
        let mut solutions = stream.collect_results()?;
        Ok(solutions.pop().map(|s| self.project(&s)))
    }

    /// Exposes the built goal directly, e.g. to conjoin this query as a
    /// sub-goal of another.
    pub fn as_goal(&self) -> BoxGoal {
        Rc::clone(&self.goal)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::facts::memory::MemoryRelation;
    use crate::goal::eq;
    use crate::term::Var;

    #[test]
    fn build_fails_without_select_or_filter() {
        assert!(query().filter(eq(Term::Int(1), Term::Int(1))).build().is_err());
        assert!(query().select(vec![Term::Int(1)]).build().is_err());
    }

    #[test]
    fn select_projects_bound_variables() {
        let x = Term::Var(Var::named("X"));
        let q = query()
            .select(vec![x.clone()])
            .filter(eq(x, Term::Int(42)))
            .build()
            .unwrap();
        let rows = q.to_vec().unwrap();
        assert_eq!(rows, vec![vec![Term::Int(42)]]);
    }

    #[test]
    fn limit_truncates_results() {
        let mut rel = MemoryRelation::new(1);
        rel.set(vec![Term::Int(1)]);
        rel.set(vec![Term::Int(2)]);
        rel.set(vec![Term::Int(3)]);
        let rel = std::rc::Rc::new(rel);

        let x = Term::Var(Var::named("X"));
        let q = query()
            .select(vec![x.clone()])
            .filter(rel.as_goal(vec![x]))
            .limit(2)
            .build()
            .unwrap();
        assert_eq!(q.to_vec().unwrap().len(), 2);
    }

    #[test]
    fn first_returns_none_on_no_solutions() {
        let q = query()
            .select(vec![Term::Int(1)])
            .filter(eq(Term::Int(1), Term::Int(2)))
            .build()
            .unwrap();
        assert_eq!(q.first().unwrap(), None);
    }
}

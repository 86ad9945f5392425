//! Aggregation and subqueries.
//!
//! `Subquery` is the core operator: it runs an inner goal to completion on
//! the current outer substitution, aggregates the collected values, and
//! unifies the aggregate with an output term in the *outer* scope only --
//! nothing from the inner goal's bindings leaks out. This generalizes the
//! usual fixed count/filter predicates into one parameterized subquery,
//! plus stream-level aggregators that do not need an inner goal at all
//! (`sort_by_streamo`, `group_by_*_streamo`).
// krelation 2024

use std::cmp::Ordering as CmpOrdering;
use std::collections::HashMap;
use std::rc::Rc;

use crate::goal::{BoxGoal, Goal};
use crate::stream::SStream;
use crate::subst::{walk, walk_deep, Substitution};
use crate::term::Term;
use crate::unify::unify;

/// Computes an aggregate value from the walked `key` values collected
/// across a subquery's solutions, plus the outer substitution they were
/// collected under.
pub type AggregatorFn = Rc<dyn Fn(Vec<Term>, &Substitution) -> Term>;

/// Runs `inner` to completion against the current outer substitution,
/// collects the walked value of `key` from each result, applies
/// `aggregator` to that list (plus the original outer substitution), and
/// unifies the aggregate with `out`.
pub struct Subquery {
    pub inner: BoxGoal,
    pub key: Term,
    pub out: Term,
    pub aggregator: AggregatorFn,
}

impl Goal for Subquery {
    fn apply(&self, input: SStream) -> SStream {
        let inner = Rc::clone(&self.inner);
        let key = self.key.clone();
        let out = self.out.clone();
        let aggregator = Rc::clone(&self.aggregator);
        input.flat_map(move |outer| {
            let results = match inner.apply(SStream::of(outer.clone())).collect_results() {
                Ok(v) => v,
                Err(e) => return SStream::error(e),
            };
            let values: Vec<Term> = results.iter().map(|s| walk_deep(&key, s)).collect();
            let aggregate = aggregator(values, &outer);
            match unify(&out, &aggregate, &outer) {
                Some(s) => SStream::of(s),
                None => SStream::empty(),
            }
        })
    }
}

fn subquery(inner: BoxGoal, key: Term, out: Term,
            aggregator: impl Fn(Vec<Term>, &Substitution) -> Term + 'static) -> BoxGoal {
    Rc::new(Subquery { inner, key, out, aggregator: Rc::new(aggregator) })
}

/// `collecto(x, g, out)`: `out` is bound to the logic list of every walked
/// value of `x` across `g`'s solutions.
pub fn collecto(x: Term, g: BoxGoal, out: Term) -> BoxGoal {
    subquery(g, x, out, |values, _| Term::list(values))
}

fn dedup(values: Vec<Term>) -> Vec<Term> {
    let mut out: Vec<Term> = Vec::new();
    for v in values {
        if !out.contains(&v) { out.push(v); }
    }
    out
}

/// `collect_distincto(x, g, out)`: like [collecto], deduplicated.
pub fn collect_distincto(x: Term, g: BoxGoal, out: Term) -> BoxGoal {
    subquery(g, x, out, |values, _| Term::list(dedup(values)))
}

/// `counto(x, g, out)`: `out` is bound to the number of `g`'s solutions.
pub fn counto(x: Term, g: BoxGoal, out: Term) -> BoxGoal {
    subquery(g, x, out, |values, _| Term::Int(values.len() as i64))
}

/// `count_distincto(x, g, out)`: counts distinct walked values of `x`.
pub fn count_distincto(x: Term, g: BoxGoal, out: Term) -> BoxGoal {
    subquery(g, x, out, |values, _| Term::Int(dedup(values).len() as i64))
}

/// `count_valueo(x, g, value, out)`: counts occurrences of `value` (walked
/// in the outer scope) among `g`'s solutions for `x`.
pub fn count_valueo(x: Term, g: BoxGoal, value: Term, out: Term) -> BoxGoal {
    subquery(g, x, out, move |values, outer| {
        let target = walk_deep(&value, outer);
        Term::Int(values.iter().filter(|v| **v == target).count() as i64)
    })
}

/// `uniqueo(t, g)`: deduplicates `g`'s solutions by the walked value of `t`.
pub fn uniqueo(t: Term, g: BoxGoal) -> BoxGoal {
    struct Uniqueo { t: Term, g: BoxGoal }
    impl Goal for Uniqueo {
        fn apply(&self, input: SStream) -> SStream {
            let t = self.t.clone();
            let g = Rc::clone(&self.g);
            input.flat_map(move |s| {
                let t = t.clone();
                let mut seen: Vec<Term> = Vec::new();
                let results: Vec<_> = match g.apply(SStream::of(s)).collect_results() {
                    Ok(v) => v,
                    Err(e) => return SStream::error(e),
                };
                let kept: Vec<_> = results
                    .into_iter()
                    .filter(|r| {
                        let key = walk_deep(&t, r);
                        if seen.contains(&key) { false } else { seen.push(key); true }
                    })
                    .collect();
                SStream::new(crate::stream::Cancel::new(), kept.into_iter().map(Ok))
            })
        }
    }
    Rc::new(Uniqueo { t, g })
}

/// Key used to group substitutions flowing through `group_by_*_streamo`.
fn group_key(key_term: &Term, s: &Substitution) -> Term {
    walk_deep(key_term, s)
}

/// `group_by_collecto(key, value, g, out_list)`: runs `g`, groups its
/// solutions by the walked `key`, and emits one outer solution per group
/// with `key` bound to the group key and `out_list` bound to the list of
/// that group's `value`s.
pub fn group_by_collecto(key: Term, value: Term, g: BoxGoal, out_list: Term) -> BoxGoal {
    struct GroupByCollecto { key: Term, value: Term, g: BoxGoal, out_list: Term }
    impl Goal for GroupByCollecto {
        fn apply(&self, input: SStream) -> SStream {
            let key = self.key.clone();
            let value = self.value.clone();
            let g = Rc::clone(&self.g);
            let out_list = self.out_list.clone();
            input.flat_map(move |outer| {
                let results = match g.apply(SStream::of(outer.clone())).collect_results() {
                    Ok(v) => v,
                    Err(e) => return SStream::error(e),
                };
                let mut order: Vec<Term> = Vec::new();
                let mut groups: HashMap<String, (Term, Vec<Term>)> = HashMap::new();
                for r in &results {
                    let k = group_key(&key, r);
                    let v = walk_deep(&value, r);
                    let dedup_key = k.to_string();
                    groups.entry(dedup_key.clone()).or_insert_with(|| {
                        order.push(k.clone());
                        (k.clone(), Vec::new())
                    }).1.push(v);
                }
                let mut outputs = Vec::new();
                for k in order {
                    let (kterm, values) = groups.get(&k.to_string()).unwrap().clone();
                    let s1 = match unify(&key, &kterm, &outer) { Some(s) => s, None => continue };
                    let s2 = match unify(&out_list, &Term::list(values), &s1) { Some(s) => s, None => continue };
                    outputs.push(Ok(s2));
                }
                SStream::new(crate::stream::Cancel::new(), outputs.into_iter())
            })
        }
    }
    Rc::new(GroupByCollecto { key, value, g, out_list })
}

/// `group_by_counto(key, g, out_count)`: like [group_by_collecto] but
/// binds the group's size rather than its value list.
pub fn group_by_counto(key: Term, value: Term, g: BoxGoal, out_count: Term) -> BoxGoal {
    let list_var = Term::var("_GroupByCountList");
    let grouped = group_by_collecto(key, value, g, list_var.clone());
    crate::goal::and(vec![
        grouped,
        crate::lists::lengtho(list_var, out_count),
    ])
}

/// `group_by_collect_streamo(key, value, out_list, drop)`: stream-level
/// counterpart to [group_by_collecto] -- groups the incoming stream
/// directly by the walked `key` instead of running an inner goal first.
/// `drop` controls whether a group's emitted solution keeps whatever else
/// was bound on the group's first member (`false`) or starts fresh with
/// only `key` and `out_list` bound (`true`).
pub fn group_by_collect_streamo(key: Term, value: Term, out_list: Term, drop: bool) -> BoxGoal {
    struct GroupByCollectStreamo { key: Term, value: Term, out_list: Term, drop: bool }
    impl Goal for GroupByCollectStreamo {
        fn apply(&self, input: SStream) -> SStream {
            let key = self.key.clone();
            let value = self.value.clone();
            let out_list = self.out_list.clone();
            let drop = self.drop;
            let items = match input.collect_results() {
                Ok(v) => v,
                Err(e) => return SStream::error(e),
            };
            let mut order: Vec<String> = Vec::new();
            let mut groups: HashMap<String, (Term, Substitution, Vec<Term>)> = HashMap::new();
            for s in items {
                let k = group_key(&key, &s);
                let v = walk_deep(&value, &s);
                let dedup_key = k.to_string();
                groups
                    .entry(dedup_key.clone())
                    .or_insert_with(|| { order.push(dedup_key); (k, s.clone(), Vec::new()) })
                    .2
                    .push(v);
            }
            let mut outputs = Vec::new();
            for dedup_key in order {
                let (kterm, rep, values) = groups.remove(&dedup_key).unwrap();
                let base = if drop { Substitution::empty() } else { rep };
                let s1 = match unify(&key, &kterm, &base) { Some(s) => s, None => continue };
                let s2 = match unify(&out_list, &Term::list(values), &s1) { Some(s) => s, None => continue };
                outputs.push(Ok(s2));
            }
            SStream::new(crate::stream::Cancel::new(), outputs.into_iter())
        }
    }
    Rc::new(GroupByCollectStreamo { key, value, out_list, drop })
}

/// `group_by_count_streamo(key, value, out_count, drop)`: stream-level
/// counterpart to [group_by_counto], built the same way on top of
/// [group_by_collect_streamo].
pub fn group_by_count_streamo(key: Term, value: Term, out_count: Term, drop: bool) -> BoxGoal {
    let list_var = Term::var("_GroupByCountStreamList");
    let grouped = group_by_collect_streamo(key, value, list_var.clone(), drop);
    crate::goal::and(vec![
        grouped,
        crate::lists::lengtho(list_var, out_count),
    ])
}

/// A custom comparator over walked `Term`s.
pub type TermCmpFn = Rc<dyn Fn(&Term, &Term) -> CmpOrdering>;

/// Whether `sort_by_streamo` sorts ascending, descending, or by a custom
/// comparator over walked `Term`s.
pub enum SortOrder {
    Asc,
    Desc,
    By(TermCmpFn),
}

fn term_cmp(a: &Term, b: &Term) -> CmpOrdering {
    match (a, b) {
        (Term::Int(x), Term::Int(y)) => x.cmp(y),
        (Term::Float(x), Term::Float(y)) => x.partial_cmp(y).unwrap_or(CmpOrdering::Equal),
        (Term::Int(x), Term::Float(y)) => (*x as f64).partial_cmp(y).unwrap_or(CmpOrdering::Equal),
        (Term::Float(x), Term::Int(y)) => x.partial_cmp(&(*y as f64)).unwrap_or(CmpOrdering::Equal),
        (Term::Str(x), Term::Str(y)) => x.cmp(y),
        (Term::Bool(x), Term::Bool(y)) => x.cmp(y),
        _ => a.to_string().cmp(&b.to_string()),
    }
}

/// `sort_by_streamo(x, order)`: buffers the incoming stream, sorts by the
/// walked value of `x`, then re-emits. A stream-level operator: it has no
/// inner goal, unlike [Subquery]-derived aggregators.
pub fn sort_by_streamo(x: Term, order: SortOrder) -> BoxGoal {
    struct SortByStreamo { x: Term, order: SortOrder }
    impl Goal for SortByStreamo {
        fn apply(&self, input: SStream) -> SStream {
            let x = self.x.clone();
            let items = match input.collect_results() {
                Ok(v) => v,
                Err(e) => return SStream::error(e),
            };
            let mut keyed: Vec<(Term, Substitution)> =
                items.into_iter().map(|s| (walk_deep(&x, &s), s)).collect();
            match &self.order {
                SortOrder::Asc => keyed.sort_by(|a, b| term_cmp(&a.0, &b.0)),
                SortOrder::Desc => keyed.sort_by(|a, b| term_cmp(&b.0, &a.0)),
                SortOrder::By(cmp) => keyed.sort_by(|a, b| cmp(&a.0, &b.0)),
            }
            SStream::new(
                crate::stream::Cancel::new(),
                keyed.into_iter().map(|(_, s)| Ok(s)),
            )
        }
    }
    Rc::new(SortByStreamo { x, order })
}

/// `take_streamo(n)`: passes the first `n` substitutions of the incoming
/// stream and cancels upstream production.
pub fn take_streamo(n: usize) -> BoxGoal {
    struct TakeStreamo(usize);
    impl Goal for TakeStreamo {
        fn apply(&self, input: SStream) -> SStream {
            input.take(self.0)
        }
    }
    Rc::new(TakeStreamo(n))
}

/// Arithmetic helper used by `lengtho`: unifies `out` with `in_ + 1` when
/// `in_` walks to a ground integer.
pub fn plus_one(in_: Term, out: Term) -> BoxGoal {
    struct PlusOne { in_: Term, out: Term }
    impl Goal for PlusOne {
        fn apply(&self, input: SStream) -> SStream {
            let in_ = self.in_.clone();
            let out = self.out.clone();
            input.flat_map(move |s| {
                match walk(&in_, &s) {
                    Term::Int(n) => match unify(&out, &Term::Int(n + 1), &s) {
                        Some(s2) => SStream::of(s2),
                        None => SStream::empty(),
                    },
                    _ => SStream::empty(),
                }
            })
        }
    }
    Rc::new(PlusOne { in_, out })
}

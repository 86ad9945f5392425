//! In-memory indexed fact relation.
//!
//! Facts are indexed by predicate name (functor + arity) before a linear
//! scan of the matching bucket, then one level deeper: each ground
//! *argument position* gets its own value -> fact-index map, so a query
//! with any ground argument can narrow the candidate set before
//! unification is attempted at all.
// krelation 2024

use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use crate::goal::{BoxGoal, Goal};
use crate::stream::SStream;
use crate::subst::walk;
use crate::term::Term;
use crate::unify::unify;

fn index_key(t: &Term) -> Option<String> {
    match t {
        Term::Int(n) => Some(format!("i{n}")),
        Term::Float(n) => Some(format!("f{n}")),
        Term::Str(s) => Some(format!("s{s}")),
        Term::Bool(b) => Some(format!("b{b}")),
        Term::Null => Some("n".to_string()),
        _ => None,
    }
}

/// A tuple relation held entirely in memory, optionally indexed per
/// position, optionally symmetric.
pub struct MemoryRelation {
    arity: usize,
    facts: Vec<Vec<Term>>,
    indices: Vec<HashMap<String, HashSet<usize>>>,
    symmetric: bool,
}

impl MemoryRelation {
    pub fn new(arity: usize) -> MemoryRelation {
        MemoryRelation {
            arity,
            facts: Vec::new(),
            indices: (0..arity).map(|_| HashMap::new()).collect(),
            symmetric: false,
        }
    }

    /// A two-argument relation where `set(a, b)` also stores `(b, a)`.
    pub fn symmetric() -> MemoryRelation {
        let mut r = MemoryRelation::new(2);
        r.symmetric = true;
        r
    }

    fn insert_one(&mut self, terms: Vec<Term>) {
        assert_eq!(terms.len(), self.arity, "memory.rs - fact arity mismatch");
        let idx = self.facts.len();
        for (pos, term) in terms.iter().enumerate() {
            if let Some(key) = index_key(term) {
                self.indices[pos].entry(key).or_default().insert(idx);
            }
        }
        self.facts.push(terms);
    }

    pub fn set(&mut self, terms: Vec<Term>) {
        if self.symmetric {
            assert_eq!(terms.len(), 2, "memory.rs - symmetric relations are binary");
            self.insert_one(vec![terms[0].clone(), terms[1].clone()]);
            self.insert_one(vec![terms[1].clone(), terms[0].clone()]);
        } else {
            self.insert_one(terms);
        }
    }

    fn candidates(&self, query: &[Term], s: &crate::subst::Substitution) -> Box<dyn Iterator<Item = usize> + '_> {
        let mut narrowed: Option<HashSet<usize>> = None;
        for (pos, term) in query.iter().enumerate() {
            let walked = walk(term, s);
            if let Some(key) = index_key(&walked) {
                if let Some(set) = self.indices[pos].get(&key) {
                    narrowed = Some(match narrowed {
                        None => set.clone(),
                        Some(prev) => prev.intersection(set).copied().collect(),
                    });
                } else {
                    // indexed position but no matching value: no candidates.
                    narrowed = Some(HashSet::new());
                }
            }
        }
        match narrowed {
            Some(set) => {
                let mut v: Vec<usize> = set.into_iter().collect();
                v.sort_unstable();
                Box::new(v.into_iter())
            }
            None => Box::new(0..self.facts.len()),
        }
    }

    /// Turns this relation into a goal over `query` (one term per column).
    pub fn as_goal(self: &Rc<Self>, query: Vec<Term>) -> BoxGoal {
        struct AsGoal {
            relation: Rc<MemoryRelation>,
            query: Vec<Term>,
        }
        impl Goal for AsGoal {
            fn apply(&self, input: SStream) -> SStream {
                let relation = Rc::clone(&self.relation);
                let query = self.query.clone();
                input.flat_map(move |s| {
                    let candidates: Vec<usize> = relation.candidates(&query, &s).collect();
                    let results: Vec<_> = candidates
                        .into_iter()
                        .filter_map(|i| {
                            let fact = &relation.facts[i];
                            let mut cur = s.clone();
                            for (q, f) in query.iter().zip(fact.iter()) {
                                cur = unify(q, f, &cur)?;
                            }
                            Some(Ok(cur))
                        })
                        .collect();
                    SStream::new(crate::stream::Cancel::new(), results.into_iter())
                })
            }
        }
        Rc::new(AsGoal { relation: Rc::clone(self), query })
    }
}

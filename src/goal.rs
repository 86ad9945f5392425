//! The goal algebra: `eq`, `fresh`, `and`/`or`/`conde`, `not`, `ifte`, and
//! group-metadata enrichment.
//!
//! A [Goal] is a pure value: a function from an input stream of
//! substitutions to an output stream. Goals are reusable and may be
//! applied to multiple input streams; conjunction is sequential
//! composition by splitting the goal list into a head and a tail and
//! threading one goal's output stream into the next goal's input.
// krelation 2024

use std::collections::HashSet;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::registry::GoalHandle;
use crate::stream::{Item, SStream};
use crate::subst::{GroupFrame, GroupKind, Meta, Substitution};
use crate::term::Term;
use crate::unify::unify;

static NEXT_GROUP_ID: AtomicU64 = AtomicU64::new(1);

pub trait Goal {
    fn apply(&self, input: SStream) -> SStream;

    /// `Some` only for goals the SQL fact relation needs to discover as
    /// peers (see `facts::sql`); everything else is invisible to group
    /// metadata.
    fn goal_handle(&self) -> Option<GoalHandle> {
        None
    }

    /// Recursively collects the handles of this goal and (for `and`/`or`)
    /// everything nested inside it.
    fn collect_handles(&self, out: &mut HashSet<GoalHandle>) {
        if let Some(h) = self.goal_handle() {
            out.insert(h);
        }
    }
}

pub type BoxGoal = Rc<dyn Goal>;

/// `eq(u, v)`: unifies on each input substitution, emitting the extended
/// substitution when it succeeds. Error-free.
pub struct Eq {
    u: Term,
    v: Term,
}

pub fn eq(u: Term, v: Term) -> BoxGoal {
    Rc::new(Eq { u, v })
}

impl Goal for Eq {
    fn apply(&self, input: SStream) -> SStream {
        let u = self.u.clone();
        let v = self.v.clone();
        input.flat_map(move |s| match unify(&u, &v, &s) {
            Some(s2) => SStream::of(s2),
            None => SStream::empty(),
        })
    }
}

/// `fresh(f)`: allocates `arity` fresh variables, calls `f` with them to
/// build the inner goal, then runs that goal on the input stream.
pub fn fresh(arity: usize, f: impl Fn(Vec<Term>) -> BoxGoal + 'static) -> BoxGoal {
    struct Fresh<F> {
        arity: usize,
        f: F,
    }
    impl<F: Fn(Vec<Term>) -> BoxGoal> Goal for Fresh<F> {
        fn apply(&self, input: SStream) -> SStream {
            let vars: Vec<Term> = (0..self.arity).map(|i| Term::var(&format!("_f{i}"))).collect();
            let goal = (self.f)(vars);
            goal.apply(input)
        }
    }
    Rc::new(Fresh { arity, f })
}

/// Enters a new conjunction/disjunction group, unioning `local_all` (the
/// handles visible at this nesting level) into whatever `s.meta.all_goals`
/// already held from an enclosing scope. Without the union, a nested
/// combinator (e.g. `membero`'s `conde`, which desugars to `or`) would
/// overwrite the whole-scope sibling set with its own, much smaller one as
/// the stream passes through it, and any SQL goal downstream of it in the
/// same outer conjunction would lose visibility of SQL goals upstream --
/// peer discovery needs siblings to include transitively inner goals of
/// nested and/or, not just the immediately enclosing one.
fn enter_group(s: &Substitution, kind: GroupKind, id: u64, branch: Option<usize>,
               conj_goals: &Rc<HashSet<GoalHandle>>, local_all: &Rc<HashSet<GoalHandle>>) -> Substitution {
    let mut path = (*s.meta.group_path).clone();
    path.push(GroupFrame { kind, id, branch });
    let all_goals = if s.meta.all_goals.is_empty() {
        Rc::clone(local_all)
    } else {
        let mut union = (*s.meta.all_goals).clone();
        union.extend(local_all.iter().cloned());
        Rc::new(union)
    };
    let meta = Meta {
        group_id: Some(id),
        group_path: Rc::new(path),
        conj_goals: Rc::clone(conj_goals),
        all_goals,
        suspended: Rc::clone(&s.meta.suspended),
        row_cache: Rc::clone(&s.meta.row_cache),
    };
    s.with_meta(meta)
}

/// Left-associative conjunction: each input is fed to `g1`; every
/// emission of `g_i` becomes an input to `g_{i+1}`.
pub struct And {
    goals: Vec<BoxGoal>,
}

impl Goal for And {
    fn apply(&self, input: SStream) -> SStream {
        if self.goals.is_empty() { return input; }

        let id = NEXT_GROUP_ID.fetch_add(1, Ordering::Relaxed);
        let mut conj_goals = HashSet::new();
        for g in &self.goals { g.collect_handles(&mut conj_goals); }
        let conj_goals = Rc::new(conj_goals);
        // In a single `and`, the conjunction's siblings are the whole
        // enclosing scope at this nesting level.
        let all = Rc::new((*conj_goals).clone());

        let conj_goals_enter = Rc::clone(&conj_goals);
        let all_enter = Rc::clone(&all);
        let entered = input.flat_map(move |s| {
            let s2 = enter_group(&s, GroupKind::Conj, id, None, &conj_goals_enter, &all_enter);
            SStream::of(s2)
        });

        self.goals.iter().fold(entered, |stream, g| g.apply(stream))
    }

    fn collect_handles(&self, out: &mut HashSet<GoalHandle>) {
        for g in &self.goals { g.collect_handles(out); }
    }
}

pub fn and(goals: Vec<BoxGoal>) -> BoxGoal {
    Rc::new(And { goals })
}

/// Disjunction: each input is fed to every branch; outputs are
/// concatenated branch by branch. The relative order of solutions across
/// branches is not otherwise constrained, so concatenation is a simple,
/// deterministic choice that keeps tests reproducible.
pub struct Or {
    goals: Vec<BoxGoal>,
}

impl Goal for Or {
    fn apply(&self, input: SStream) -> SStream {
        if self.goals.is_empty() { return SStream::empty(); }

        let id = NEXT_GROUP_ID.fetch_add(1, Ordering::Relaxed);
        let mut all_goals = HashSet::new();
        for g in &self.goals { g.collect_handles(&mut all_goals); }
        let all_goals = Rc::new(all_goals);

        // `or` must feed every input to every branch, so the input stream
        // is drained up front (each input is typically a single outer
        // substitution; this is not suitable for unbounded upstream
        // producers, which this engine does not otherwise create).
        let inputs: Vec<Substitution> = match input.collect_results() {
            Ok(v) => v,
            Err(e) => return SStream::error(e),
        };
        if inputs.is_empty() {
            // Every branch would apply to zero substitutions and produce
            // zero results; returning early here is what keeps a
            // self-recursive goal (e.g. `appendo`'s tail call) from
            // eagerly rebuilding and re-entering itself without bound
            // once the stream that reaches it is genuinely empty.
            return SStream::empty();
        }
        let cancel = crate::stream::Cancel::new();

        let mut result = SStream::with_cancel(cancel.clone(), std::iter::empty());
        for (branch, g) in self.goals.iter().enumerate() {
            let conj_goals = {
                let mut hs = HashSet::new();
                g.collect_handles(&mut hs);
                Rc::new(hs)
            };
            let all = Rc::clone(&all_goals);
            let branch_inputs = inputs.clone();
            let branch_stream = SStream::new(cancel.clone(), branch_inputs.into_iter().map(Ok)).flat_map(move |s| {
                let s2 = enter_group(&s, GroupKind::Disj, id, Some(branch), &conj_goals, &all);
                SStream::of(s2)
            });
            let branch_out = g.apply(branch_stream);
            result = result.chain(branch_out);
        }
        result
    }

    fn collect_handles(&self, out: &mut HashSet<GoalHandle>) {
        for g in &self.goals { g.collect_handles(out); }
    }
}

pub fn or(goals: Vec<BoxGoal>) -> BoxGoal {
    Rc::new(Or { goals })
}

/// `conde(c1, ..., cm)`: shorthand for `or(and(c1...), ..., and(cm...))`.
pub fn conde(clauses: Vec<Vec<BoxGoal>>) -> BoxGoal {
    or(clauses.into_iter().map(and).collect())
}

/// Soft-cut: runs `g1`; if it yields at least one solution, emits those
/// only. Otherwise runs `g2` on the same input. Must not run `g2` if any
/// `g1` solution exists, so `g1` is fully drained up front per input.
pub struct Ifte {
    g1: BoxGoal,
    g2: BoxGoal,
}

impl Goal for Ifte {
    fn apply(&self, input: SStream) -> SStream {
        let g1 = Rc::clone(&self.g1);
        let g2 = Rc::clone(&self.g2);
        input.flat_map(move |s| {
            let first_results: Vec<Item> = g1.apply(SStream::of(s.clone())).collect();
            if first_results.is_empty() {
                g2.apply(SStream::of(s))
            } else {
                SStream::new(crate::stream::Cancel::new(), first_results.into_iter())
            }
        })
    }
}

pub fn ifte(g1: BoxGoal, g2: BoxGoal) -> BoxGoal {
    Rc::new(Ifte { g1, g2 })
}

/// `not(g)`: for each input, runs `g`; emits the original input exactly
/// when `g` produces no solutions for it. Any solution to `g`, however it
/// binds, refutes the negation.
pub struct Not {
    g: BoxGoal,
}

impl Goal for Not {
    fn apply(&self, input: SStream) -> SStream {
        let g = Rc::clone(&self.g);
        input.flat_map(move |s| {
            let any = g.apply(SStream::of(s.clone())).next().is_some();
            if any { SStream::empty() } else { SStream::of(s) }
        })
    }
}

pub fn not(g: BoxGoal) -> BoxGoal {
    Rc::new(Not { g })
}

/// `onceo(g)`: at most one solution per input.
pub fn onceo(g: BoxGoal) -> BoxGoal {
    struct Onceo(BoxGoal);
    impl Goal for Onceo {
        fn apply(&self, input: SStream) -> SStream {
            let g = Rc::clone(&self.0);
            input.flat_map(move |s| g.apply(SStream::of(s)).take(1))
        }
    }
    Rc::new(Onceo(g))
}

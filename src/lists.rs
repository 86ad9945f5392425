//! Logic list relations built on `cons`/`nil`.
//!
//! Recursive list relations (`appendo`, `membero`, `lengtho`, ...) are
//! defined as ordinary goals rather than special-cased natives, the same
//! way the list representation itself composes `cons`/`nil`.
// krelation 2024

use std::rc::Rc;

use crate::goal::{and, conde, eq, fresh, BoxGoal, Goal};
use crate::stream::SStream;
use crate::subst::walk;
use crate::term::Term;
use crate::unify::unify;

/// `membero(x, list)`: `x` unifies with some element of `list`.
pub fn membero(x: Term, list: Term) -> BoxGoal {
    fresh(2, move |vars| {
        let (head, tail) = (vars[0].clone(), vars[1].clone());
        conde(vec![
            vec![eq(list.clone(), Term::cons(x.clone(), tail.clone()))],
            vec![
                eq(list.clone(), Term::cons(head.clone(), tail.clone())),
                membero(x.clone(), tail),
            ],
        ])
    })
}

/// `appendo(a, b, ab)`: `ab` is the concatenation of lists `a` and `b`.
pub fn appendo(a: Term, b: Term, ab: Term) -> BoxGoal {
    fresh(3, move |vars| {
        let (head, ta, tab) = (vars[0].clone(), vars[1].clone(), vars[2].clone());
        conde(vec![
            vec![eq(a.clone(), Term::nil()), eq(b.clone(), ab.clone())],
            vec![
                eq(a.clone(), Term::cons(head.clone(), ta.clone())),
                eq(ab.clone(), Term::cons(head, tab.clone())),
                appendo(ta, b.clone(), tab),
            ],
        ])
    })
}

/// `lengtho(list, n)`: `n` unifies with the length of `list`.
pub fn lengtho(list: Term, n: Term) -> BoxGoal {
    fresh(2, move |vars| {
        let (head, tail) = (vars[0].clone(), vars[1].clone());
        let list2 = list.clone();
        let n2 = n.clone();
        conde(vec![
            vec![eq(list2.clone(), Term::nil()), eq(n2.clone(), Term::Int(0))],
            vec![
                eq(list2.clone(), Term::cons(head, tail.clone())),
                fresh(1, {
                    let tail = tail.clone();
                    let n3 = n2.clone();
                    move |vars3| {
                        let m = vars3[0].clone();
                        and(vec![
                            lengtho(tail.clone(), m.clone()),
                            crate::aggregate::plus_one(m, n3.clone()),
                        ])
                    }
                }),
            ],
        ])
    })
}

/// `reverseo(list, reversed)`: `reversed` is `list` in reverse order.
pub fn reverseo(list: Term, reversed: Term) -> BoxGoal {
    fresh(3, move |vars| {
        let (head, tail, rest_rev) = (vars[0].clone(), vars[1].clone(), vars[2].clone());
        conde(vec![
            vec![eq(list.clone(), Term::nil()), eq(reversed.clone(), Term::nil())],
            vec![
                eq(list.clone(), Term::cons(head.clone(), tail.clone())),
                reverseo(tail, rest_rev.clone()),
                appendo(rest_rev, Term::list(vec![head]), reversed.clone()),
            ],
        ])
    })
}

/// Unifies `m` with `n - 1` when `n` walks to a positive ground integer.
/// Used by `ntho` to count down a bound index; unlike `plus_one`, the
/// index here is always the known side, so there is no forward variant to
/// share with it.
fn minus_one(n: Term, m: Term) -> BoxGoal {
    struct MinusOne { n: Term, m: Term }
    impl Goal for MinusOne {
        fn apply(&self, input: SStream) -> SStream {
            let n = self.n.clone();
            let m = self.m.clone();
            input.flat_map(move |s| {
                match walk(&n, &s) {
                    Term::Int(v) if v > 0 => match unify(&m, &Term::Int(v - 1), &s) {
                        Some(s2) => SStream::of(s2),
                        None => SStream::empty(),
                    },
                    _ => SStream::empty(),
                }
            })
        }
    }
    Rc::new(MinusOne { n, m })
}

/// `ntho(n, list, x)`: `x` is the `n`th (0-indexed) element of `list`. `n`
/// must be bound -- counting down an unbound index would never terminate.
pub fn ntho(n: Term, list: Term, x: Term) -> BoxGoal {
    fresh(2, move |vars| {
        let (head, tail) = (vars[0].clone(), vars[1].clone());
        conde(vec![
            vec![
                eq(n.clone(), Term::Int(0)),
                eq(list.clone(), Term::cons(x.clone(), tail.clone())),
            ],
            vec![
                eq(list.clone(), Term::cons(head, tail.clone())),
                fresh(1, {
                    let (n, x, tail) = (n.clone(), x.clone(), tail.clone());
                    move |vars2| {
                        let m = vars2[0].clone();
                        and(vec![
                            minus_one(n.clone(), m.clone()),
                            ntho(m, tail.clone(), x.clone()),
                        ])
                    }
                }),
            ],
        ])
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::stream::SStream;
    use crate::subst::{walk, Substitution};
    use crate::term::Var;

    fn run(g: &BoxGoal) -> Vec<Substitution> {
        g.apply(SStream::of(Substitution::empty())).collect_results().unwrap()
    }

    #[test]
    fn membero_finds_every_element() {
        let x = Term::Var(Var::named("X"));
        let list = Term::list(vec![Term::Int(1), Term::Int(2), Term::Int(3)]);
        let out = run(&membero(x.clone(), list));
        let mut values: Vec<Term> = out.iter().map(|s| walk(&x, s)).collect();
        values.sort_by_key(|t| match t { Term::Int(n) => *n, _ => 0 });
        assert_eq!(values, vec![Term::Int(1), Term::Int(2), Term::Int(3)]);
    }

    #[test]
    fn appendo_concatenates() {
        let ab = Term::Var(Var::named("AB"));
        let a = Term::list(vec![Term::Int(1), Term::Int(2)]);
        let b = Term::list(vec![Term::Int(3)]);
        let out = run(&appendo(a, b, ab.clone()));
        assert_eq!(out.len(), 1);
        let result = crate::subst::walk_deep(&ab, &out[0]);
        assert_eq!(
            result.list_to_vec(),
            Some(vec![Term::Int(1), Term::Int(2), Term::Int(3)])
        );
    }

    #[test]
    fn lengtho_counts_elements() {
        let n = Term::Var(Var::named("N"));
        let list = Term::list(vec![Term::Int(1), Term::Int(2), Term::Int(3)]);
        let out = run(&lengtho(list, n.clone()));
        assert_eq!(out.len(), 1);
        assert_eq!(walk(&n, &out[0]), Term::Int(3));
    }

    #[test]
    fn reverseo_reverses_a_list() {
        let r = Term::Var(Var::named("R"));
        let list = Term::list(vec![Term::Int(1), Term::Int(2), Term::Int(3)]);
        let out = run(&reverseo(list, r.clone()));
        assert_eq!(out.len(), 1);
        let result = crate::subst::walk_deep(&r, &out[0]);
        assert_eq!(result.list_to_vec(), Some(vec![Term::Int(3), Term::Int(2), Term::Int(1)]));
    }

    #[test]
    fn reverseo_is_its_own_inverse() {
        let list = Term::list(vec![Term::Int(1), Term::Int(2), Term::Int(3)]);
        let fwd = Term::Var(Var::named("Fwd"));
        let out = run(&reverseo(list.clone(), fwd.clone()));
        let back = Term::Var(Var::named("Back"));
        let out2 = run(&reverseo(crate::subst::walk_deep(&fwd, &out[0]), back.clone()));
        assert_eq!(crate::subst::walk_deep(&back, &out2[0]).list_to_vec(), list.list_to_vec());
    }

    #[test]
    fn ntho_finds_the_element_at_an_index() {
        let x = Term::Var(Var::named("X"));
        let list = Term::list(vec![Term::atom("a"), Term::atom("b"), Term::atom("c")]);
        let out = run(&ntho(Term::Int(1), list, x.clone()));
        assert_eq!(out.len(), 1);
        assert_eq!(walk(&x, &out[0]), Term::atom("b"));
    }

    #[test]
    fn ntho_fails_past_the_end_of_the_list() {
        let x = Term::Var(Var::named("X"));
        let list = Term::list(vec![Term::atom("a")]);
        let out = run(&ntho(Term::Int(5), list, x));
        assert!(out.is_empty());
    }
}

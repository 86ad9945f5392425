//! `SStream`: a cold, cancellable, single-producer stream of substitutions.
//!
//! Realized as a pull iterator rather than a push-based reactive
//! observable, walking a backtracking search one answer at a time; the
//! single-threaded cooperative scheduling model this engine uses does
//! not need an async runtime.
//! Cold: a `Goal` is a plain function from stream to stream, so invoking it
//! again on a fresh input produces a fresh iterator chain -- nothing is
//! memoized. Cancellable: every stream produced from the same root shares
//! one `Cancel` flag; setting it stops the whole chain at the next `next()`
//! call, including abandoning in-flight SQL batches (see `facts::sql`).
// krelation 2024

use std::cell::Cell;
use std::rc::Rc;

use crate::error::EngineError;
use crate::subst::Substitution;

/// A shared cancellation flag. Cloning shares the same underlying cell, so
/// cancelling any clone cancels every stream derived from the same root.
#[derive(Clone, Default)]
pub struct Cancel(Rc<Cell<bool>>);

impl Cancel {
    pub fn new() -> Cancel {
        Cancel(Rc::new(Cell::new(false)))
    }

    pub fn cancel(&self) {
        self.0.set(true);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.get()
    }
}

pub type Item = Result<Substitution, EngineError>;

/// A cold stream of substitutions.
pub struct SStream {
    inner: Box<dyn Iterator<Item = Item>>,
    pub cancel: Cancel,
}

impl Iterator for SStream {
    type Item = Item;

    fn next(&mut self) -> Option<Item> {
        if self.cancel.is_cancelled() { return None; }
        self.inner.next()
    }
}

impl SStream {
    pub fn new(cancel: Cancel, inner: impl Iterator<Item = Item> + 'static) -> SStream {
        SStream { inner: Box::new(inner), cancel }
    }

    /// A stream carrying exactly one substitution.
    pub fn of(s: Substitution) -> SStream {
        SStream::new(Cancel::new(), std::iter::once(Ok(s)))
    }

    pub fn empty() -> SStream {
        SStream::new(Cancel::new(), std::iter::empty())
    }

    pub fn error(e: EngineError) -> SStream {
        SStream::new(Cancel::new(), std::iter::once(Err(e)))
    }

    /// Keeps the stream's existing cancellation flag (used when a
    /// combinator wraps an already-constructed stream).
    pub fn with_cancel(cancel: Cancel, inner: impl Iterator<Item = Item> + 'static) -> SStream {
        SStream::new(cancel, inner)
    }

    pub fn map(self, f: impl Fn(Substitution) -> Substitution + 'static) -> SStream {
        let cancel = self.cancel.clone();
        SStream::with_cancel(cancel, self.map_ok(f))
    }

    fn map_ok(self, f: impl Fn(Substitution) -> Substitution + 'static) -> impl Iterator<Item = Item> {
        self.inner.map(move |item| item.map(&f))
    }

    /// Feeds every item through `f`, which itself produces a stream;
    /// concatenates the results in order. This is how `and` sequences
    /// goals: cancelling the outer stream also cancels whichever inner
    /// stream is currently producing, because the same `Cancel` flows
    /// through.
    pub fn flat_map(self, f: impl Fn(Substitution) -> SStream + 'static) -> SStream {
        let outer_cancel = self.cancel.clone();
        let cancel_for_loop = outer_cancel.clone();
        let cancel_for_child = outer_cancel.clone();
        let mut outer = self.inner;
        let mut current: Option<SStream> = None;

        let iter = std::iter::from_fn(move || loop {
            if cancel_for_loop.is_cancelled() { return None; }
            if let Some(stream) = current.as_mut() {
                match stream.next() {
                    Some(item) => return Some(item),
                    None => { current = None; }
                }
            }
            match outer.next() {
                None => return None,
                Some(Err(e)) => return Some(Err(e)),
                Some(Ok(s)) => {
                    let mut next_stream = f(s);
                    next_stream.cancel = cancel_for_child.clone();
                    current = Some(next_stream);
                }
            }
        });

        SStream::with_cancel(outer_cancel, iter)
    }

    pub fn take(self, n: usize) -> SStream {
        let cancel = self.cancel.clone();
        let cancel_for_drop = cancel.clone();
        let mut taken = 0usize;
        let iter = self.inner.take_while(move |_| {
            if taken >= n { cancel_for_drop.cancel(); return false; }
            taken += 1;
            true
        });
        SStream::with_cancel(cancel, iter)
    }

    pub fn chain(self, other: SStream) -> SStream {
        let cancel = self.cancel.clone();
        SStream::with_cancel(cancel, self.inner.chain(other.inner))
    }

    pub fn collect_results(self) -> Result<Vec<Substitution>, EngineError> {
        self.collect()
    }
}

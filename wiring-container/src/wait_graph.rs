//! Cross-thread wait-for graph.
//!
//! A thread that finds a binding under construction on another thread
//! blocks until it is done. When that other thread is itself blocked, on a
//! binding this thread is constructing, neither would ever wake up. Every
//! construction slot and every wait is recorded here, so the thread about
//! to close such a loop sees it and reports a cycle instead of blocking.
//!
//! Lock order: a binding's slot lock, then this graph's lock, never the
//! other way round.

use std::collections::HashMap;
use std::thread::ThreadId;

use once_cell::sync::Lazy;
use parking_lot::Mutex;

use crate::key::TypeKey;

/// Address of a binding's shared state.
pub(crate) type BindingId = usize;

#[derive(Debug, Default)]
pub(crate) struct WaitGraph {
    /// Binding under construction -> constructing thread.
    owners: HashMap<BindingId, ThreadId>,
    /// Blocked thread -> binding it waits for, with the binding's type.
    waits: HashMap<ThreadId, (BindingId, TypeKey)>,
}

static GRAPH: Lazy<Mutex<WaitGraph>> = Lazy::new(|| Mutex::new(WaitGraph::default()));

/// Runs `f` on the process-wide graph.
pub(crate) fn with_graph<R>(f: impl FnOnce(&mut WaitGraph) -> R) -> R {
    f(&mut GRAPH.lock())
}

impl WaitGraph {
    pub fn claim(&mut self, binding: BindingId, thread: ThreadId) {
        self.owners.insert(binding, thread);
    }

    pub fn release(&mut self, binding: BindingId) {
        self.owners.remove(&binding);
    }

    /// Records that `thread` is about to wait for `binding`, unless that
    /// would close a loop back to `thread`.
    ///
    /// Returns the type of the binding `thread` itself holds that the loop
    /// comes back to.
    pub fn try_wait(&mut self, thread: ThreadId, binding: BindingId, ty: TypeKey) -> Result<(), TypeKey> {
        if let Some(closing) = self.loop_back(thread, binding, ty) {
            return Err(closing);
        }
        self.waits.insert(thread, (binding, ty));
        Ok(())
    }

    pub fn done_waiting(&mut self, thread: ThreadId) {
        self.waits.remove(&thread);
    }

    fn loop_back(&self, thread: ThreadId, binding: BindingId, ty: TypeKey) -> Option<TypeKey> {
        let (mut current, mut closing) = (binding, ty);
        for _ in 0..=self.waits.len() {
            let owner = *self.owners.get(&current)?;
            if owner == thread {
                return Some(closing);
            }
            (current, closing) = *self.waits.get(&owner)?;
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    struct A;
    struct B;

    fn other_thread() -> ThreadId {
        thread::spawn(|| thread::current().id()).join().unwrap()
    }

    #[test]
    fn waiting_on_an_idle_owner_is_fine() {
        let me = thread::current().id();
        let other = other_thread();
        let mut graph = WaitGraph::default();
        graph.claim(1, other);

        assert!(graph.try_wait(me, 1, TypeKey::of::<A>()).is_ok());
        graph.done_waiting(me);
        assert!(graph.waits.is_empty());
    }

    #[test]
    fn two_threads_waiting_on_each_other_is_a_loop() {
        let me = thread::current().id();
        let other = other_thread();
        let mut graph = WaitGraph::default();
        graph.claim(1, me);
        graph.claim(2, other);
        graph.try_wait(other, 1, TypeKey::of::<A>()).unwrap();

        assert_eq!(graph.try_wait(me, 2, TypeKey::of::<B>()), Err(TypeKey::of::<A>()));
        assert!(!graph.waits.contains_key(&me));
    }

    #[test]
    fn released_bindings_break_the_chain() {
        let me = thread::current().id();
        let other = other_thread();
        let mut graph = WaitGraph::default();
        graph.claim(1, me);
        graph.claim(2, other);
        graph.try_wait(other, 1, TypeKey::of::<A>()).unwrap();
        graph.release(1);

        assert!(graph.try_wait(me, 2, TypeKey::of::<B>()).is_ok());
    }
}

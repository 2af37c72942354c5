//! Concurrent execution of actions under named-resource exclusion.
//!
//! Every action declares the resource labels it needs. An [`ActionList`]
//! starts each queued action whose resources are all free and lets everything
//! else run in parallel. Two actions sharing a label never run at the same
//! time; actions sharing nothing may overlap freely.
//!
//! Admission and completion bookkeeping only happen on the thread that owns the
//! list. Actions signal completion through a [`Completer`], which may be fired
//! from any thread and is delivered to the owner through the [`EventLoop`].

pub mod command;
pub mod event_loop;

pub use event_loop::{ActionId, ChannelEventLoop, Completer, EventLoop};

use crate::backup::function_path;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::AddFunctionName;
use function_name::named;
use std::collections::HashSet;
use std::sync::Arc;

/// Opaque exclusivity label, compared by string equality
pub type Resource = Arc<str>;

/// A unit of work that may run concurrently with others
pub trait Action {
    /// Labels that must not be held by any other running action while this
    /// one runs. An empty set never conflicts.
    fn resources(&self) -> Vec<Resource> {
        Vec::new()
    }

    /// Starts the work. The action must eventually fire `completer` exactly
    /// once, either before returning or from another thread.
    fn go(&mut self, completer: Completer) -> Result<()>;

    /// Called on the owning thread after the action has left the list and its
    /// resources have been released. Follow-up actions may be added here.
    fn done(&mut self, _actions: &mut ActionList) -> Result<()> {
        Ok(())
    }
}

struct Entry {
    id: ActionId,
    action: Box<dyn Action>,
    resources: HashSet<Resource>,
    running: bool,
}

/// A collection of actions that are executed concurrently
pub struct ActionList {
    event_loop: Box<dyn EventLoop>,
    actions: Vec<Entry>,
    resources: HashSet<Resource>,
    next_id: u64,
}

impl Default for ActionList {
    fn default() -> Self {
        Self::new(ChannelEventLoop::new())
    }
}

impl ActionList {
    pub fn new<E: EventLoop + 'static>(event_loop: E) -> Self {
        Self {
            event_loop: Box::new(event_loop),
            actions: Vec::new(),
            resources: HashSet::new(),
            next_id: 0,
        }
    }

    /// Queues an action. Nothing starts until [`ActionList::run`].
    pub fn add<A: Action + 'static>(&mut self, action: A) -> ActionId {
        self.add_boxed(Box::new(action))
    }

    pub fn add_boxed(&mut self, action: Box<dyn Action>) -> ActionId {
        let id = ActionId::new(self.next_id);
        self.next_id += 1;
        let resources = action.resources().into_iter().collect();
        tracing::debug!("Queued action {id} using {:?}", resources);
        self.actions.push(Entry {
            id,
            action,
            resources,
            running: false,
        });
        id
    }

    /// Runs until every queued action, including any added by completion
    /// hooks, has completed.
    ///
    /// An action that never signals completion stalls this call forever.
    #[named]
    pub fn run(&mut self) -> Result<()> {
        loop {
            self.trigger().add_fn_name(function_path!())?;
            if self.actions.is_empty() {
                return Ok(());
            }
            for id in self.event_loop.wait().add_fn_name(function_path!())? {
                self.completed(id)?;
            }
        }
    }

    /// Records that a running action finished, releases its resources, runs
    /// its completion hook and starts whatever has become eligible.
    ///
    /// Fails with [`Error::UntrackedAction`] if `id` is not a running action
    /// of this list, i.e. a second completion or a foreign action.
    pub fn completed(&mut self, id: ActionId) -> Result<()> {
        let index = self
            .actions
            .iter()
            .position(|e| e.id == id && e.running)
            .ok_or_else(|| Error::untracked_action(id))?;
        let mut entry = self.actions.remove(index);
        for resource in &entry.resources {
            self.resources.remove(resource);
        }
        entry.running = false;
        tracing::debug!("Action {id} completed, released {:?}", entry.resources);
        entry.action.done(self)?;
        self.trigger()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn is_running(&self, id: ActionId) -> bool {
        self.actions.iter().any(|e| e.id == id && e.running)
    }

    /// Resources currently held by running actions
    pub fn held_resources(&self) -> impl Iterator<Item = &Resource> {
        self.resources.iter()
    }

    /// Starts every idle action whose resources are free, in queue order.
    ///
    /// The held set only grows during a pass, so an action skipped earlier in
    /// the pass cannot become eligible later in it and one pass is a fixpoint.
    fn trigger(&mut self) -> Result<()> {
        for entry in self.actions.iter_mut() {
            if entry.running || !entry.resources.is_disjoint(&self.resources) {
                continue;
            }
            entry.running = true;
            self.resources.extend(entry.resources.iter().cloned());
            tracing::debug!("Starting action {}", entry.id);
            let completer = self.event_loop.completer(entry.id);
            entry.action.go(completer)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    type Log = Arc<Mutex<Vec<String>>>;

    /// Completes inline and records start and done on the owning thread
    struct Inline {
        name: &'static str,
        resources: Vec<&'static str>,
        log: Log,
    }

    impl Action for Inline {
        fn resources(&self) -> Vec<Resource> {
            self.resources.iter().map(|r| Resource::from(*r)).collect()
        }

        fn go(&mut self, completer: Completer) -> Result<()> {
            self.log.lock().unwrap().push(format!("go {}", self.name));
            completer.complete();
            Ok(())
        }

        fn done(&mut self, _actions: &mut ActionList) -> Result<()> {
            self.log.lock().unwrap().push(format!("done {}", self.name));
            Ok(())
        }
    }

    fn inline(name: &'static str, resources: &[&'static str], log: &Log) -> Inline {
        Inline {
            name,
            resources: resources.to_vec(),
            log: log.clone(),
        }
    }

    #[test]
    fn test_run_with_no_actions_returns_immediately() {
        let mut list = ActionList::default();
        list.run().unwrap();
        assert!(list.is_empty());
    }

    #[test]
    fn test_admission_follows_queue_order() {
        let log = Log::default();
        let mut list = ActionList::default();
        list.add(inline("a", &["dev0"], &log));
        list.add(inline("b", &["dev0"], &log));
        list.add(inline("c", &["dev1"], &log));
        list.add(inline("d", &[], &log));
        list.run().unwrap();

        // a and b conflict, so b waits for a's completion; c and d start in
        // the first pass alongside a.
        assert_eq!(
            *log.lock().unwrap(),
            ["go a", "go c", "go d", "done a", "go b", "done c", "done d", "done b"]
        );
        assert!(list.is_empty());
        assert_eq!(list.held_resources().count(), 0);
    }

    #[test]
    fn test_resources_held_while_running() {
        let mut list = ActionList::default();
        let log = Log::default();
        let id = list.add(inline("a", &["dev0", "host1"], &log));
        list.trigger().unwrap();

        assert!(list.is_running(id));
        let mut held: Vec<_> = list.held_resources().map(|r| r.to_string()).collect();
        held.sort();
        assert_eq!(held, ["dev0", "host1"]);

        list.completed(id).unwrap();
        assert!(!list.is_running(id));
        assert_eq!(list.held_resources().count(), 0);
    }

    #[test]
    fn test_completing_untracked_action_is_fatal() {
        let log = Log::default();
        let mut list = ActionList::default();
        let id = list.add(inline("a", &[], &log));

        // Queued but never started
        let err = list.completed(id).unwrap_err();
        assert!(matches!(err, Error::UntrackedAction(i) if i == id));
        assert!(err.is_fatal());

        list.run().unwrap();
        // Second completion of the same action
        assert!(matches!(list.completed(id), Err(Error::UntrackedAction(_))));
        // Never added at all
        assert!(matches!(
            list.completed(ActionId::new(99)),
            Err(Error::UntrackedAction(_))
        ));
    }

    struct Chain {
        remaining: usize,
        log: Log,
    }

    impl Action for Chain {
        fn resources(&self) -> Vec<Resource> {
            vec!["chain".into()]
        }

        fn go(&mut self, completer: Completer) -> Result<()> {
            self.log.lock().unwrap().push(format!("chain {}", self.remaining));
            completer.complete();
            Ok(())
        }

        fn done(&mut self, actions: &mut ActionList) -> Result<()> {
            if self.remaining > 0 {
                actions.add(Chain {
                    remaining: self.remaining - 1,
                    log: self.log.clone(),
                });
            }
            Ok(())
        }
    }

    #[test]
    fn test_done_hook_can_queue_follow_up() {
        let log = Log::default();
        let mut list = ActionList::default();
        list.add(Chain {
            remaining: 2,
            log: log.clone(),
        });
        list.run().unwrap();
        assert_eq!(*log.lock().unwrap(), ["chain 2", "chain 1", "chain 0"]);
    }

    struct FailingStart;

    impl Action for FailingStart {
        fn go(&mut self, _completer: Completer) -> Result<()> {
            Err(std::io::Error::other("cannot start").into())
        }
    }

    #[test]
    fn test_start_failure_propagates() {
        let mut list = ActionList::default();
        list.add(FailingStart);
        let err = list.run().unwrap_err();
        assert!(err.to_string().contains("cannot start"));
    }
}

//! Abstractions for providing the current time.

use std::cell::Cell;
use std::fmt::Debug;
use std::rc::Rc;
use std::time::{
    Duration,
    Instant,
};

/// An environment that provides the current time.
pub trait Env: Clone + Debug {
    /// Returns an instance corresponding to "now".
    fn now_instant(&self) -> Instant;
}

/// An environment that provides system based time.
#[derive(Clone, Debug, Default)]
pub struct SystemEnv;

impl SystemEnv {
    pub fn new() -> SystemEnv {
        SystemEnv {}
    }
}

impl Env for SystemEnv {
    fn now_instant(&self) -> Instant {
        Instant::now()
    }
}

/// An environment that provides a configurable time.
///
/// Clones share the same clock, so advancing one advances every cache and
/// service holding a clone.
#[derive(Clone, Debug)]
pub struct MockEnv {
    now: Rc<Cell<Instant>>,
}

impl MockEnv {
    pub fn new() -> MockEnv {
        MockEnv {
            now: Rc::new(Cell::new(Instant::now())),
        }
    }

    /// Moves the shared clock forward.
    pub fn advance(&self, duration: Duration) {
        self.now.set(self.now.get() + duration);
    }
}

impl Env for MockEnv {
    fn now_instant(&self) -> Instant {
        self.now.get()
    }
}

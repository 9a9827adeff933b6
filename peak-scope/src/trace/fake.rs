//! In-memory stand-ins for the sampler seam.

use std::{
    cell::{Cell, RefCell},
    collections::VecDeque,
    rc::Rc,
};

use crate::trace::{LineStatus, SampleSource, SamplerLauncher, sampler::SamplerError};

#[derive(Debug, Default)]
pub struct FakeLog {
    pub launched: usize,
    pub terminated: usize,
    /// Launched and not yet terminated.
    pub live: usize,
}

type Queue = Rc<RefCell<VecDeque<String>>>;

/// Reads its own queue until terminated. Lines left in it die with it.
pub struct FakeSource {
    queue: Queue,
    log: Rc<RefCell<FakeLog>>,
    close_when_empty: bool,
    terminated: bool,
}

impl SampleSource for FakeSource {
    fn try_next_line(&mut self) -> LineStatus {
        if self.terminated {
            return LineStatus::Closed;
        }
        match self.queue.borrow_mut().pop_front() {
            Some(l) => LineStatus::Line(l),
            None if self.close_when_empty => LineStatus::Closed,
            None => LineStatus::Pending,
        }
    }

    fn terminate(&mut self) -> Result<(), SamplerError> {
        if !self.terminated {
            self.terminated = true;
            let mut log = self.log.borrow_mut();
            log.terminated += 1;
            log.live -= 1;
        }
        Ok(())
    }
}

impl Drop for FakeSource {
    fn drop(&mut self) {
        let _ = self.terminate();
    }
}

/// Test handle and launcher in one; clones share state.
#[derive(Clone, Default)]
pub struct FakeLauncher {
    log: Rc<RefCell<FakeLog>>,
    /// Queue `push` feeds: the newest source's, or the next one's if that
    /// has not launched yet.
    queue: Rc<RefCell<Queue>>,
    /// The current queue already belongs to a launched source.
    claimed: Rc<Cell<bool>>,
    fail: Rc<RefCell<bool>>,
    close_when_empty: Rc<RefCell<bool>>,
}

impl FakeLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a line for the most recently launched source, or for the next
    /// launch when none has happened yet.
    pub fn push(&self, line: &str) {
        self.queue.borrow().borrow_mut().push_back(line.to_string());
    }

    pub fn queued(&self) -> usize {
        self.queue.borrow().borrow().len()
    }

    pub fn set_fail(&self, fail: bool) {
        *self.fail.borrow_mut() = fail;
    }

    /// Sources launched from now on report `Closed` once drained.
    pub fn set_close_when_empty(&self, close: bool) {
        *self.close_when_empty.borrow_mut() = close;
    }

    pub fn launched(&self) -> usize {
        self.log.borrow().launched
    }

    pub fn terminated(&self) -> usize {
        self.log.borrow().terminated
    }

    pub fn live(&self) -> usize {
        self.log.borrow().live
    }
}

impl SamplerLauncher for FakeLauncher {
    type Source = FakeSource;

    fn launch(&mut self) -> Result<FakeSource, SamplerError> {
        if *self.fail.borrow() {
            return Err(SamplerError::Spawn {
                program: "fake".to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such sampler"),
            });
        }
        let mut log = self.log.borrow_mut();
        log.launched += 1;
        log.live += 1;

        if self.claimed.replace(true) {
            *self.queue.borrow_mut() = Queue::default();
        }

        Ok(FakeSource {
            queue: Rc::clone(&self.queue.borrow()),
            log: Rc::clone(&self.log),
            close_when_empty: *self.close_when_empty.borrow(),
            terminated: false,
        })
    }
}

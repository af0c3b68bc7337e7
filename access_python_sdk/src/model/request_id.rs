use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Label of one handler invocation, rendered `w<worker>-<seq>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId {
    pub worker: u32,
    pub seq: u64,
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "w{}-{}", self.worker, self.seq)
    }
}

#[derive(Debug)]
pub struct RequestIdGenerator {
    worker: u32,
    next: AtomicU64,
}

impl RequestIdGenerator {
    pub fn new(worker: u32) -> Self {
        Self {
            worker,
            next: AtomicU64::new(1),
        }
    }

    pub fn next_id(&self) -> RequestId {
        RequestId {
            worker: self.worker,
            seq: self.next.fetch_add(1, Ordering::Relaxed),
        }
    }
}

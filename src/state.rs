use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::types::{ImageRef, ModelId};

/// Lifecycle of one provider's run. Result data lives inside `Completed`,
/// so an image or elapsed time can never be observed alongside any other
/// status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunState {
    Waiting,
    Generating,
    Retrying {
        attempt: u32,
        max_attempts: u32,
    },
    Completed {
        image: ImageRef,
        elapsed_seconds: u64,
    },
    Failed {
        error: String,
    },
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed { .. } | Self::Failed { .. })
    }
}

/// Read-only view of the whole board at one point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardSnapshot {
    pub generating: bool,
    pub runs: BTreeMap<ModelId, RunState>,
}

impl BoardSnapshot {
    fn new(models: &[ModelId]) -> Self {
        Self {
            generating: false,
            runs: models.iter().map(|id| (*id, RunState::Waiting)).collect(),
        }
    }

    pub fn run(&self, id: ModelId) -> Option<&RunState> {
        self.runs.get(&id)
    }
}

/// Observable per-model run state. Only the orchestrator mutates it; the
/// rendering collaborator reads snapshots through the watch channel (or
/// polls [`RunBoard::snapshot`]).
#[derive(Debug)]
pub struct RunBoard {
    tx: watch::Sender<BoardSnapshot>,
}

impl RunBoard {
    pub fn new(models: &[ModelId]) -> Self {
        let (tx, _rx) = watch::channel(BoardSnapshot::new(models));
        Self { tx }
    }

    pub fn subscribe(&self) -> watch::Receiver<BoardSnapshot> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> BoardSnapshot {
        self.tx.borrow().clone()
    }

    pub(crate) fn set_run(&self, id: ModelId, state: RunState) {
        self.tx.send_modify(|snapshot| {
            snapshot.runs.insert(id, state);
        });
    }

    pub(crate) fn set_generating(&self, generating: bool) {
        self.tx.send_modify(|snapshot| snapshot.generating = generating);
    }

    /// Reset every run back to `Waiting`, clearing prior results.
    pub(crate) fn reset(&self) {
        self.tx.send_modify(|snapshot| {
            for state in snapshot.runs.values_mut() {
                *state = RunState::Waiting;
            }
        });
    }
}

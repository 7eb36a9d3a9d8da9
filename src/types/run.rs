//! Single-use run tokens.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::id::{EdgeId, VertexId};
use crate::error::{TraversalError, TraversalResult};

/// Lifecycle of a traversal run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// Constructed, marks not yet initialized.
    Created,
    /// Marks initialized, traversal in progress.
    Running,
    /// Traversal finished (or aborted).
    Done,
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Running => write!(f, "running"),
            Self::Done => write!(f, "done"),
        }
    }
}

/// One logical traversal instance.
///
/// A token moves `Created → Running → Done` exactly once; asking it to
/// begin again is a [`TraversalError::Reuse`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunToken {
    id: Uuid,
    state: RunState,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
}

impl RunToken {
    /// Create a fresh token.
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            state: RunState::Created,
            started_at: None,
            finished_at: None,
        }
    }

    /// Run identifier.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Current state.
    pub fn state(&self) -> RunState {
        self.state
    }

    /// When the run began.
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// When the run finished.
    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    /// Transition `Created → Running`.
    pub fn begin(&mut self) -> TraversalResult<()> {
        if self.state != RunState::Created {
            return Err(TraversalError::Reuse(self.state));
        }
        self.state = RunState::Running;
        self.started_at = Some(Utc::now());
        Ok(())
    }

    /// Fail unless the run is in progress.
    pub fn ensure_running(&self) -> TraversalResult<()> {
        match self.state {
            RunState::Running => Ok(()),
            RunState::Created => Err(TraversalError::NotStarted),
            RunState::Done => Err(TraversalError::Reuse(RunState::Done)),
        }
    }

    /// Transition to `Done`. Idempotent.
    pub fn finish(&mut self) {
        if self.state != RunState::Done {
            self.state = RunState::Done;
            self.finished_at = Some(Utc::now());
        }
    }
}

impl Default for RunToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Global discovery order, appended once per element by the coordinator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryOrder {
    /// Vertices in discovery order, root first.
    pub vertices: Vec<VertexId>,
    /// Edges in discovery order.
    pub edges: Vec<EdgeId>,
}

impl DiscoveryOrder {
    /// Number of recorded elements.
    pub fn len(&self) -> usize {
        self.vertices.len() + self.edges.len()
    }

    /// Whether nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() && self.edges.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle() {
        let mut token = RunToken::new();
        assert!(matches!(token.ensure_running(), Err(TraversalError::NotStarted)));

        token.begin().unwrap();
        assert_eq!(token.state(), RunState::Running);
        assert!(token.started_at().is_some());
        token.ensure_running().unwrap();

        token.finish();
        assert_eq!(token.state(), RunState::Done);
        assert!(token.finished_at().is_some());
    }

    #[test]
    fn test_second_begin_is_reuse() {
        let mut token = RunToken::new();
        token.begin().unwrap();
        assert!(matches!(token.begin(), Err(TraversalError::Reuse(RunState::Running))));

        token.finish();
        assert!(matches!(token.begin(), Err(TraversalError::Reuse(RunState::Done))));
    }

    #[test]
    fn test_tokens_have_distinct_ids() {
        assert_ne!(RunToken::new().id(), RunToken::new().id());
    }
}

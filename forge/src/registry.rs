//! Identifier registry
//!
//! In-memory mapping from logical names to remote-issued ids. First write
//! wins; a second registration of the same name is a no-op, which is the
//! primary deduplication guard for shared containers. Callers scope keys by
//! concatenation (for example `grp_STOP_BENCH`), the registry itself is
//! flat.

use std::collections::HashMap;

/// Remote ids attached to one created phase
#[derive(Debug, Clone, Default)]
pub struct PhaseRecord {
    pub id: String,

    /// Task ids keyed by the names they were registered under (user-input
    /// tasks, deploy and script tasks); feeds the end-of-run phase summary
    pub task_ids: HashMap<String, String>,
}

/// Run-scoped name→id bookkeeping; pure in-memory, infallible
#[derive(Debug, Default)]
pub struct IdRegistry {
    ids: HashMap<String, String>,
    phases: HashMap<String, PhaseRecord>,
}

impl IdRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a name→id association. Returns the id that ends up registered:
    /// the new one, or the existing one when the name was already taken.
    pub fn register(&mut self, name: &str, id: &str) -> &str {
        self.ids
            .entry(name.to_string())
            .or_insert_with(|| id.to_string())
    }

    pub fn lookup(&self, name: &str) -> Option<&str> {
        self.ids.get(name).map(|s| s.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.ids.contains_key(name)
    }

    pub fn register_phase(&mut self, name: &str, id: &str) {
        self.phases
            .entry(name.to_string())
            .or_insert_with(|| PhaseRecord {
                id: id.to_string(),
                task_ids: HashMap::new(),
            });
    }

    pub fn phase(&self, name: &str) -> Option<&PhaseRecord> {
        self.phases.get(name)
    }

    /// Remote id of a phase, if created this run
    pub fn phase_id(&self, name: &str) -> Option<&str> {
        self.phases.get(name).map(|p| p.id.as_str())
    }

    /// Attach a task id to a phase record
    pub fn register_phase_task(&mut self, phase: &str, key: &str, task_id: &str) {
        if let Some(record) = self.phases.get_mut(phase) {
            record
                .task_ids
                .entry(key.to_string())
                .or_insert_with(|| task_id.to_string());
        }
    }
}

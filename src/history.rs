//! The command trait and the undo/redo history container.

use crate::color::ColorConverter;
use crate::doc::Document;
use crate::import::DocumentLoader;
use crate::log_err;
use std::collections::VecDeque;

/// Collaborators a command may need while executing. Undo/redo never touch
/// them: everything needed for inversion is captured during execute.
pub struct EditorContext<'a> {
    pub loader: &'a mut dyn DocumentLoader,
    pub converter: &'a dyn ColorConverter,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// The command was driven through its state machine in the wrong order
    /// (e.g. `undo` twice in a row). Always a caller bug; the document is
    /// left untouched.
    WrongState { operation: &'static str, state: &'static str },
}

impl std::fmt::Display for CommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommandError::WrongState { operation, state } => {
                write!(f, "cannot {} a command in state {}", operation, state)
            }
        }
    }
}

impl std::error::Error for CommandError {}

/// Trait for undoable/redoable edit commands.
///
/// A command runs exactly once via `execute` and afterwards only toggles
/// between done and undone; each entry point rejects calls from any other
/// state with [`CommandError::WrongState`].
pub trait Command {
    fn execute(
        &mut self,
        doc: &mut Document,
        ctx: &mut EditorContext<'_>,
    ) -> Result<(), CommandError>;
    fn undo(&mut self, doc: &mut Document) -> Result<(), CommandError>;
    fn redo(&mut self, doc: &mut Document) -> Result<(), CommandError>;
    fn description(&self) -> String;
    fn memory_size(&self) -> usize;
}

// ============================================================================
// HISTORY MANAGER
// ============================================================================

/// Undo/redo history with count and memory limits.
///
/// Commands are pushed after the caller has executed them; the manager then
/// owns driving `undo`/`redo`.
pub struct HistoryManager {
    undo_stack: VecDeque<Box<dyn Command>>,
    redo_stack: VecDeque<Box<dyn Command>>,
    max_history_size: usize,
    /// Optional memory cap in bytes.
    max_memory_bytes: Option<usize>,
    /// Running memory total across both stacks.
    total_memory: usize,
}

impl Default for HistoryManager {
    fn default() -> Self {
        Self::new(50)
    }
}

impl HistoryManager {
    pub fn new(max_history_size: usize) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: VecDeque::new(),
            max_history_size,
            max_memory_bytes: Some(100 * 1024 * 1024),
            total_memory: 0,
        }
    }

    /// Record an already-executed command. Clears the redo stack.
    pub fn push(&mut self, command: Box<dyn Command>) {
        for cmd in self.redo_stack.drain(..) {
            self.total_memory = self.total_memory.saturating_sub(cmd.memory_size());
        }

        self.total_memory += command.memory_size();
        self.undo_stack.push_back(command);
        self.prune();
    }

    pub fn undo(&mut self, doc: &mut Document) -> Option<String> {
        let mut command = self.undo_stack.pop_back()?;
        if let Err(e) = command.undo(doc) {
            log_err!("undo of '{}' rejected: {}", command.description(), e);
            self.undo_stack.push_back(command);
            return None;
        }
        let description = command.description();
        self.redo_stack.push_back(command);
        Some(description)
    }

    pub fn redo(&mut self, doc: &mut Document) -> Option<String> {
        let mut command = self.redo_stack.pop_back()?;
        if let Err(e) = command.redo(doc) {
            log_err!("redo of '{}' rejected: {}", command.description(), e);
            self.redo_stack.push_back(command);
            return None;
        }
        let description = command.description();
        self.undo_stack.push_back(command);
        Some(description)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_description(&self) -> Option<String> {
        self.undo_stack.back().map(|c| c.description())
    }

    pub fn redo_description(&self) -> Option<String> {
        self.redo_stack.back().map(|c| c.description())
    }

    pub fn undo_count(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_count(&self) -> usize {
        self.redo_stack.len()
    }

    /// Current memory usage of the history (O(1) via cached total).
    pub fn memory_usage(&self) -> usize {
        self.total_memory
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.total_memory = 0;
    }

    /// Drop the oldest commands until count and memory limits hold.
    fn prune(&mut self) {
        while self.undo_stack.len() > self.max_history_size {
            if let Some(removed) = self.undo_stack.pop_front() {
                self.total_memory = self.total_memory.saturating_sub(removed.memory_size());
            }
        }

        if let Some(max_bytes) = self.max_memory_bytes {
            while self.total_memory > max_bytes && self.undo_stack.len() > 1 {
                if let Some(removed) = self.undo_stack.pop_front() {
                    self.total_memory = self.total_memory.saturating_sub(removed.memory_size());
                }
            }
        }
    }
}

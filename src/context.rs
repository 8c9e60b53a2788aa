//! Resumable state of the main process.
//!
//! There is exactly one context, owned by the scheduler. It is overwritten on
//! every save/restore cycle rather than recreated.

use serde::Serialize;

use crate::types::{Pc, Tick};

/// Where the main process is in the save/restore cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ContextStatus {
    /// The main process owns the CPU.
    Running,
    /// Suspended; the program counter has been saved.
    Saved,
    /// State restored, resumption pending.
    Restored,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Context {
    /// Next instruction the main process will execute.
    pc: Pc,
    /// Program counter captured at the last save, while suspended.
    saved_pc: Option<Pc>,
    status: ContextStatus,
    saved_at: Option<Tick>,
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    pub fn new() -> Self {
        Context {
            pc: 0,
            saved_pc: None,
            status: ContextStatus::Running,
            saved_at: None,
        }
    }

    pub fn pc(&self) -> Pc {
        self.pc
    }

    pub fn saved_pc(&self) -> Option<Pc> {
        self.saved_pc
    }

    pub fn status(&self) -> ContextStatus {
        self.status
    }

    /// Tick of the most recent save.
    pub fn saved_at(&self) -> Option<Tick> {
        self.saved_at
    }

    /// Execute one instruction of the main process.
    pub(crate) fn step(&mut self) {
        debug_assert_eq!(self.status, ContextStatus::Running);
        self.pc += 1;
    }

    /// Snapshot the program counter on interrupt entry.
    pub(crate) fn save(&mut self, tick: Tick) -> Pc {
        debug_assert_eq!(self.status, ContextStatus::Running);
        self.saved_pc = Some(self.pc);
        self.saved_at = Some(tick);
        self.status = ContextStatus::Saved;
        self.pc
    }

    /// Restore on interrupt exit. Execution resumes at the instruction after
    /// the saved one. Returns `(saved_pc, resume_pc)`.
    pub(crate) fn restore(&mut self) -> (Pc, Pc) {
        debug_assert_eq!(self.status, ContextStatus::Saved);
        let saved = self.saved_pc.take().unwrap_or(self.pc);
        self.pc = saved + 1;
        self.status = ContextStatus::Restored;
        (saved, self.pc)
    }

    /// Hand the CPU back to the main process.
    pub(crate) fn resume(&mut self) {
        debug_assert_eq!(self.status, ContextStatus::Restored);
        self.status = ContextStatus::Running;
    }
}

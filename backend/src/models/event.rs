//! Execution log
//!
//! An optional record of every processed event, kept by single-threaded
//! runs for debugging and replay comparison.
//!
//! # Example
//!
//! ```rust
//! use callcenter_simulator_core_rs::models::{ExecutionEntry, ExecutionLog};
//!
//! let mut log = ExecutionLog::new();
//! log.log(ExecutionEntry {
//!     time_ms: 34_200_000,
//!     day: 0,
//!     kind: "FreshCall".to_string(),
//!     caller_type: Some("Hotline".to_string()),
//!     agent: None,
//!     message: "queued".to_string(),
//! });
//! assert_eq!(log.entries_of_kind("FreshCall").len(), 1);
//! ```

use serde::{Deserialize, Serialize};

use crate::core::time::format_clock;

/// One processed event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionEntry {
    pub time_ms: i64,
    /// Global day index
    pub day: u64,
    pub kind: String,
    pub caller_type: Option<String>,
    pub agent: Option<usize>,
    pub message: String,
}

impl ExecutionEntry {
    /// `day HH:MM:SS kind [caller type] [agent] message`
    pub fn to_line(&self) -> String {
        let mut line = format!("{} {} {}", self.day, format_clock(self.time_ms), self.kind);
        if let Some(caller_type) = &self.caller_type {
            line.push_str(&format!(" type={}", caller_type));
        }
        if let Some(agent) = self.agent {
            line.push_str(&format!(" agent={}", agent));
        }
        if !self.message.is_empty() {
            line.push(' ');
            line.push_str(&self.message);
        }
        line
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionLog {
    entries: Vec<ExecutionEntry>,
}

impl ExecutionLog {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn log(&mut self, entry: ExecutionEntry) {
        self.entries.push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[ExecutionEntry] {
        &self.entries
    }

    pub fn entries_of_day(&self, day: u64) -> Vec<&ExecutionEntry> {
        self.entries.iter().filter(|e| e.day == day).collect()
    }

    pub fn entries_of_kind(&self, kind: &str) -> Vec<&ExecutionEntry> {
        self.entries.iter().filter(|e| e.kind == kind).collect()
    }

    pub fn entries_for_agent(&self, agent: usize) -> Vec<&ExecutionEntry> {
        self.entries
            .iter()
            .filter(|e| e.agent == Some(agent))
            .collect()
    }

    /// Appends the entries of another log.
    pub fn append(&mut self, other: ExecutionLog) {
        self.entries.extend(other.entries);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(day: u64, kind: &str, agent: Option<usize>) -> ExecutionEntry {
        ExecutionEntry {
            time_ms: 3_600_000,
            day,
            kind: kind.to_string(),
            caller_type: None,
            agent,
            message: String::new(),
        }
    }

    #[test]
    fn test_filters() {
        let mut log = ExecutionLog::new();
        log.log(entry(0, "AgentReady", Some(1)));
        log.log(entry(0, "FreshCall", None));
        log.log(entry(1, "AgentReady", Some(2)));
        assert_eq!(log.len(), 3);
        assert_eq!(log.entries_of_day(0).len(), 2);
        assert_eq!(log.entries_of_kind("AgentReady").len(), 2);
        assert_eq!(log.entries_for_agent(2).len(), 1);
        log.clear();
        assert!(log.is_empty());
    }

    #[test]
    fn test_line_format() {
        let mut e = entry(2, "ServiceStart", Some(4));
        e.caller_type = Some("A".to_string());
        assert_eq!(e.to_line(), "2 01:00:00 ServiceStart type=A agent=4");
    }
}

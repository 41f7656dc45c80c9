//! Command history for cmdlog
//!
//! Stores submitted commands, searches them, and keeps the numbered
//! suggestion list the console picks from.

use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::{ConsoleError, Result};

/// Default maximum number of history entries
pub const HISTORY_LIMIT: usize = 1000;

/// A single history entry
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HistoryEntry {
    /// The command text
    pub command: String,
    /// Unix timestamp
    pub timestamp: u64,
}

/// Command history storage
pub struct CommandHistory {
    /// All history entries (newest last)
    entries: Vec<HistoryEntry>,
    /// File path for persistence, `None` keeps history in memory only
    file_path: Option<PathBuf>,
    /// Maximum entries
    max_entries: usize,
    /// Lines in the history file, including ones already trimmed from `entries`
    lines_on_disk: usize,
}

impl CommandHistory {
    /// History persisted at `path`, loaded immediately
    pub fn open(path: PathBuf, max_entries: usize) -> Self {
        let mut history = Self {
            entries: Vec::new(),
            file_path: Some(path),
            max_entries,
            lines_on_disk: 0,
        };
        history.load();
        if history.lines_on_disk > history.entries.len() {
            history.compact();
        }
        history
    }

    #[allow(dead_code)]
    pub fn in_memory(max_entries: usize) -> Self {
        Self {
            entries: Vec::new(),
            file_path: None,
            max_entries,
            lines_on_disk: 0,
        }
    }

    /// `~/.cmdlog/history`
    pub fn default_path() -> Option<PathBuf> {
        crate::config::data_dir().map(|dir| dir.join("history"))
    }

    /// Load history from file
    fn load(&mut self) {
        let Some(path) = self.file_path.as_deref() else {
            return;
        };
        let Ok(content) = fs::read_to_string(path) else {
            return;
        };

        for line in content.lines() {
            self.lines_on_disk += 1;
            if let Some((ts_str, cmd)) = line.split_once(';') {
                if let Ok(timestamp) = ts_str.parse::<u64>() {
                    self.entries.push(HistoryEntry {
                        command: cmd.to_string(),
                        timestamp,
                    });
                }
            }
        }

        let excess = self.entries.len().saturating_sub(self.max_entries);
        self.entries.drain(..excess);
    }

    /// Append one entry to the history file
    fn append(&mut self, entry: &HistoryEntry) -> Result<()> {
        let Some(path) = self.file_path.as_deref() else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| write_error(parent, source))?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|source| write_error(path, source))?;
        writeln!(file, "{};{}", entry.timestamp, entry.command)
            .map_err(|source| write_error(path, source))?;
        self.lines_on_disk += 1;
        Ok(())
    }

    /// Rewrite the history file with only the retained entries
    fn rewrite(&mut self) -> Result<()> {
        let Some(path) = self.file_path.as_deref() else {
            return Ok(());
        };

        let content: String = self
            .entries
            .iter()
            .map(|e| format!("{};{}\n", e.timestamp, e.command))
            .collect();
        fs::write(path, content).map_err(|source| write_error(path, source))?;
        self.lines_on_disk = self.entries.len();
        Ok(())
    }

    fn compact(&mut self) {
        if let Err(e) = self.rewrite() {
            warn!("Failed to compact history: {}", e);
        }
    }

    /// Add a command to history
    pub fn add(&mut self, command: &str) {
        // Skip empty or whitespace-only commands
        let trimmed = command.trim();
        if trimmed.is_empty() {
            return;
        }

        // Skip if same as last command (dedup consecutive)
        if let Some(last) = self.entries.last() {
            if last.command == trimmed {
                return;
            }
        }

        if Self::is_sensitive(trimmed) {
            return;
        }

        // Entries are line-based on disk
        if trimmed.contains('\n') {
            return;
        }

        let timestamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        let entry = HistoryEntry {
            command: trimmed.to_string(),
            timestamp,
        };
        if let Err(e) = self.append(&entry) {
            warn!("Failed to save history: {}", e);
        }
        self.entries.push(entry);

        let excess = self.entries.len().saturating_sub(self.max_entries);
        self.entries.drain(..excess);

        // Submits only append; the file is rewritten once it holds twice the limit
        if self.lines_on_disk >= self.max_entries.saturating_mul(2).max(1) {
            self.compact();
        }
    }

    /// Check if command carries credentials (shouldn't be saved)
    fn is_sensitive(command: &str) -> bool {
        let tokens: Vec<String> = command
            .split_whitespace()
            .map(|t| t.to_ascii_uppercase())
            .collect();
        let has = |word: &str| tokens.iter().any(|t| t == word);

        match tokens.first().map(String::as_str) {
            Some("AUTH") => true,
            Some("HELLO") | Some("MIGRATE") => has("AUTH") || has("AUTH2"),
            Some("ACL") => has("SETUSER"),
            Some("CONFIG") => has("REQUIREPASS") || has("MASTERAUTH"),
            _ => false,
        }
    }

    /// Search history by query (newest first)
    pub fn search(&self, query: &str) -> Vec<&HistoryEntry> {
        let query_lower = query.to_lowercase();
        self.entries
            .iter()
            .rev() // newest first
            .filter(|e| e.command.to_lowercase().contains(&query_lower))
            .collect()
    }

    /// Get recent history (newest first)
    pub fn recent(&self, count: usize) -> Vec<&HistoryEntry> {
        self.entries.iter().rev().take(count).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn write_error(path: &Path, source: std::io::Error) -> ConsoleError {
    ConsoleError::Write {
        path: path.to_path_buf(),
        source,
    }
}

/// Numbered suggestion list built from history
#[derive(Debug, Default)]
pub struct Suggestions {
    /// Filtered results (command strings)
    results: Vec<String>,
    /// Maximum listed items
    max_visible: usize,
}

impl Suggestions {
    pub fn new(max_visible: usize) -> Self {
        Self {
            results: Vec::new(),
            max_visible,
        }
    }

    /// Rebuild the list: recent commands for an empty query, matches otherwise
    pub fn update(&mut self, history: &CommandHistory, query: &str) {
        self.results.clear();

        // Track seen commands to avoid duplicates
        let mut seen = HashSet::new();
        let entries = if query.is_empty() {
            history.recent(history.len())
        } else {
            history.search(query)
        };

        for entry in entries {
            if self.results.len() >= self.max_visible {
                break;
            }
            if seen.insert(entry.command.as_str()) {
                self.results.push(entry.command.clone());
            }
        }
    }

    /// Items with 1-based display numbers
    pub fn items(&self) -> impl Iterator<Item = (usize, &str)> {
        self.results
            .iter()
            .enumerate()
            .map(|(idx, cmd)| (idx + 1, cmd.as_str()))
    }

    /// Select by display number
    pub fn pick(&self, num: usize) -> Option<&str> {
        let index = num.checked_sub(1)?;
        self.results.get(index).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn clear(&mut self) {
        self.results.clear();
    }
}

//! In-memory clipboard for tests.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::error::ClipboardError;
use crate::transaction::ClipboardApi;
use crate::ClipboardResult;

/// First id handed out for registered formats.
const FIRST_REGISTERED_FORMAT: u32 = 0xC000;

#[derive(Debug, Default)]
pub struct MockClipboard {
    pub contents: BTreeMap<u32, Vec<u8>>,
    pub is_open: bool,
    pub open_calls: u32,
    pub close_calls: u32,
    busy_remaining: u32,
    failing_empty: bool,
    failing: HashSet<u32>,
    failing_names: HashSet<String>,
    registered: HashMap<String, u32>,
}

impl MockClipboard {
    /// A clipboard held by another process for the first `n` opens.
    pub fn busy_for(n: u32) -> Self {
        Self {
            busy_remaining: n,
            ..Default::default()
        }
    }

    /// Reject `empty` after a successful open.
    pub fn failing_empty(mut self) -> Self {
        self.failing_empty = true;
        self
    }

    /// Reject `set_data` for a format id.
    pub fn failing(mut self, format: u32) -> Self {
        self.failing.insert(format);
        self
    }

    /// Reject `set_data` for a registered format name.
    pub fn failing_named(mut self, name: &str) -> Self {
        self.failing_names.insert(name.to_string());
        self
    }

    /// Id assigned to a registered format name.
    pub fn registered_id(&self, name: &str) -> Option<u32> {
        self.registered.get(name).copied()
    }
}

impl ClipboardApi for MockClipboard {
    fn open(&mut self) -> ClipboardResult<()> {
        self.open_calls += 1;
        if self.busy_remaining > 0 {
            self.busy_remaining -= 1;
            return Err(ClipboardError::Text("held by another process".into()));
        }
        assert!(!self.is_open, "clipboard opened twice");
        self.is_open = true;
        Ok(())
    }

    fn close(&mut self) {
        self.close_calls += 1;
        self.is_open = false;
    }

    fn empty(&mut self) -> ClipboardResult<()> {
        assert!(self.is_open);
        if self.failing_empty {
            return Err(ClipboardError::Text("not the clipboard owner".into()));
        }
        self.contents.clear();
        Ok(())
    }

    fn register_format(&mut self, name: &str) -> ClipboardResult<u32> {
        let next = FIRST_REGISTERED_FORMAT + self.registered.len() as u32;
        Ok(*self.registered.entry(name.to_string()).or_insert(next))
    }

    fn set_data(&mut self, format: u32, data: &[u8]) -> ClipboardResult<()> {
        assert!(self.is_open);
        let named_failure = self
            .registered
            .iter()
            .any(|(name, &id)| id == format && self.failing_names.contains(name));
        if self.failing.contains(&format) || named_failure {
            return Err(ClipboardError::SetData {
                format,
                message: "rejected".into(),
            });
        }
        self.contents.insert(format, data.to_vec());
        Ok(())
    }
}

//! Scoped clipboard access.

use std::thread;
use std::time::Duration;

use tracing::{debug, trace, warn};

use crate::error::ClipboardError;
use crate::formats::{ClipboardEntry, ClipboardFormat};
use crate::ClipboardResult;

/// Low-level clipboard operations of the window system.
pub trait ClipboardApi {
    /// Open the clipboard for this process. Fails if another process holds it.
    fn open(&mut self) -> ClipboardResult<()>;

    /// Close the clipboard.
    fn close(&mut self);

    /// Remove all clipboard contents and take ownership.
    fn empty(&mut self) -> ClipboardResult<()>;

    /// Look up or register a named format.
    fn register_format(&mut self, name: &str) -> ClipboardResult<u32>;

    /// Place one entry. On success the data belongs to the system.
    fn set_data(&mut self, format: u32, data: &[u8]) -> ClipboardResult<()>;
}

/// Retry policy for opening the clipboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClipboardConfig {
    /// Attempts before giving up, at least 1.
    pub open_attempts: u32,

    /// Delay between attempts.
    pub retry_delay: Duration,
}

impl Default for ClipboardConfig {
    fn default() -> Self {
        Self {
            open_attempts: 5,
            retry_delay: Duration::from_millis(50),
        }
    }
}

/// An open, emptied clipboard. Closed when dropped.
pub struct ClipboardTransaction<'a, A: ClipboardApi + ?Sized> {
    api: &'a mut A,
}

impl<'a, A: ClipboardApi + ?Sized> ClipboardTransaction<'a, A> {
    /// Open the clipboard, retrying while it is busy, and empty it.
    pub fn begin(api: &'a mut A, config: &ClipboardConfig) -> ClipboardResult<Self> {
        let attempts = config.open_attempts.max(1);
        let mut opened = false;

        for attempt in 1..=attempts {
            match api.open() {
                Ok(()) => {
                    opened = true;
                    break;
                }
                Err(e) => {
                    debug!(attempt, "Clipboard open failed: {}", e);
                    if attempt < attempts {
                        thread::sleep(config.retry_delay);
                    }
                }
            }
        }

        if !opened {
            warn!(attempts, "Clipboard stayed busy");
            return Err(ClipboardError::Busy { attempts });
        }

        // From here on the guard closes the clipboard.
        let mut transaction = Self { api };
        transaction.api.empty()?;
        Ok(transaction)
    }

    /// Place one entry.
    pub fn set(&mut self, entry: &ClipboardEntry) -> ClipboardResult<()> {
        let format = match entry.format {
            ClipboardFormat::Standard(id) => id,
            ClipboardFormat::Registered(name) => self.api.register_format(name)?,
        };
        trace!(format, bytes = entry.data.len(), "Setting clipboard data");
        self.api.set_data(format, &entry.data)
    }
}

impl<A: ClipboardApi + ?Sized> Drop for ClipboardTransaction<'_, A> {
    fn drop(&mut self) {
        self.api.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::CF_UNICODETEXT;
    use crate::mock::MockClipboard;
    use bytes::Bytes;

    fn quick(attempts: u32) -> ClipboardConfig {
        ClipboardConfig {
            open_attempts: attempts,
            retry_delay: Duration::ZERO,
        }
    }

    #[test]
    fn test_retries_until_open() {
        let mut api = MockClipboard::busy_for(3);
        {
            let _tx = ClipboardTransaction::begin(&mut api, &quick(5)).unwrap();
        }
        assert_eq!(api.open_calls, 4);
        assert!(!api.is_open);
    }

    #[test]
    fn test_gives_up_after_attempts() {
        let mut api = MockClipboard::busy_for(10);
        let busy = matches!(
            ClipboardTransaction::begin(&mut api, &quick(5)),
            Err(ClipboardError::Busy { attempts: 5 })
        );
        assert!(busy);
        assert_eq!(api.open_calls, 5);
    }

    #[test]
    fn test_closed_when_empty_fails() {
        let mut api = MockClipboard::default().failing_empty();
        assert!(ClipboardTransaction::begin(&mut api, &quick(5)).is_err());
        assert_eq!(api.open_calls, 1);
        assert_eq!(api.close_calls, 1);
        assert!(!api.is_open);
    }

    #[test]
    fn test_closed_on_failed_set() {
        let mut api = MockClipboard::default().failing(CF_UNICODETEXT);
        {
            let mut tx = ClipboardTransaction::begin(&mut api, &quick(1)).unwrap();
            let entry = ClipboardEntry {
                format: ClipboardFormat::Standard(CF_UNICODETEXT),
                data: Bytes::from_static(b"x\0"),
                required: true,
            };
            assert!(tx.set(&entry).is_err());
        }
        assert!(!api.is_open);
        assert_eq!(api.close_calls, 1);
    }
}

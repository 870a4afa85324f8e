//! Win32 clipboard access.

use tracing::warn;
use windows::core::HSTRING;
use windows::Win32::Foundation::{HANDLE, HWND};
use windows::Win32::System::DataExchange::{
    CloseClipboard, EmptyClipboard, OpenClipboard, RegisterClipboardFormatW, SetClipboardData,
};
use windows::Win32::System::Memory::{
    GlobalAlloc, GlobalFree, GlobalLock, GlobalUnlock, GMEM_MOVEABLE, GMEM_ZEROINIT,
};

use crate::error::ClipboardError;
use crate::transaction::ClipboardApi;
use crate::ClipboardResult;

/// The system clipboard, opened without an owner window.
#[derive(Debug, Default)]
pub struct Win32Clipboard;

impl Win32Clipboard {
    pub fn new() -> Self {
        Self
    }
}

impl ClipboardApi for Win32Clipboard {
    fn open(&mut self) -> ClipboardResult<()> {
        unsafe { OpenClipboard(HWND::default())? };
        Ok(())
    }

    fn close(&mut self) {
        if let Err(e) = unsafe { CloseClipboard() } {
            warn!("CloseClipboard failed: {}", e);
        }
    }

    fn empty(&mut self) -> ClipboardResult<()> {
        unsafe { EmptyClipboard()? };
        Ok(())
    }

    fn register_format(&mut self, name: &str) -> ClipboardResult<u32> {
        let id = unsafe { RegisterClipboardFormatW(&HSTRING::from(name)) };
        if id == 0 {
            return Err(ClipboardError::RegisterFormat(name.to_string()));
        }
        Ok(id)
    }

    fn set_data(&mut self, format: u32, data: &[u8]) -> ClipboardResult<()> {
        unsafe {
            let hmem = GlobalAlloc(GMEM_MOVEABLE | GMEM_ZEROINIT, data.len())?;

            let ptr = GlobalLock(hmem);
            if ptr.is_null() {
                let _ = GlobalFree(hmem);
                return Err(ClipboardError::SetData {
                    format,
                    message: "GlobalLock failed".into(),
                });
            }
            std::ptr::copy_nonoverlapping(data.as_ptr(), ptr as *mut u8, data.len());
            // Reports an error once the lock count reaches zero; nothing to handle.
            let _ = GlobalUnlock(hmem);

            // On success the system owns the memory.
            if let Err(e) = SetClipboardData(format, HANDLE(hmem.0)) {
                let _ = GlobalFree(hmem);
                return Err(ClipboardError::SetData {
                    format,
                    message: e.message().to_string(),
                });
            }
        }
        Ok(())
    }
}

//! # clipr - Clipboard System for File Managers
//!
//! Multi-item copy/cut clipboard with best-effort paste.
//!
//! ## Key Features
//! - Copy and cut of many paths at once, replaced wholesale on every `set`
//! - Per-item paste outcomes: one failure never aborts the rest
//! - `" (N)"` collision naming on the destination side
//! - Metadata preserving recursive copies, moves across filesystems
//! - Paste split into a thread-safe execute step and a state-applying step

pub mod clipboard;
pub mod error;
pub mod item;
pub mod operations;

// Re-export main types for easy use
pub use clipboard::{Clipboard, ClipboardStats};
pub use error::{ClipError, ClipResult};
pub use item::{ClipboardItem, ClipboardOperation};
pub use operations::{
    PasteOutcome, copy_file_preserving, copy_recursive, execute_paste, move_path,
    unique_destination,
};

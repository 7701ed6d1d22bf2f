//! # seglog
//!
//! A segmented, append-only commit log with:
//! - Length-framed record stores, one per segment
//! - Memory-mapped, fixed-width offset indexes
//! - Automatic rollover when a segment fills up
//! - Recovery purely from on-disk state
//! - Retention truncation and full-stream export
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                            Log                              │
//! │            (RwLock: single writer / many readers)           │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │  routes by offset
//!          ┌────────────┼────────────┐
//!          ▼            ▼            ▼
//!   ┌─────────────┐ ┌─────────────┐ ┌─────────────┐
//!   │ Segment 0   │ │ Segment 19  │ │ Segment 38  │ ← active
//!   └──────┬──────┘ └─────────────┘ └─────────────┘
//!          │
//!    ┌─────┴─────┐
//!    ▼           ▼
//! ┌───────┐  ┌───────┐
//! │ Store │  │ Index │
//! │(frames│  │(mmap) │
//! └───────┘  └───────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod record;
pub mod storage;
pub mod log;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{LogError, Result};
pub use config::{Config, SegmentConfig};
pub use log::{Log, LogReader};
pub use record::Record;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of seglog
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

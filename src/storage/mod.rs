//! Storage Module
//!
//! On-disk building blocks of the log: stores, indexes and the segments that
//! pair them.
//!
//! ## Responsibilities
//! - Append length-framed payloads to store files
//! - Map relative offsets to store positions through memory-mapped indexes
//! - Translate absolute offsets and detect when a segment is full
//!
//! ## File Layout (per segment)
//! ```text
//! {dir}/
//!   ├── {base_offset}.store    [Len: u64 BE][Payload] ...
//!   └── {base_offset}.index    [RelOffset: u32 BE][Position: u64 BE] ...
//! ```

mod index;
mod segment;
mod store;

pub use index::{Index, IndexEntry, ENTRY_WIDTH, OFFSET_WIDTH, POSITION_WIDTH};
pub use segment::{Segment, INDEX_EXTENSION, STORE_EXTENSION};
pub use store::{frames, Frames, Store, LEN_WIDTH};

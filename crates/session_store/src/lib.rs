//! Durable per-claim session state.
//!
//! Every claim owns one directory of JSON artifacts plus an `attachments/`
//! folder with the raw binaries. All writes are write-temp-then-rename so a
//! partially written record is never observable; read-modify-write files are
//! guarded by an internal per-claim lock so concurrent agent workers cannot
//! interleave updates.

mod error;
mod store;

pub use error::{Result, StoreError};
pub use store::{FileSessionStore, SessionStore};

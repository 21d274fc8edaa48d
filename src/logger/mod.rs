//! Activity logging: a JSONL sink owned by a background thread, fed through a bounded channel.

pub mod activity;
pub mod jsonl;

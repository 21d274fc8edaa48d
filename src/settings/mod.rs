//! Settings: the persisted value, its storage, runtime appliers, and the
//! snapshot/preview/apply/cancel transaction.

pub mod appliers;
pub mod data;
pub mod storage;
pub mod transaction;

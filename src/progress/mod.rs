//! Player progress: the persisted counters and the write-through store that
//! takes part in `save_all`.

pub mod data;
pub mod store;

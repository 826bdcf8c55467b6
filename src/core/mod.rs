pub mod code_cache;
pub mod embed;
pub mod filter;
pub mod relay;
pub mod shutdown;

pub use crate::domain::model::{CycleOutcome, CycleReport, Script, ScriptPost};
pub use crate::domain::ports::{PostedStore, Publisher, ScriptSource};
pub use crate::utils::error::Result;

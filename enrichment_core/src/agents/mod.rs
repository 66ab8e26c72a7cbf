//! Agents that call the completion capability, and their pipeline adapters.

mod enrichment;
mod revision;
mod stages;

pub use enrichment::*;
pub use revision::*;
pub use stages::*;

//! Reference node implementations. Spec §1 places node implementations
//! (HTTP, transform-script, delay, LLM, …) out of scope — the engine only
//! depends on the node *protocol* — but an engine with no nodes registered
//! can't be exercised, so these two live alongside the core as the minimal
//! set the testable scenarios in spec §8 actually need: `base` (identity,
//! used by the linear/split scenarios) and `delay` (the sleeping node used
//! by the cancellation scenario).

mod base;
mod delay;

pub use base::{BaseNode, BaseNodeFactory};
pub use delay::{DelayNode, DelayNodeFactory};

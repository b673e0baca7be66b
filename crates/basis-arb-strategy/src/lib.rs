/*
[INPUT]:  Public API exports for the basis-arb strategy crate
[OUTPUT]: Module declarations and public re-exports
[POS]:    Crate root - library entry point
[UPDATE]: When adding new modules or public exports
*/

pub mod config;
pub mod context;
pub mod engine;
pub mod events;
pub mod executor;
pub mod fills;
pub mod order_router;
pub mod quote_feed;
pub mod quote_store;
pub mod signal;
pub mod user_data;

#[cfg(test)]
pub(crate) mod testing;

// Re-export main types for convenience
pub use config::BotConfig;
pub use context::PersistentContext;
pub use events::{Event, EventBus, EventKind};
pub use executor::PeggedExecutor;
pub use quote_store::QuoteStore;
pub use signal::SignalEngine;

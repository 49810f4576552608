//! # Arbor
//!
//! Test-time compute engine: spend extra inference per problem on
//! reward-model-guided search and keep the best answer.
//!
//! Arbor wraps [`arbor_core`] with the pieces an application needs:
//! - **Engine**: one object holding the configuration and both services
//! - **JSON lines**: stream problems in and records out
//! - **Logging**: a `tracing` subscriber driven by `RUST_LOG`
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use arbor::prelude::*;
//! use arbor::mock::{MockGenerator, MockReward};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     arbor::init_logging();
//!
//!     let engine = Engine::builder()
//!         .approach(Approach::BeamSearch)
//!         .generator(MockGenerator::seeded(4))
//!         .reward_model(MockReward::seeded())
//!         .build()?;
//!
//!     let record = engine.solve(&Problem::new("p0", "What is 6 * 7?")).await?;
//!     println!("{:?}", record.answer);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

// Re-export core crate
pub use arbor_core::*;

mod engine;
pub mod io;

pub use engine::{Engine, EngineBuilder};
pub use io::{JsonLinesSink, JsonLinesSource};

/// Install a `fmt` subscriber filtered by `RUST_LOG` (default `info`).
///
/// Does nothing if a global subscriber is already set.
pub fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Commonly used types.
pub mod prelude {
    pub use crate::engine::{Engine, EngineBuilder};
    pub use crate::io::{JsonLinesSink, JsonLinesSource};
    pub use arbor_core::prelude::*;

    // Re-export useful external types
    pub use anyhow;
    pub use tokio;
    pub use tracing;
}

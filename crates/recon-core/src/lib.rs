//! Recovery Console Core (recon-core)
//!
//! Run orchestration on top of `recon-kernel`: a [`RecoveryOrchestrator`]
//! validates a [`RunRequest`], ingests its signals, ranks its routes into a
//! plan, applies the policy gates, and drives the selected candidate through
//! a [`StepExecutor`].
//!
//! # Example
//!
//! ```rust
//! use recon_core::prelude::*;
//! use recon_kernel::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let orchestrator = RecoveryOrchestrator::new(ConsoleConfig::new())?;
//!
//! let key = RunKey::parse("acme", "run-1")?;
//! let route = Route::new(RouteId::new("primary")?, 70.0)
//!     .with_step(RouteStep::new("drain", 5))
//!     .with_step(RouteStep::new("restore", 10));
//! let request = RunRequest::new(&key).with_route(route);
//!
//! let outcome = orchestrator.execute(request).await?;
//! assert_eq!(outcome.status, RunStatus::Succeeded);
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod config;
pub mod error;
pub mod executor;
pub mod orchestrator;
pub mod plan;
pub mod policy;
pub mod telemetry;
pub mod types;

pub use config::{ConsoleConfig, PolicyConfig};
pub use error::{ConfigError, OrchestratorError};
pub use executor::{DefaultStepExecutor, StepError, StepExecutor, StepReport};
pub use orchestrator::RecoveryOrchestrator;
pub use plan::RecoveryPlan;
pub use policy::{PolicyDecision, PolicyViolation};
pub use types::{Artifact, RunOutcome, RunRecord, RunRequest, SignalInput};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with the recovery console core
    pub use crate::{
        Artifact, ConsoleConfig, OrchestratorError, PolicyConfig, RecoveryOrchestrator,
        RunOutcome, RunRecord, RunRequest, SignalInput, StepExecutor,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

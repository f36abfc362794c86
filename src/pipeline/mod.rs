pub mod checks;
pub mod discovery;
pub mod loader;
pub mod normalize;

mod orchestrator;

pub use orchestrator::{
    Orchestrator, PortfolioFailure, RunError, RunSummary, SkipReason, SkippedPortfolio,
    WrittenPortfolio,
};

//! Build plans and their execution.

pub mod executor;
pub mod plan;

pub use executor::{BuildExecutor, ExecutionSummary, StepOutcome};
pub use plan::{
    install_markers, recipe, BuildPlan, BuildStep, Expect, Precondition, Recipe, ServiceSpec,
    ServiceStrategy, StepAction, INSTALL_STAMP,
};

mod context;
mod trait_step;

pub use context::{PipelineServices, StepContext};
pub use trait_step::{StepOutcome, StepResult, WorkflowStep};

//! bsa-workflow: pipeline de descarga de listas de bloqueo
//!
//! Diff entre snapshots (`diff`), aplicación de labels al registro
//! (`apply`), reportes para la autoridad (`report`), reintentos (`retry`),
//! un `WorkflowStep` por stage (`stages`) y el orquestador
//! `BsaDownloadAction`, que ejecuta una invocación bajo `flow::BsaLock`.

pub mod apply;
pub mod artifacts;
pub mod config;
pub mod diff;
pub mod engine;
pub mod errors;
pub mod factory;
pub mod report;
pub mod retry;
pub mod stages;
pub mod step;

pub use config::DownloadConfig;
pub use diff::BlockLabelsDiff;
pub use engine::{BsaDownloadAction, InvocationStatus, RunOutcome};
pub use errors::WorkflowError;
pub use factory::BsaActionFactory;
pub use step::{PipelineServices, StepContext, StepOutcome, WorkflowStep};

mod download_action;

pub use download_action::{BsaDownloadAction, InvocationStatus, RunOutcome};

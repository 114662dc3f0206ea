pub mod analysis_queue;

pub use analysis_queue::{AnalysisJob, AnalysisQueue, JobError, JobStatus};

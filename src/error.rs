use thiserror::Error;

/// A fatal failure, tagged with the run stage it aborted.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("creating output directories: {0:#}")]
    Prepare(anyhow::Error),
    #[error("inspecting input suite: {0:#}")]
    Stat(anyhow::Error),
    #[error("replicating suite directory: {0:#}")]
    Replicate(anyhow::Error),
    #[error("extracting suite archive: {0:#}")]
    Extract(anyhow::Error),
    #[error("filtering test cases: {0:#}")]
    Filter(anyhow::Error),
    #[error("compressing output suite: {0:#}")]
    Compress(anyhow::Error),
    #[error("cleaning up filtered files: {0:#}")]
    Cleanup(anyhow::Error),
}

impl RunError {
    /// Process exit status. Starts at 3; clap reports usage errors with 2.
    pub fn exit_code(&self) -> i32 {
        match self {
            RunError::Prepare(_) => 3,
            RunError::Stat(_) => 4,
            RunError::Replicate(_) => 5,
            RunError::Extract(_) => 6,
            RunError::Filter(_) => 7,
            RunError::Compress(_) => 8,
            RunError::Cleanup(_) => 9,
        }
    }
}

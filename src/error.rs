//! Error types shared by all fingerprinting stages
//!

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FingerprintError {
    /// Parameter or input combination rejected before any work unit starts
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// Unreadable or malformed alignment/annotation input
    ///
    /// `context` identifies the failing unit (sample, reference and category) or file line
    #[error("Failed to read {input} ({context}): {message}")]
    SourceRead {
        input: String,
        context: String,
        message: String,
    },

    #[error("Failed to write output file '{filename}': {error}")]
    Output {
        filename: String,
        #[source]
        error: std::io::Error,
    },
}

impl FingerprintError {
    pub fn source_read(
        input: impl Into<String>,
        context: impl Into<String>,
        message: impl ToString,
    ) -> Self {
        Self::SourceRead {
            input: input.into(),
            context: context.into(),
            message: message.to_string(),
        }
    }

    /// Process exit code used when this error terminates the run
    pub fn exit_code(&self) -> exitcode::ExitCode {
        match self {
            Self::Configuration(_) => exitcode::CONFIG,
            Self::SourceRead { .. } => exitcode::DATAERR,
            Self::Output { .. } => exitcode::IOERR,
        }
    }
}

pub type FingerprintResult<T> = Result<T, FingerprintError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_read_message() {
        let err = FingerprintError::source_read(
            "alignment file 'a.bam'",
            "sample 'a' reference 'chr1' category 'Gypsy'",
            "truncated record",
        );
        assert_eq!(
            err.to_string(),
            "Failed to read alignment file 'a.bam' (sample 'a' reference 'chr1' category 'Gypsy'): truncated record"
        );
        assert_eq!(err.exit_code(), exitcode::DATAERR);
    }

    #[test]
    fn test_configuration_exit_code() {
        let err = FingerprintError::Configuration("bad".to_string());
        assert_eq!(err.exit_code(), exitcode::CONFIG);
    }
}

//! Utilities pertaining to filesystem and other os-level settings
//!

use camino::Utf8Path;
use log::warn;

use crate::error::{FingerprintError, FingerprintResult};

/// Create a novel directory path if it does not exist already
///
/// If the directory already exists no operations are performed
///
/// * `label` - used to describe the error directory in an error message
///
pub fn create_dir_all(dir: &Utf8Path, label: &str) -> FingerprintResult<()> {
    if !dir.is_dir() {
        std::fs::create_dir_all(dir).map_err(|error| FingerprintError::Output {
            filename: format!("{label} directory '{dir}'"),
            error,
        })?;
    }
    Ok(())
}

/// Attempt to increase open file limit to the system's hard limit on *nix-like systems
///
/// This is an optional increase so continue through all failure cases without error.
///
pub fn attempt_max_open_file_limit() {
    use rlimit::Resource;

    let (soft, hard) = match Resource::NOFILE.get() {
        Ok(x) => x,
        Err(_) => return,
    };

    if soft < hard {
        rlimit::setrlimit(Resource::NOFILE, hard, hard).unwrap_or_default();
    }
}

/// Warn if the open file limit looks too low for the given number of simultaneously open files
///
/// Every worker thread holds an alignment file reader for every sample.
///
pub fn check_open_file_limit(required_file_count: u64) {
    use rlimit::Resource;

    if let Ok((soft, _)) = Resource::NOFILE.get() {
        if soft < required_file_count {
            warn!(
                "Open file limit ({soft}) is below the {required_file_count} alignment file handles this run may hold, consider reducing --threads"
            );
        }
    }
}

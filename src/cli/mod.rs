mod defaults;
mod fingerprint;
mod shared;
mod utils;

use camino::Utf8Path;
use clap::Parser;
use simple_error::{SimpleResult, bail};

pub use self::fingerprint::FingerprintSettings;
use self::fingerprint::validate_and_fix_fingerprint_settings;
pub use self::shared::SharedSettings;
use self::shared::validate_and_fix_shared_settings;

#[derive(Parser)]
#[command(
    author,
    version,
    about,
    help_template = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}"
)]
#[clap(rename_all = "kebab_case")]
pub struct Settings {
    #[command(flatten)]
    pub shared: SharedSettings,

    #[command(flatten)]
    pub fingerprint: FingerprintSettings,
}

impl Settings {
    pub fn get_output_dir(&self) -> &Utf8Path {
        &self.fingerprint.output_dir
    }
}

/// Checks if a directory does not exist
///
pub fn check_novel_dirname(dirname: &Utf8Path, label: &str) -> SimpleResult<()> {
    if dirname.exists() {
        bail!("{label} already exists: \"{dirname}\"");
    }
    Ok(())
}

/// Validate settings and update parameters that can't be processed by clap
///
pub fn validate_and_fix_settings_impl(mut settings: Settings) -> SimpleResult<Settings> {
    settings.shared = validate_and_fix_shared_settings(settings.shared)?;
    settings.fingerprint = validate_and_fix_fingerprint_settings(settings.fingerprint)?;
    Ok(settings)
}

/// Validate settings and update to parameters that can't be processed automatically by clap.
///
pub fn validate_and_fix_settings(settings: Settings) -> Settings {
    match validate_and_fix_settings_impl(settings) {
        Ok(x) => x,
        Err(msg) => {
            eprintln!("Invalid command-line setting: {msg}");
            std::process::exit(exitcode::USAGE);
        }
    }
}

pub fn parse_settings() -> Settings {
    Settings::parse()
}

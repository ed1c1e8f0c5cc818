use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

mod config;
mod info;
mod profile;
mod recode;
mod show;

pub use profile::Profile;

use recode::RecodeOptions;
use show::RecordKey;

/// mzcodec - streaming indexed mzML tools
#[derive(Parser)]
#[command(name = "mzcodec")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Verbosity level (-v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Encoding profile for recoding.
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum ProfileArg {
    /// 64-bit zlib everywhere
    Lossless,
    /// 32-bit intensities
    Compact,
    /// MS-Numpress with error tolerances
    Numpress,
}

impl From<ProfileArg> for Profile {
    fn from(arg: ProfileArg) -> Self {
        match arg {
            ProfileArg::Lossless => Profile::Lossless,
            ProfileArg::Compact => Profile::Compact,
            ProfileArg::Numpress => Profile::Numpress,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Display root element, index status and record counts
    Info {
        /// Input mzML file path (plain or gzip)
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Print one spectrum or chromatogram
    Show {
        /// Input mzML file path (plain or gzip)
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Show a chromatogram instead of a spectrum
        #[arg(long)]
        chromatogram: bool,

        /// Position of the record in its list (default: 0)
        #[arg(short, long, conflicts_with = "id")]
        index: Option<usize>,

        /// Native id of the record
        #[arg(long)]
        id: Option<String>,

        /// Decode and print the binary arrays
        #[arg(short, long)]
        binary: bool,

        /// Print the record as JSON
        #[arg(long)]
        json: bool,
    },

    /// Re-encode an mzML file into indexed mzML
    Recode {
        /// Input mzML file path (plain or gzip)
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// Output mzML file path
        #[arg(value_name = "OUTPUT")]
        output: PathBuf,

        /// Encoding profile (lossless, compact, numpress)
        #[arg(short = 'p', long, value_enum)]
        profile: Option<ProfileArg>,

        /// Load settings from a TOML config file
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Worker threads for rendering records
        #[arg(short = 't', long)]
        threads: Option<usize>,

        /// Records rendered per batch
        #[arg(short = 'b', long)]
        batch_size: Option<usize>,

        /// Leave out records that fail to convert instead of aborting
        #[arg(long)]
        skip_failures: bool,

        /// Write plain mzML without the offset index
        #[arg(long)]
        no_index: bool,
    },
}

impl Cli {
    pub fn verbosity(&self) -> u8 {
        self.verbose
    }
}

pub fn init_logging(verbosity: u8) {
    let log_level = match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();
}

pub fn dispatch(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Info { file } => info::run(file),
        Commands::Show {
            file,
            chromatogram,
            index,
            id,
            binary,
            json,
        } => {
            let key = match id {
                Some(id) => RecordKey::Id(id),
                None => RecordKey::Ordinal(index.unwrap_or(0)),
            };
            show::run(file, chromatogram, key, binary, json)
        }
        Commands::Recode {
            input,
            output,
            profile,
            config,
            threads,
            batch_size,
            skip_failures,
            no_index,
        } => recode::run(
            input,
            output,
            RecodeOptions {
                profile: profile.map(Profile::from),
                config,
                threads,
                batch_size,
                skip_failures,
                no_index,
            },
        ),
    }
}

/// Status word, colored when the terminal supports it
#[cfg(feature = "colorized_output")]
fn styled(text: &str, ok: bool) -> String {
    let style = if ok { console::style(text).green() } else { console::style(text).yellow() };
    style.bold().to_string()
}

#[cfg(not(feature = "colorized_output"))]
fn styled(text: &str, _ok: bool) -> String {
    text.to_string()
}

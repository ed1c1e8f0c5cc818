//! # mzcodec
//!
//! Command line front end for the mzcodec library.
//!
//! ## Usage
//!
//! ```bash
//! # Root element, index status and record counts
//! mzcodec info run.mzML
//!
//! # One spectrum, arrays included, as JSON
//! mzcodec show run.mzML --id "scan=42" --binary --json
//!
//! # Re-encode with MS-Numpress on four threads
//! mzcodec recode run.mzML.gz run.numpress.mzML -p numpress -t 4
//! ```

use anyhow::Result;
use clap::Parser;

mod cli;

use cli::Cli;

fn main() -> Result<()> {
    let cli = Cli::parse();
    cli::init_logging(cli.verbosity());
    cli::dispatch(cli)
}

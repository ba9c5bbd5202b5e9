//! Determine which processes are keeping files open.
//!
//! ```text
//! fileuser [-license] [-b] [-s] <file>...
//! ```
//!
//! Exits non-zero only when the run cannot start; per-file failures are
//! reported on stderr and the remaining files are still processed.

use std::ffi::OsString;
use std::io;
use std::path::Path;
use std::process::ExitCode;

use clap::Parser;

use fileuser::config::FileUserConfig;
use fileuser::logging::{log_set_stderr, LogLevel};
use fileuser::owners::Reporter;
use fileuser::session::Session;
use fileuser::{FileUserError, MatchFlags, PlatformOwnerQuery};

const HELP_TEXT: &str = "
Determine which processes are keeping files open.

FILEUSER [-license] [-b] [-s] <file>...

   -b             Use basic search criteria for files only
   -s             Process files from all subdirectories
";

const LICENSE_TEXT: &str = "Copyright (c) 2018

Permission is hereby granted, free of charge, to any person obtaining a copy
of this software and associated documentation files (the \"Software\"), to deal
in the Software without restriction, including without limitation the rights
to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
copies of the Software, and to permit persons to whom the Software is
furnished to do so, subject to the following conditions:

The above copyright notice and this permission notice shall be included in
all copies or substantial portions of the Software.

THE SOFTWARE IS PROVIDED \"AS IS\", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN
THE SOFTWARE.
";

#[derive(Parser, Debug)]
#[command(
    name = "fileuser",
    disable_help_flag = true,
    disable_version_flag = true,
    args_override_self = true
)]
struct Cli {
    /// Use basic search criteria for files only
    #[arg(short = 'b')]
    basic: bool,

    /// Process files from all subdirectories
    #[arg(short = 's')]
    recursive: bool,

    #[arg(short = '?')]
    help: bool,

    #[arg(long)]
    license: bool,

    paths: Vec<OsString>,
}

/// Rewrites `-x` style options (and `/x` on Windows) into what clap
/// expects. Options are only recognized before the first path; unknown ones
/// are returned so the caller can warn about them. On other platforms a
/// leading `/` starts an absolute path.
fn normalize_args<I>(args: I) -> (Vec<OsString>, Vec<OsString>)
where
    I: IntoIterator<Item = OsString>,
{
    let mut args = args.into_iter();
    let mut normalized: Vec<OsString> = args.next().into_iter().collect();
    let mut ignored = Vec::new();

    while let Some(arg) = args.next() {
        let Some(option) = arg.to_str().and_then(option_text) else {
            normalized.push("--".into());
            normalized.push(arg);
            normalized.extend(args.by_ref());
            break;
        };
        let flag = match option.to_ascii_lowercase().as_str() {
            "?" => "-?",
            "license" => "--license",
            "b" => "-b",
            "s" => "-s",
            _ => {
                ignored.push(arg);
                continue;
            }
        };
        normalized.push(flag.into());
    }
    (normalized, ignored)
}

fn option_text(arg: &str) -> Option<&str> {
    if arg.len() < 2 {
        return None;
    }
    arg.strip_prefix('-')
        .or_else(|| if cfg!(windows) { arg.strip_prefix('/') } else { None })
}

fn print_help() {
    println!("FileUser {}", env!("CARGO_PKG_VERSION"));
    print!("{HELP_TEXT}");
}

fn run(cli: Cli, config: FileUserConfig) -> Result<(), FileUserError> {
    let query = PlatformOwnerQuery::new()?;
    let config = config.with_match_flags(MatchFlags {
        recursive: cli.recursive,
        basic_expansion: cli.basic,
    });
    let mut session = Session::new(query, &config)?;
    if cli.paths.is_empty() {
        return Err(FileUserError::MissingArgument);
    }

    let stdout = io::stdout();
    let stderr = io::stderr();
    let mut reporter = Reporter::new(stdout.lock(), stderr.lock());
    for arg in &cli.paths {
        let summary = session.process_argument(arg, &mut reporter)?;
        log::debug!(
            "{}: {} candidates, {} opened, fallback {}",
            Path::new(arg).display(),
            summary.candidates.len(),
            summary.opened,
            summary.used_fallback
        );
    }
    reporter.flush()?;

    let stats = session.stats();
    log::info!(
        "{} paths, {} owners, {} open failures, {} query failures",
        stats.paths,
        stats.owners,
        stats.open_failures,
        stats.query_failures
    );
    Ok(())
}

fn main() -> ExitCode {
    let config = FileUserConfig::from_env();
    if config.log_level != LogLevel::Off {
        if let Err(err) = log_set_stderr(config.log_level) {
            eprintln!("fileuser: {err}");
        }
    }

    let (args, ignored) = normalize_args(std::env::args_os());
    for arg in ignored {
        eprintln!("Argument not understood, ignored: {}", arg.to_string_lossy());
    }

    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return ExitCode::FAILURE;
        }
    };

    if cli.help {
        print_help();
        return ExitCode::SUCCESS;
    }
    if cli.license {
        print!("{LICENSE_TEXT}");
        return ExitCode::SUCCESS;
    }

    match run(cli, config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("fileuser: {err}");
            ExitCode::FAILURE
        }
    }
}

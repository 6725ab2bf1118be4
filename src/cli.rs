//! Command-line argument parsing for the `venus-sim` binary.

use std::env;
use std::path::PathBuf;

/// Run length used when neither `--duration` nor `--serve` is given (s).
pub const DEFAULT_DURATION_SECS: u64 = 60;
pub const DEFAULT_STATUS_EVERY_SECS: u64 = 10;
pub const DEFAULT_PORT: u16 = 3000;

#[derive(Debug, Clone, PartialEq)]
pub struct CliOptions {
    pub config: Option<PathBuf>,
    pub preset: Option<String>,
    /// Overrides `battery.initial_soc`.
    pub soc: Option<f64>,
    /// Stop after this many seconds; `None` with `--serve` runs until Ctrl-C.
    pub duration_secs: Option<u64>,
    pub status_every_secs: u64,
    pub telemetry_out: Option<PathBuf>,
    pub serve: bool,
    pub port: u16,
    pub help: bool,
}

impl Default for CliOptions {
    fn default() -> Self {
        Self {
            config: None,
            preset: None,
            soc: None,
            duration_secs: None,
            status_every_secs: DEFAULT_STATUS_EVERY_SECS,
            telemetry_out: None,
            serve: false,
            port: DEFAULT_PORT,
            help: false,
        }
    }
}

impl CliOptions {
    /// How long the binary should run, or `None` to run until interrupted.
    pub fn run_for_secs(&self) -> Option<u64> {
        match (self.duration_secs, self.serve) {
            (Some(secs), _) => Some(secs),
            (None, true) => None,
            (None, false) => Some(DEFAULT_DURATION_SECS),
        }
    }
}

pub fn parse_args() -> Result<CliOptions, String> {
    let args: Vec<String> = env::args().skip(1).collect();
    parse_args_from(&args)
}

/// Parses arguments (without the program name).
///
/// # Errors
///
/// Returns a message describing the first unusable argument.
pub fn parse_args_from(args: &[String]) -> Result<CliOptions, String> {
    let mut opts = CliOptions::default();
    let mut i = 0usize;

    while i < args.len() {
        match args[i].as_str() {
            "--config" => {
                i += 1;
                let path = args.next_or_err(i, "missing value for --config (expected a TOML file path)")?;
                if opts.config.replace(PathBuf::from(path)).is_some() {
                    return Err("--config provided more than once".to_string());
                }
            }
            "--preset" => {
                i += 1;
                let name = args.next_or_err(i, "missing value for --preset (expected a preset name)")?;
                if opts.preset.replace(name.to_string()).is_some() {
                    return Err("--preset provided more than once".to_string());
                }
            }
            "--soc" => {
                i += 1;
                let raw = args.next_or_err(i, "missing value for --soc (expected 0-100)")?;
                let soc: f64 = raw
                    .parse()
                    .map_err(|_| format!("--soc value \"{raw}\" is not a number"))?;
                if !(0.0..=100.0).contains(&soc) {
                    return Err(format!("--soc must be within 0-100 (got {soc})"));
                }
                opts.soc = Some(soc);
            }
            "--duration" => {
                i += 1;
                let raw = args.next_or_err(i, "missing value for --duration (expected seconds)")?;
                opts.duration_secs = Some(parse_u64("--duration", raw)?);
            }
            "--status-every" => {
                i += 1;
                let raw = args.next_or_err(i, "missing value for --status-every (expected seconds)")?;
                let secs = parse_u64("--status-every", raw)?;
                if secs == 0 {
                    return Err("--status-every must be > 0".to_string());
                }
                opts.status_every_secs = secs;
            }
            "--telemetry-out" => {
                i += 1;
                let path = args.next_or_err(i, "missing value for --telemetry-out (expected a file path)")?;
                if opts.telemetry_out.replace(PathBuf::from(path)).is_some() {
                    return Err("--telemetry-out provided more than once".to_string());
                }
            }
            "--serve" => opts.serve = true,
            "--port" => {
                i += 1;
                let raw = args.next_or_err(i, "missing value for --port (expected a u16)")?;
                opts.port = raw
                    .parse()
                    .map_err(|_| format!("--port value \"{raw}\" is not a valid u16"))?;
            }
            "--help" | "-h" => opts.help = true,
            other => return Err(format!("unknown argument: {other}")),
        }
        i += 1;
    }

    if opts.config.is_some() && opts.preset.is_some() {
        return Err(
            "arguments `--config` and `--preset` are mutually exclusive; choose one source"
                .to_string(),
        );
    }

    Ok(opts)
}

fn parse_u64(flag: &str, raw: &str) -> Result<u64, String> {
    raw.parse()
        .map_err(|_| format!("{flag} value \"{raw}\" is not a whole number of seconds"))
}

trait SliceArgExt {
    fn next_or_err(&self, index: usize, err: &str) -> Result<&str, String>;
}

impl SliceArgExt for [String] {
    fn next_or_err(&self, index: usize, err: &str) -> Result<&str, String> {
        self.get(index)
            .map(String::as_str)
            .ok_or_else(|| err.to_string())
    }
}

pub fn print_usage() {
    eprintln!("venus-sim: simulated Marstek Venus home battery");
    eprintln!();
    eprintln!("Usage: venus-sim [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --config <path>          Load simulator config from a TOML file");
    eprintln!("  --preset <name>          Use a built-in preset (baseline, venus_d, quiet)");
    eprintln!("  --soc <pct>              Override the initial state of charge");
    eprintln!("  --duration <s>           Stop after this many seconds (default: {DEFAULT_DURATION_SECS})");
    eprintln!("  --status-every <s>       Status log interval (default: {DEFAULT_STATUS_EVERY_SECS})");
    eprintln!("  --telemetry-out <path>   Export sampled snapshots to CSV");
    eprintln!("  --serve                  Serve the HTTP debug API (needs the `api` feature)");
    eprintln!("  --port <u16>             HTTP port (default: {DEFAULT_PORT})");
    eprintln!("  --help                   Show this help message");
}

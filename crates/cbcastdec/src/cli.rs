use std::fmt::Display;

use clap::{error::ErrorKind, CommandFactory, Parser};

/// Standard input filename
const STDIN_FILE: &str = "-";

const USAGE_SHORT: &str = r#"
This program accepts hex-encoded cell broadcast PDUs, one per line, decodes them, and prints the dispatch decision for each. Lines are "gsm:<hex>" or "cdma:<category-hex>:<hex>"; bare hex is treated as GSM.

See --help for more details.
"#;

const USAGE_LONG: &str = r#"
This program accepts hex-encoded cell broadcast PDUs, one per line, decodes them, and prints the dispatch decision for each.

Line formats:

    gsm:<hex>                   a 3GPP SMS-CB PDU
    cdma:<category-hex>:<hex>   CDMA bearer data with its service category
    <hex>                       shorthand for gsm:<hex>

Blank lines and lines starting with '#' are ignored. Example:

    echo gsm:C0000032401141D071DA0491CBE670 | cbcastdec

Geofenced alerts need a location fix. Provide one with --lat/--lng/--accuracy and it will be used to answer every location request; without one, geofenced alerts fail open and are dispatched when the input ends.

Decisions are printed one per line:

    DISPATCH <message>
    DROP <message>          (confidently outside the target area)
    DUPLICATE
    ASSEMBLING              (multi-page message still incomplete)
    REJECT <error>          (undecodable payload)
"#;

/// Top-level program arguments
#[derive(Parser, Clone, Debug)]
#[command(version)]
#[command(about, long_about = None)]
#[command(after_help = USAGE_SHORT, after_long_help = USAGE_LONG)]
#[command(max_term_width = 100)]
pub struct Args {
    /// Verbosity level (-vvv for more)
    #[arg(short, long, default_value_t = 0, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Print NOTHING, not even decisions
    #[arg(short, long)]
    pub quiet: bool,

    /// Input file (or "-" for stdin)
    #[arg(long, default_value_t = STDIN_FILE.to_string())]
    pub file: String,

    /// SIM slot index the messages arrive on
    #[arg(long, default_value_t = 0)]
    pub slot: i32,

    /// Serving PLMN (MCC+MNC)
    #[arg(long, default_value_t = String::from("00101"))]
    pub plmn: String,

    /// Serving location area code
    #[arg(long, default_value_t = 0)]
    pub lac: i32,

    /// Serving cell id
    #[arg(long, default_value_t = 0)]
    pub cid: i32,

    /// Geofence distance threshold (meters)
    #[arg(long, default_value_t = 1000.0)]
    pub threshold: f64,

    /// Default wait for a location fix (seconds)
    #[arg(long, default_value_t = 30)]
    pub max_wait: u32,

    /// Decode octet-encoded payloads as Latin-1 instead of UTF-8
    #[arg(long)]
    pub latin1: bool,

    /// Require identical body text for duplicate matches
    #[arg(long)]
    pub compare_body: bool,

    /// Device latitude, for answering geofence location requests
    #[arg(long)]
    #[arg(requires = "lng")]
    #[arg(requires = "accuracy")]
    pub lat: Option<f64>,

    /// Device longitude
    #[arg(long, requires = "lat")]
    pub lng: Option<f64>,

    /// Fix accuracy radius (meters)
    #[arg(long, requires = "lat")]
    pub accuracy: Option<f64>,
}

impl Args {
    /// Return true if the user requests input from stdin
    pub fn input_is_stdin(&self) -> bool {
        self.file == STDIN_FILE
    }

    /// The fixed location fix, if one was given
    pub fn fix(&self) -> Option<cbcast::LocationFix> {
        match (self.lat, self.lng, self.accuracy) {
            (Some(lat), Some(lng), Some(accuracy)) => {
                Some(cbcast::LocationFix::new(lat, lng, accuracy))
            }
            _ => None,
        }
    }
}

/// A program-level error with exit code
#[derive(Debug)]
pub struct CliError {
    error: anyhow::Error,
    exit_code: i32,
}

impl CliError {
    /// Create new error with a custom exit code
    pub fn new(error: anyhow::Error, code: i32) -> CliError {
        CliError {
            error,
            exit_code: code,
        }
    }

    /// Print this error to the terminal
    ///
    /// Errors from clap are printed verbatim. Other types of errors
    /// are printed indirectly via clap's fancy formatter.
    pub fn print(&self) -> std::io::Result<()> {
        if let Some(e) = self.error.downcast_ref::<clap::Error>() {
            e.print()
        } else {
            Args::command()
                .error(ErrorKind::Format, self.to_string())
                .print()
        }
    }

    /// Print this error to the terminal and exit
    pub fn exit(&self) -> ! {
        drop(self.print());
        std::process::exit(self.exit_code);
    }
}

impl Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.error)
    }
}

impl std::error::Error for CliError {}

impl From<anyhow::Error> for CliError {
    fn from(err: anyhow::Error) -> CliError {
        CliError::new(err, 1)
    }
}

impl From<clap::Error> for CliError {
    fn from(err: clap::Error) -> CliError {
        let code = if err.use_stderr() { 1 } else { 0 };
        CliError::new(err.into(), code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clap() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }
}

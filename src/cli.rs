//! Command-line configuration

use clap::Parser;
use handsignal_shared::{link, LineEnding};
use std::time::Duration;

use crate::connection::SessionConfig;
use crate::input::InputSource;
use crate::transport::HotplugConfig;

#[derive(Parser, Debug, Clone)]
#[command(name = "handsignal")]
#[command(about = "Stream hand gestures as finger-state commands over a serial port")]
pub struct Cli {
    /// Serial port to open whenever it is present
    #[arg(short, long)]
    pub port: Option<String>,

    #[arg(short, long, default_value_t = link::DEFAULT_BAUD_RATE)]
    pub baud: u32,

    /// Command delimiter: lf or crlf
    #[arg(long, default_value = "lf")]
    pub line_ending: LineEnding,

    /// Wait for a selection instead of opening the first port found
    #[arg(long)]
    pub no_auto_open: bool,

    /// Only list USB serial devices
    #[arg(long)]
    pub usb_only: bool,

    /// Port list polling interval for hot-plug detection
    #[arg(long, default_value_t = 500)]
    pub poll_interval_ms: u64,

    /// Abandon an open attempt after this many milliseconds
    #[arg(long)]
    pub open_timeout_ms: Option<u64>,

    /// NDJSON input file, `-` for stdin
    #[arg(short, long, default_value = "-")]
    pub input: String,

    #[arg(short, long, help = "Enable debug logging")]
    pub verbose: bool,
}

impl Cli {
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            baud_rate: self.baud,
            line_ending: self.line_ending,
            preferred_port: self.port.clone(),
            auto_open_any: !self.no_auto_open,
            open_timeout: self.open_timeout_ms.map(Duration::from_millis),
        }
    }

    pub fn hotplug_config(&self) -> HotplugConfig {
        HotplugConfig {
            poll_interval: Duration::from_millis(self.poll_interval_ms.max(1)),
        }
    }

    pub fn input_source(&self) -> InputSource {
        InputSource::from_arg(&self.input)
    }

    /// Default log filter when `RUST_LOG` is unset
    pub fn log_filter(&self) -> &'static str {
        if self.verbose {
            "handsignal=debug,handsignal_shared=debug,info"
        } else {
            "info"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["handsignal"]).unwrap();
        let config = cli.session_config();

        assert_eq!(config.baud_rate, 9600);
        assert_eq!(config.line_ending, LineEnding::Lf);
        assert!(config.preferred_port.is_none());
        assert!(config.auto_open_any);
        assert!(config.open_timeout.is_none());
        assert_eq!(cli.hotplug_config().poll_interval, Duration::from_millis(500));
        assert_eq!(cli.input_source(), InputSource::Stdin);
        assert_eq!(cli.log_filter(), "info");
    }

    #[test]
    fn test_flags() {
        let cli = Cli::try_parse_from([
            "handsignal",
            "--port",
            "/dev/ttyUSB0",
            "--baud",
            "115200",
            "--line-ending",
            "crlf",
            "--no-auto-open",
            "--open-timeout-ms",
            "2000",
            "--input",
            "frames.jsonl",
            "-v",
        ])
        .unwrap();
        let config = cli.session_config();

        assert_eq!(config.preferred_port.as_deref(), Some("/dev/ttyUSB0"));
        assert_eq!(config.baud_rate, 115200);
        assert_eq!(config.line_ending, LineEnding::CrLf);
        assert!(!config.auto_open_any);
        assert_eq!(config.open_timeout, Some(Duration::from_secs(2)));
        assert_eq!(
            cli.input_source(),
            InputSource::File(PathBuf::from("frames.jsonl"))
        );
        assert!(cli.verbose);
    }

    #[test]
    fn test_rejects_unknown_line_ending() {
        assert!(Cli::try_parse_from(["handsignal", "--line-ending", "cr"]).is_err());
    }
}

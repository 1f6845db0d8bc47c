use clap::builder::TypedValueParser;
use clap::{Arg, ArgAction, Command};

use desktop_wallpaper::{LinuxDesktop, Mode};

#[derive(Clone)]
pub struct ModeValueParser;

impl TypedValueParser for ModeValueParser {
    type Value = Mode;
    fn parse_ref(&self, _cmd: &Command, _arg: Option<&Arg>, value: &std::ffi::OsStr) -> Result<Self::Value, clap::Error> {
        use clap::error::{Error, ErrorKind};
        value
            .to_string_lossy()
            .parse::<Mode>()
            .map_err(|e| Error::raw(ErrorKind::InvalidValue, format!("{}\n", e)))
    }
}

#[derive(Clone)]
pub struct DesktopValueParser;

impl TypedValueParser for DesktopValueParser {
    type Value = LinuxDesktop;
    fn parse_ref(&self, _cmd: &Command, _arg: Option<&Arg>, value: &std::ffi::OsStr) -> Result<Self::Value, clap::Error> {
        use clap::error::{Error, ErrorKind};
        value.to_string_lossy().parse::<LinuxDesktop>().map_err(|_| {
            let names: Vec<&str> = LinuxDesktop::ALL.iter().map(|d| d.name()).collect();
            Error::raw(ErrorKind::InvalidValue, format!("Unknown desktop, use one of {}\n", names.join(", ")))
        })
    }
}

fn json_flag() -> Arg {
    Arg::new("json")
        .long("json")
        .action(ArgAction::SetTrue)
        .help("Print JSON instead of plain text")
}

pub fn build() -> Command {
    Command::new("wallpaper")
        .about("Get or set the desktop wallpaper")
        .version(env!("CARGO_PKG_VERSION"))
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::Count)
                .global(true)
                .help("Log more (-v info, -vv debug)"),
        )
        .arg(
            Arg::new("log-file")
                .long("log-file")
                .value_name("PATH")
                .global(true)
                .help("Write the log to a file instead of stderr"),
        )
        .arg(
            Arg::new("desktop")
                .long("desktop")
                .value_name("NAME")
                .global(true)
                .value_parser(DesktopValueParser)
                .help("Skip desktop detection (gnome, kde, xfce, wayland, i3, ...)"),
        )
        .arg(
            Arg::new("cache-dir")
                .long("cache-dir")
                .value_name("DIR")
                .global(true)
                .help("Where downloaded images are stored"),
        )
        .subcommand(Command::new("get").about("Print the current wallpaper path").arg(json_flag()))
        .subcommand(
            Command::new("set")
                .about("Set the wallpaper from a file or an http(s) URL")
                .arg(Arg::new("target").required(true).value_name("PATH|URL")),
        )
        .subcommand(
            Command::new("mode")
                .about("Set how the wallpaper is scaled: center, crop, fit, span, stretch or tile")
                .arg(Arg::new("mode").required(true).value_parser(ModeValueParser)),
        )
        .subcommand(Command::new("detect").about("Print the detected platform").arg(json_flag()))
}

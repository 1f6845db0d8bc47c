use std::env;
use std::path::PathBuf;
use std::process;

use clap::ArgMatches;
use log::{error, LevelFilter};
use serde_derive::Serialize;

use desktop_wallpaper::{LinuxDesktop, Mode, PlatformContext, Result, Wallpaper};

mod cli;

#[derive(Serialize)]
struct CurrentWallpaper<'a> {
    path: PathBuf,
    platform: &'a PlatformContext,
}

fn main() {
    let matches = cli::build().get_matches();

    if let Err(e) = init_logging(&matches) {
        eprintln!("Could not start logging: {}", e);
    }

    if let Err(e) = run(&matches) {
        error!("{}", e);
        eprintln!("{}", e);
        process::exit(1);
    }
}

fn init_logging(matches: &ArgMatches) -> std::io::Result<()> {
    let level = match matches.get_count("verbose") {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };
    match matches.get_one::<String>("log-file") {
        Some(path) => simple_logging::log_to_file(path, level),
        None => {
            simple_logging::log_to_stderr(level);
            Ok(())
        }
    }
}

fn run(matches: &ArgMatches) -> Result<()> {
    let context = match matches.get_one::<LinuxDesktop>("desktop") {
        Some(desktop) => PlatformContext::linux(*desktop),
        None => PlatformContext::current().clone(),
    };

    let (command, sub) = match matches.subcommand() {
        Some(pair) => pair,
        None => return Ok(()),
    };

    if command == "detect" {
        print_json_or(sub, &context, || context.to_string())?;
        return Ok(());
    }

    let mut wallpaper = Wallpaper::new(&context)?;
    if let Some(dir) = matches.get_one::<String>("cache-dir") {
        wallpaper = wallpaper.with_cache_dir(PathBuf::from(dir));
    }

    match command {
        "get" => {
            let path = wallpaper.get()?;
            let current = CurrentWallpaper { path, platform: &context };
            print_json_or(sub, &current, || current.path.display().to_string())?;
        }
        "set" => {
            let target = sub.get_one::<String>("target").map(String::as_str).unwrap_or_default();
            if target.starts_with("http://") || target.starts_with("https://") {
                wallpaper.set_from_url(target)?;
            } else {
                let path = PathBuf::from(target);
                let path = if path.is_absolute() { path } else { env::current_dir()?.join(path) };
                wallpaper.set_from_file(&path)?;
            }
        }
        "mode" => {
            if let Some(mode) = sub.get_one::<Mode>("mode") {
                wallpaper.set_mode(*mode)?;
            }
        }
        _ => {}
    }
    Ok(())
}

fn print_json_or<T, F>(sub: &ArgMatches, value: &T, plain: F) -> Result<()>
where
    T: serde::Serialize,
    F: FnOnce() -> String,
{
    if sub.get_flag("json") {
        let json = serde_json::to_string_pretty(value).map_err(std::io::Error::from)?;
        println!("{}", json);
    } else {
        println!("{}", plain());
    }
    Ok(())
}

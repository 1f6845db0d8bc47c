//! Linux desktops. Each family is driven through its own settings tool, or,
//! on bare compositors and window managers, through a helper binary.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use reqwest::Url;

use crate::command::CommandRunner;
use crate::error::{Error, Result};
use crate::mode::Mode;
use crate::platform::LinuxDesktop;
use crate::Backend;

const GNOME_SCHEMA: &str = "org.gnome.desktop.background";
const KDE_APPLETS_RC: &str = "plasma-org.kde.plasma.desktop-appletsrc";
const KDE_WALLPAPER_GROUP: &str = "[Wallpaper][org.kde.image][General]";
const LXDE_CONFIG: &str = "pcmanfm/LXDE/desktop-items-0.conf";
const XFCE_CHANNEL: &str = "xfce4-desktop";
const XFCE_DEFAULT_IMAGE_PROP: &str = "/backdrop/screen0/monitor0/workspace0/last-image";

/// dconf locations of the picture and its options.
struct DconfKeys {
    picture: &'static str,
    options: &'static str,
    /// The picture key holds a `file://` URI rather than a bare path.
    uri: bool,
}

const CINNAMON_KEYS: DconfKeys = DconfKeys {
    picture: "/org/cinnamon/desktop/background/picture-uri",
    options: "/org/cinnamon/desktop/background/picture-options",
    uri: true,
};

const MATE_KEYS: DconfKeys = DconfKeys {
    picture: "/org/mate/desktop/background/picture-filename",
    options: "/org/mate/desktop/background/picture-options",
    uri: false,
};

const DEEPIN_KEYS: DconfKeys = DconfKeys {
    picture: "/com/deepin/wrap/gnome/desktop/background/picture-uri",
    options: "/com/deepin/wrap/gnome/desktop/background/picture-options",
    uri: true,
};

pub struct LinuxBackend<R> {
    desktop: LinuxDesktop,
    runner: R,
    config_dir: PathBuf,
    home_dir: PathBuf,
    proc_dir: PathBuf,
}

impl<R: CommandRunner> LinuxBackend<R> {
    /// Backend for `desktop` using the user's XDG config and home directories.
    pub fn new(desktop: LinuxDesktop, runner: R) -> Result<Self> {
        let home_dir = dirs::home_dir()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "home directory not found"))?;
        let config_dir = dirs::config_dir().unwrap_or_else(|| home_dir.join(".config"));
        Ok(LinuxBackend::with_dirs(desktop, runner, config_dir, home_dir))
    }

    pub fn with_dirs(desktop: LinuxDesktop, runner: R, config_dir: PathBuf, home_dir: PathBuf) -> Self {
        LinuxBackend {
            desktop,
            runner,
            config_dir,
            home_dir,
            proc_dir: PathBuf::from("/proc"),
        }
    }

    /// Where running processes are looked up, `/proc` unless overridden.
    pub fn with_proc_dir(mut self, proc_dir: PathBuf) -> Self {
        self.proc_dir = proc_dir;
        self
    }

    pub fn desktop(&self) -> LinuxDesktop {
        self.desktop
    }

    fn unsupported(&self, mode: Mode) -> Error {
        Error::unsupported_mode(mode, self.desktop.label())
    }

    fn no_wallpaper(&self) -> Error {
        Error::NoWallpaper { desktop: self.desktop.label().to_string() }
    }

    fn run(&self, program: &str, args: &[&str]) -> Result<String> {
        self.runner.output(program, args)
    }

    // GNOME, Budgie

    fn gnome_get(&self) -> Result<PathBuf> {
        let value = self.run("gsettings", &["get", GNOME_SCHEMA, "picture-uri"])?;
        self.non_empty(uri_to_path(&gvariant_unquote(&value)))
    }

    fn gnome_set(&self, path: &str) -> Result<()> {
        let uri = file_uri(path)?;
        self.run("gsettings", &["set", GNOME_SCHEMA, "picture-uri", uri.as_str()])?;

        // GNOME 42+ keeps a separate image for the dark style.
        if let Err(e) = self.run("gsettings", &["set", GNOME_SCHEMA, "picture-uri-dark", uri.as_str()]) {
            warn!("Could not set picture-uri-dark: {}", e);
        }
        Ok(())
    }

    fn gnome_mode(&self, mode: Mode) -> Result<()> {
        self.run("gsettings", &["set", GNOME_SCHEMA, "picture-options", mode.gnome_option()])?;
        Ok(())
    }

    // Cinnamon, MATE, Deepin

    fn dconf_get(&self, keys: &DconfKeys) -> Result<PathBuf> {
        let value = gvariant_unquote(&self.run("dconf", &["read", keys.picture])?);
        let path = if keys.uri { uri_to_path(&value) } else { PathBuf::from(value) };
        self.non_empty(path)
    }

    fn dconf_set(&self, keys: &DconfKeys, path: &str) -> Result<()> {
        let value = if keys.uri { file_uri(path)? } else { path.to_string() };
        self.run("dconf", &["write", keys.picture, gvariant_quote(&value).as_str()])?;
        Ok(())
    }

    fn dconf_mode(&self, keys: &DconfKeys, mode: Mode) -> Result<()> {
        self.run("dconf", &["write", keys.options, gvariant_quote(mode.gnome_option()).as_str()])?;
        Ok(())
    }

    // KDE Plasma

    fn kde_get(&self) -> Result<PathBuf> {
        let rc = read_optional(&self.config_dir.join(KDE_APPLETS_RC))?;
        parse_kde_image(&rc)
            .map(|image| uri_to_path(&image))
            .ok_or_else(|| self.no_wallpaper())
    }

    /// Runs a script in every desktop's image wallpaper config group.
    fn kde_eval(&self, body: &str) -> Result<()> {
        let script = format!(
            "var allDesktops = desktops();\n\
             for (var i = 0; i < allDesktops.length; i++) {{\n\
             var d = allDesktops[i];\n\
             d.wallpaperPlugin = 'org.kde.image';\n\
             d.currentConfigGroup = ['Wallpaper', 'org.kde.image', 'General'];\n\
             {}\n\
             }}\n",
            body
        );
        let args = [
            "org.kde.plasmashell",
            "/PlasmaShell",
            "org.kde.PlasmaShell.evaluateScript",
            script.as_str(),
        ];

        // Plasma 6 ships qdbus6, Plasma 5 ships qdbus.
        match self.run("qdbus6", &args) {
            Err(Error::HelperNotFound { .. }) => self.run("qdbus", &args).map(|_| ()),
            other => other.map(|_| ()),
        }
    }

    fn kde_set(&self, path: &str) -> Result<()> {
        let uri = serde_json::to_string(&file_uri(path)?).map_err(io::Error::from)?;
        self.kde_eval(&format!("d.writeConfig('Image', {});", uri))
    }

    fn kde_mode(&self, mode: Mode) -> Result<()> {
        let fill = mode.kde_fill_mode().ok_or_else(|| self.unsupported(mode))?;
        self.kde_eval(&format!("d.writeConfig('FillMode', {});", fill))
    }

    // XFCE

    /// Every `last-image` property, one per monitor and workspace.
    fn xfce_image_props(&self) -> Result<Vec<String>> {
        let listing = self.run("xfconf-query", &["--channel", XFCE_CHANNEL, "--list"])?;
        Ok(listing
            .lines()
            .map(str::trim)
            .filter(|p| p.ends_with("/last-image"))
            .map(str::to_string)
            .collect())
    }

    fn xfce_props_or_default(&self) -> Result<Vec<String>> {
        let props = self.xfce_image_props()?;
        if props.is_empty() {
            return Ok(vec![XFCE_DEFAULT_IMAGE_PROP.to_string()]);
        }
        Ok(props)
    }

    fn xfce_get(&self) -> Result<PathBuf> {
        let props = self.xfce_image_props()?;
        let prop = props.first().ok_or_else(|| self.no_wallpaper())?;
        let value = self.run("xfconf-query", &["--channel", XFCE_CHANNEL, "--property", prop.as_str()])?;
        self.non_empty(PathBuf::from(value.trim()))
    }

    fn xfce_set(&self, path: &str) -> Result<()> {
        for prop in self.xfce_props_or_default()? {
            self.run(
                "xfconf-query",
                &["--channel", XFCE_CHANNEL, "--property", prop.as_str(), "--create", "--type", "string", "--set", path],
            )?;
        }
        Ok(())
    }

    fn xfce_mode(&self, mode: Mode) -> Result<()> {
        let style = mode.xfce_style().to_string();
        for prop in self.xfce_props_or_default()? {
            let prop = prop.replace("/last-image", "/image-style");
            self.run(
                "xfconf-query",
                &["--channel", XFCE_CHANNEL, "--property", prop.as_str(), "--create", "--type", "int", "--set", style.as_str()],
            )?;
        }
        Ok(())
    }

    // LXDE

    fn lxde_get(&self) -> Result<PathBuf> {
        let conf = read_optional(&self.config_dir.join(LXDE_CONFIG))?;
        conf.lines()
            .filter_map(|line| line.trim().strip_prefix("wallpaper="))
            .map(|v| PathBuf::from(v.trim()))
            .find(|p| !p.as_os_str().is_empty())
            .ok_or_else(|| self.no_wallpaper())
    }

    // swaybg

    /// Image and mode of the running swaybg, if any.
    fn swaybg_running(&self) -> Result<Option<SwaybgArgs>> {
        let pids = match self.run("pgrep", &["-x", "swaybg"]) {
            Ok(out) => out,
            // pgrep exits 1 when nothing matches.
            Err(Error::CommandFailed { status: Some(1), .. }) => return Ok(None),
            Err(e) => return Err(e),
        };
        let pid = match pids.lines().map(str::trim).find(|l| !l.is_empty()) {
            Some(pid) => pid,
            None => return Ok(None),
        };

        let cmdline = match fs::read(self.proc_dir.join(pid).join("cmdline")) {
            Ok(bytes) => bytes,
            // Exited between pgrep and the read.
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let args: Vec<String> = cmdline
            .split(|&b| b == 0)
            .filter(|a| !a.is_empty())
            .map(|a| String::from_utf8_lossy(a).into_owned())
            .collect();
        Ok(Some(parse_swaybg_args(&args)))
    }

    fn swaybg_restart(&self, path: &str, mode: Mode) -> Result<()> {
        let mode_arg = mode.swaybg_mode().ok_or_else(|| self.unsupported(mode))?;

        if let Err(e) = self.run("pkill", &["-x", "swaybg"]) {
            debug!("No swaybg stopped: {}", e);
        }
        self.runner.spawn("swaybg", &["-i", path, "-m", mode_arg])
    }

    // feh

    fn fehbg(&self) -> Result<Option<FehState>> {
        let script = read_optional(&self.home_dir.join(".fehbg"))?;
        Ok(parse_fehbg(&script))
    }

    fn feh(&self, path: &str, mode: Mode) -> Result<()> {
        let flag = mode.feh_flag().ok_or_else(|| self.unsupported(mode))?;
        self.run("feh", &[flag, path])?;
        Ok(())
    }

    fn non_empty(&self, path: PathBuf) -> Result<PathBuf> {
        if path.as_os_str().is_empty() {
            return Err(self.no_wallpaper());
        }
        Ok(path)
    }
}

impl<R: CommandRunner> Backend for LinuxBackend<R> {
    fn get(&self) -> Result<PathBuf> {
        match self.desktop {
            LinuxDesktop::Gnome | LinuxDesktop::Budgie => self.gnome_get(),
            LinuxDesktop::Cinnamon => self.dconf_get(&CINNAMON_KEYS),
            LinuxDesktop::Mate => self.dconf_get(&MATE_KEYS),
            LinuxDesktop::Deepin => self.dconf_get(&DEEPIN_KEYS),
            LinuxDesktop::Kde => self.kde_get(),
            LinuxDesktop::Xfce => self.xfce_get(),
            LinuxDesktop::Lxde => self.lxde_get(),
            LinuxDesktop::Wayland => self
                .swaybg_running()?
                .and_then(|s| s.image)
                .ok_or_else(|| self.no_wallpaper()),
            LinuxDesktop::I3 => self
                .fehbg()?
                .map(|s| s.image)
                .ok_or_else(|| self.no_wallpaper()),
        }
    }

    fn set_from_file(&self, path: &Path) -> Result<()> {
        let path = path
            .to_str()
            .ok_or_else(|| Error::encoding(&path.to_string_lossy(), "path is not valid UTF-8"))?;

        info!("Setting {} wallpaper to {}", self.desktop.label(), path);
        match self.desktop {
            LinuxDesktop::Gnome | LinuxDesktop::Budgie => self.gnome_set(path),
            LinuxDesktop::Cinnamon => self.dconf_set(&CINNAMON_KEYS, path),
            LinuxDesktop::Mate => self.dconf_set(&MATE_KEYS, path),
            LinuxDesktop::Deepin => self.dconf_set(&DEEPIN_KEYS, path),
            LinuxDesktop::Kde => self.kde_set(path),
            LinuxDesktop::Xfce => self.xfce_set(path),
            LinuxDesktop::Lxde => self.run("pcmanfm", &["--set-wallpaper", path]).map(|_| ()),
            LinuxDesktop::Wayland => {
                let mode = self.swaybg_running()?.and_then(|s| s.mode).unwrap_or(Mode::Crop);
                self.swaybg_restart(path, mode)
            }
            LinuxDesktop::I3 => {
                let mode = self.fehbg()?.and_then(|s| s.mode).unwrap_or(Mode::Crop);
                self.feh(path, mode)
            }
        }
    }

    fn set_mode(&self, mode: Mode) -> Result<()> {
        info!("Setting {} wallpaper mode to {}", self.desktop.label(), mode);
        match self.desktop {
            LinuxDesktop::Gnome | LinuxDesktop::Budgie => self.gnome_mode(mode),
            LinuxDesktop::Cinnamon => self.dconf_mode(&CINNAMON_KEYS, mode),
            LinuxDesktop::Mate => self.dconf_mode(&MATE_KEYS, mode),
            LinuxDesktop::Deepin => self.dconf_mode(&DEEPIN_KEYS, mode),
            LinuxDesktop::Kde => self.kde_mode(mode),
            LinuxDesktop::Xfce => self.xfce_mode(mode),
            LinuxDesktop::Lxde => self.run("pcmanfm", &["--wallpaper-mode", mode.lxde_mode()]).map(|_| ()),
            LinuxDesktop::Wayland => {
                // The helpers only take a mode together with an image.
                mode.swaybg_mode().ok_or_else(|| self.unsupported(mode))?;
                let image = self
                    .swaybg_running()?
                    .and_then(|s| s.image)
                    .ok_or_else(|| self.no_wallpaper())?;
                self.swaybg_restart(&path_to_string(&image), mode)
            }
            LinuxDesktop::I3 => {
                mode.feh_flag().ok_or_else(|| self.unsupported(mode))?;
                let image = self.fehbg()?.map(|s| s.image).ok_or_else(|| self.no_wallpaper())?;
                self.feh(&path_to_string(&image), mode)
            }
        }
    }
}

fn path_to_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Contents of `path`, or an empty string when it does not exist.
fn read_optional(path: &Path) -> Result<String> {
    match fs::read_to_string(path) {
        Ok(s) => Ok(s),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(String::new()),
        Err(e) => Err(e.into()),
    }
}

/// Percent-encoded `file://` URI of an absolute path.
pub fn file_uri(path: &str) -> Result<String> {
    Url::from_file_path(path)
        .map(String::from)
        .map_err(|_| Error::encoding(path, "path is not absolute"))
}

/// Path of a `file://` URI, percent-decoded. Anything else is taken as a path.
pub fn uri_to_path(value: &str) -> PathBuf {
    if value.starts_with("file://") {
        if let Some(path) = Url::parse(value).ok().and_then(|u| u.to_file_path().ok()) {
            return path;
        }
        return PathBuf::from(&value["file://".len()..]);
    }
    PathBuf::from(value)
}

/// GVariant text form of a string, as `dconf write` expects.
pub fn gvariant_quote(s: &str) -> String {
    format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'"))
}

/// Reverse of `gvariant_quote`, also accepting double quotes.
pub fn gvariant_unquote(s: &str) -> String {
    let s = s.trim();
    let quoted = s.len() >= 2
        && ((s.starts_with('\'') && s.ends_with('\'')) || (s.starts_with('"') && s.ends_with('"')));
    if !quoted {
        return s.to_string();
    }

    let mut out = String::with_capacity(s.len());
    let mut chars = s[1..s.len() - 1].chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(escaped) = chars.next() {
                out.push(escaped);
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// `Image=` of the first image wallpaper group in the Plasma applets config.
pub fn parse_kde_image(rc: &str) -> Option<String> {
    let mut in_group = false;
    for line in rc.lines().map(str::trim) {
        if line.starts_with('[') {
            in_group = line.ends_with(KDE_WALLPAPER_GROUP);
        } else if in_group {
            if let Some(value) = line.strip_prefix("Image=") {
                if !value.is_empty() {
                    return Some(value.to_string());
                }
            }
        }
    }
    None
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SwaybgArgs {
    pub image: Option<PathBuf>,
    pub mode: Option<Mode>,
}

/// Reads `-i/--image` and `-m/--mode` out of a swaybg command line.
pub fn parse_swaybg_args(args: &[String]) -> SwaybgArgs {
    let mut parsed = SwaybgArgs::default();
    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-i" | "--image" => parsed.image = iter.next().map(PathBuf::from).or(parsed.image),
            "-m" | "--mode" => parsed.mode = iter.next().and_then(|m| Mode::from_swaybg_mode(m)).or(parsed.mode),
            _ => {}
        }
    }
    parsed
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FehState {
    pub image: PathBuf,
    pub mode: Option<Mode>,
}

/// Image and mode from the `~/.fehbg` script feh writes after each run.
pub fn parse_fehbg(script: &str) -> Option<FehState> {
    script
        .lines()
        .map(shell_words)
        .find(|words| words.first().map(|w| w.ends_with("feh")).unwrap_or(false))
        .and_then(|words| {
            let mode = words.iter().find_map(|w| Mode::from_feh_flag(w));
            let image = words.iter().skip(1).find(|w| !w.starts_with('-'))?;
            Some(FehState { image: PathBuf::from(image), mode })
        })
}

/// Splits a POSIX shell line into words, honouring quotes and backslashes.
pub fn shell_words(line: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut word = String::new();
    let mut in_word = false;
    let mut chars = line.trim().chars();

    while let Some(c) = chars.next() {
        match c {
            '\'' => {
                in_word = true;
                for q in chars.by_ref() {
                    if q == '\'' {
                        break;
                    }
                    word.push(q);
                }
            }
            '"' => {
                in_word = true;
                while let Some(q) = chars.next() {
                    match q {
                        '"' => break,
                        '\\' => {
                            if let Some(escaped) = chars.next() {
                                word.push(escaped);
                            }
                        }
                        _ => word.push(q),
                    }
                }
            }
            '\\' => {
                in_word = true;
                if let Some(escaped) = chars.next() {
                    word.push(escaped);
                }
            }
            '#' if !in_word => break,
            c if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut word));
                    in_word = false;
                }
            }
            c => {
                in_word = true;
                word.push(c);
            }
        }
    }
    if in_word {
        words.push(word);
    }
    words
}

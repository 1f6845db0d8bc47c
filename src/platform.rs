//! Which OS and desktop environment the process is running under.

use std::env;
use std::fmt::{Display, Error as FmtError, Formatter};
use std::str::FromStr;
use std::sync::OnceLock;

use log::debug;
use serde_derive::{Deserialize, Serialize};

use crate::error::Error;

/// Environment variable that overrides desktop detection.
pub const DESKTOP_OVERRIDE_VAR: &str = "WALLPAPER_DESKTOP";

/// Linux (and other freedesktop) desktop families with a wallpaper backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinuxDesktop {
    /// GNOME, Unity and Pantheon.
    Gnome,
    Budgie,
    Cinnamon,
    Mate,
    Deepin,
    Kde,
    Xfce,
    Lxde,
    /// Any wlroots-style compositor, through the `swaybg` helper.
    Wayland,
    /// i3 or any other bare X11 window manager, through `feh`.
    I3,
}

impl LinuxDesktop {
    pub const ALL: [LinuxDesktop; 10] = [
        LinuxDesktop::Gnome,
        LinuxDesktop::Budgie,
        LinuxDesktop::Cinnamon,
        LinuxDesktop::Mate,
        LinuxDesktop::Deepin,
        LinuxDesktop::Kde,
        LinuxDesktop::Xfce,
        LinuxDesktop::Lxde,
        LinuxDesktop::Wayland,
        LinuxDesktop::I3,
    ];

    pub fn name(self) -> &'static str {
        match self {
            LinuxDesktop::Gnome => "gnome",
            LinuxDesktop::Budgie => "budgie",
            LinuxDesktop::Cinnamon => "cinnamon",
            LinuxDesktop::Mate => "mate",
            LinuxDesktop::Deepin => "deepin",
            LinuxDesktop::Kde => "kde",
            LinuxDesktop::Xfce => "xfce",
            LinuxDesktop::Lxde => "lxde",
            LinuxDesktop::Wayland => "wayland",
            LinuxDesktop::I3 => "i3",
        }
    }

    /// Human readable name, used in error messages.
    pub fn label(self) -> &'static str {
        match self {
            LinuxDesktop::Gnome => "GNOME",
            LinuxDesktop::Budgie => "Budgie",
            LinuxDesktop::Cinnamon => "Cinnamon",
            LinuxDesktop::Mate => "MATE",
            LinuxDesktop::Deepin => "Deepin",
            LinuxDesktop::Kde => "KDE Plasma",
            LinuxDesktop::Xfce => "XFCE",
            LinuxDesktop::Lxde => "LXDE",
            LinuxDesktop::Wayland => "Wayland (swaybg)",
            LinuxDesktop::I3 => "X11 (feh)",
        }
    }

    /// Matches one session identifier token, e.g. `X-Cinnamon` or `ubuntu`.
    fn from_token(token: &str) -> Option<LinuxDesktop> {
        let token = token.trim().to_ascii_lowercase();
        let desktop = match token.as_str() {
            "gnome" | "gnome-classic" | "gnome-flashback" | "ubuntu" | "unity" | "pantheon" => {
                LinuxDesktop::Gnome
            }
            "budgie" | "budgie-desktop" => LinuxDesktop::Budgie,
            "x-cinnamon" | "cinnamon" => LinuxDesktop::Cinnamon,
            "mate" => LinuxDesktop::Mate,
            "deepin" | "dde" => LinuxDesktop::Deepin,
            "kde" | "plasma" | "plasmawayland" | "plasmax11" => LinuxDesktop::Kde,
            "xfce" | "xfce4" | "xubuntu" => LinuxDesktop::Xfce,
            "lxde" | "lubuntu" => LinuxDesktop::Lxde,
            "sway" | "hyprland" | "river" | "wayfire" | "labwc" | "niri" => LinuxDesktop::Wayland,
            "i3" | "i3wm" | "bspwm" | "openbox" | "awesome" | "dwm" => LinuxDesktop::I3,
            _ => return None,
        };
        Some(desktop)
    }
}

impl FromStr for LinuxDesktop {
    type Err = Error;

    fn from_str(s: &str) -> Result<LinuxDesktop, Error> {
        let wanted = s.trim().to_ascii_lowercase();
        LinuxDesktop::ALL
            .iter()
            .copied()
            .find(|d| d.name() == wanted)
            .or_else(|| LinuxDesktop::from_token(&wanted))
            .ok_or_else(|| Error::UnsupportedDesktop(s.to_string()))
    }
}

impl Display for LinuxDesktop {
    fn fmt(&self, f: &mut Formatter) -> Result<(), FmtError> {
        write!(f, "{}", self.name())
    }
}

/// Session variables relevant to desktop detection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvSnapshot {
    pub xdg_current_desktop: Option<String>,
    pub desktop_session: Option<String>,
    pub wayland_display: bool,
    pub x_display: bool,
}

impl EnvSnapshot {
    pub fn from_env() -> EnvSnapshot {
        EnvSnapshot {
            xdg_current_desktop: env::var("XDG_CURRENT_DESKTOP").ok(),
            desktop_session: env::var("DESKTOP_SESSION").ok(),
            wayland_display: env::var_os("WAYLAND_DISPLAY").is_some(),
            x_display: env::var_os("DISPLAY").is_some(),
        }
    }
}

/// Picks the desktop family from session variables.
///
/// `XDG_CURRENT_DESKTOP` is a colon separated list (`ubuntu:GNOME`,
/// `Budgie:GNOME`); its first recognised entry wins. `DESKTOP_SESSION` is
/// consulted next. Without either, a Wayland session falls back to the
/// swaybg helper and an X11 session to feh.
pub fn classify(snapshot: &EnvSnapshot) -> Option<LinuxDesktop> {
    let from_xdg = snapshot
        .xdg_current_desktop
        .as_deref()
        .and_then(|v| v.split(':').find_map(LinuxDesktop::from_token));
    if from_xdg.is_some() {
        return from_xdg;
    }

    let from_session = snapshot
        .desktop_session
        .as_deref()
        .and_then(|v| LinuxDesktop::from_token(v.rsplit('/').next().unwrap_or(v)));
    if from_session.is_some() {
        return from_session;
    }

    if snapshot.wayland_display {
        Some(LinuxDesktop::Wayland)
    } else if snapshot.x_display {
        Some(LinuxDesktop::I3)
    } else {
        None
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "os", rename_all = "lowercase")]
pub enum Platform {
    Windows,
    #[serde(rename = "macos")]
    MacOs,
    Linux { desktop: LinuxDesktop },
    /// A unix session without a recognised desktop.
    Unsupported { desktop: String },
}

/// The platform a `Wallpaper` dispatches on. Resolved once, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlatformContext {
    pub platform: Platform,
}

impl PlatformContext {
    pub fn new(platform: Platform) -> PlatformContext {
        PlatformContext { platform }
    }

    pub fn linux(desktop: LinuxDesktop) -> PlatformContext {
        PlatformContext::new(Platform::Linux { desktop })
    }

    /// Inspects the compile target and, on unix desktops, the session
    /// environment. `WALLPAPER_DESKTOP` takes precedence over detection.
    pub fn detect() -> PlatformContext {
        if cfg!(windows) {
            return PlatformContext::new(Platform::Windows);
        }
        if cfg!(target_os = "macos") {
            return PlatformContext::new(Platform::MacOs);
        }

        if let Ok(forced) = env::var(DESKTOP_OVERRIDE_VAR) {
            return match forced.parse() {
                Ok(desktop) => PlatformContext::linux(desktop),
                Err(_) => PlatformContext::new(Platform::Unsupported { desktop: forced }),
            };
        }

        let snapshot = EnvSnapshot::from_env();
        debug!("Detecting desktop from {:?}", snapshot);
        match classify(&snapshot) {
            Some(desktop) => PlatformContext::linux(desktop),
            None => PlatformContext::new(Platform::Unsupported {
                desktop: snapshot
                    .xdg_current_desktop
                    .or(snapshot.desktop_session)
                    .unwrap_or_else(|| "no graphical session".to_string()),
            }),
        }
    }

    /// Process-wide context, detected on first use.
    pub fn current() -> &'static PlatformContext {
        static CURRENT: OnceLock<PlatformContext> = OnceLock::new();
        CURRENT.get_or_init(PlatformContext::detect)
    }
}

impl Display for PlatformContext {
    fn fmt(&self, f: &mut Formatter) -> Result<(), FmtError> {
        match &self.platform {
            Platform::Windows => write!(f, "Windows"),
            Platform::MacOs => write!(f, "macOS"),
            Platform::Linux { desktop } => write!(f, "{}", desktop.label()),
            Platform::Unsupported { desktop } => write!(f, "unsupported desktop ({})", desktop),
        }
    }
}

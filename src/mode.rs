//! Display modes and their native encodings.
//!
//! Every table below matches on the full `Mode` set, so a new mode cannot be
//! added without deciding its encoding on each platform. Platforms that have
//! no equivalent return `None`, which callers turn into
//! `Error::UnsupportedMode` before touching any setting.

use std::fmt::{Display, Error as FmtError, Formatter};
use std::str::FromStr;

use serde_derive::{Deserialize, Serialize};

use crate::error::Error;

/// How the wallpaper image is scaled and positioned on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Centered at native size.
    Center,
    /// Scaled to cover the screen, cropping the overflow.
    Crop,
    /// Scaled to fit inside the screen, keeping the aspect ratio.
    Fit,
    /// Stretched across all monitors.
    Span,
    /// Stretched to the screen, ignoring the aspect ratio.
    Stretch,
    /// Repeated at native size.
    Tile,
}

impl Mode {
    pub const ALL: [Mode; 6] = [Mode::Center, Mode::Crop, Mode::Fit, Mode::Span, Mode::Stretch, Mode::Tile];

    pub fn name(self) -> &'static str {
        match self {
            Mode::Center => "center",
            Mode::Crop => "crop",
            Mode::Fit => "fit",
            Mode::Span => "span",
            Mode::Stretch => "stretch",
            Mode::Tile => "tile",
        }
    }

    /// `(TileWallpaper, WallpaperStyle)` values under `HKCU\Control Panel\Desktop`.
    pub fn windows_style(self) -> (&'static str, &'static str) {
        let tile = if self == Mode::Tile { "1" } else { "0" };
        let style = match self {
            Mode::Center | Mode::Tile => "0",
            Mode::Stretch => "2",
            Mode::Fit => "6",
            Mode::Crop => "10",
            Mode::Span => "22",
        };
        (tile, style)
    }

    /// Reverse of `windows_style`.
    pub fn from_windows_style(tile: &str, style: &str) -> Option<Mode> {
        match (tile.trim(), style.trim()) {
            ("1", _) => Some(Mode::Tile),
            (_, "0") => Some(Mode::Center),
            (_, "2") => Some(Mode::Stretch),
            (_, "6") => Some(Mode::Fit),
            (_, "10") => Some(Mode::Crop),
            (_, "22") => Some(Mode::Span),
            _ => None,
        }
    }

    /// `picture-options` value shared by GNOME, Budgie, Cinnamon, MATE and Deepin.
    pub fn gnome_option(self) -> &'static str {
        match self {
            Mode::Center => "centered",
            Mode::Crop => "zoom",
            Mode::Fit => "scaled",
            Mode::Span => "spanned",
            Mode::Stretch => "stretched",
            Mode::Tile => "wallpaper",
        }
    }

    /// Plasma `FillMode` (Qt `Image.fillMode`). Plasma has no span mode.
    pub fn kde_fill_mode(self) -> Option<u8> {
        match self {
            Mode::Stretch => Some(0),
            Mode::Fit => Some(1),
            Mode::Crop => Some(2),
            Mode::Tile => Some(3),
            Mode::Center => Some(6),
            Mode::Span => None,
        }
    }

    /// xfdesktop `image-style`.
    pub fn xfce_style(self) -> u8 {
        match self {
            Mode::Center => 1,
            Mode::Tile => 2,
            Mode::Stretch => 3,
            Mode::Fit => 4,
            Mode::Crop => 5,
            Mode::Span => 6,
        }
    }

    /// `pcmanfm --wallpaper-mode` argument.
    pub fn lxde_mode(self) -> &'static str {
        match self {
            Mode::Center => "center",
            Mode::Crop => "crop",
            Mode::Fit => "fit",
            Mode::Span => "screen",
            Mode::Stretch => "stretch",
            Mode::Tile => "tile",
        }
    }

    /// `swaybg --mode` argument.
    pub fn swaybg_mode(self) -> Option<&'static str> {
        match self {
            Mode::Center => Some("center"),
            Mode::Crop => Some("fill"),
            Mode::Fit => Some("fit"),
            Mode::Stretch => Some("stretch"),
            Mode::Tile => Some("tile"),
            Mode::Span => None,
        }
    }

    pub fn from_swaybg_mode(s: &str) -> Option<Mode> {
        Mode::ALL.iter().copied().find(|m| m.swaybg_mode() == Some(s))
    }

    /// feh `--bg-*` flag.
    pub fn feh_flag(self) -> Option<&'static str> {
        match self {
            Mode::Center => Some("--bg-center"),
            Mode::Crop => Some("--bg-fill"),
            Mode::Fit => Some("--bg-max"),
            Mode::Stretch => Some("--bg-scale"),
            Mode::Tile => Some("--bg-tile"),
            Mode::Span => None,
        }
    }

    pub fn from_feh_flag(s: &str) -> Option<Mode> {
        Mode::ALL.iter().copied().find(|m| m.feh_flag() == Some(s))
    }

    /// `(NSImageScaling, allow clipping)` for `NSWorkspace` desktop image options.
    pub fn macos_scaling(self) -> Option<(u8, bool)> {
        match self {
            Mode::Stretch => Some((1, false)),
            Mode::Center => Some((2, false)),
            Mode::Fit => Some((3, false)),
            Mode::Crop => Some((3, true)),
            Mode::Tile | Mode::Span => None,
        }
    }
}

impl FromStr for Mode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Mode, Error> {
        let wanted = s.trim().to_ascii_lowercase();
        Mode::ALL
            .iter()
            .copied()
            .find(|m| m.name() == wanted)
            .ok_or_else(|| Error::InvalidMode(s.to_string()))
    }
}

impl Display for Mode {
    fn fmt(&self, f: &mut Formatter) -> Result<(), FmtError> {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_names_case_insensitively() {
        assert_eq!("Crop".parse::<Mode>().unwrap(), Mode::Crop);
        assert_eq!(" tile ".parse::<Mode>().unwrap(), Mode::Tile);
        for mode in Mode::ALL.iter() {
            assert_eq!(mode.name().parse::<Mode>().unwrap(), *mode);
        }
    }

    #[test]
    fn unknown_names_are_rejected() {
        match "fill".parse::<Mode>() {
            Err(Error::InvalidMode(s)) => assert_eq!(s, "fill"),
            other => panic!("unexpected {:?}", other),
        }
        assert!("".parse::<Mode>().is_err());
    }

    #[test]
    fn windows_table() {
        assert_eq!(Mode::Crop.windows_style(), ("0", "10"));
        assert_eq!(Mode::Tile.windows_style(), ("1", "0"));
        assert_eq!(Mode::Center.windows_style(), ("0", "0"));
        assert_eq!(Mode::Stretch.windows_style(), ("0", "2"));
        assert_eq!(Mode::Fit.windows_style(), ("0", "6"));
        assert_eq!(Mode::Span.windows_style(), ("0", "22"));
    }

    #[test]
    fn windows_style_reads_back() {
        for mode in Mode::ALL.iter() {
            let (tile, style) = mode.windows_style();
            assert_eq!(Mode::from_windows_style(tile, style), Some(*mode));
        }
        assert_eq!(Mode::from_windows_style("0", "7"), None);
    }

    #[test]
    fn helper_tables_leave_span_out() {
        assert_eq!(Mode::Span.kde_fill_mode(), None);
        assert_eq!(Mode::Span.swaybg_mode(), None);
        assert_eq!(Mode::Span.feh_flag(), None);
        assert_eq!(Mode::Span.macos_scaling(), None);
        assert_eq!(Mode::Tile.macos_scaling(), None);
    }

    #[test]
    fn helper_flags_read_back() {
        assert_eq!(Mode::from_feh_flag("--bg-max"), Some(Mode::Fit));
        assert_eq!(Mode::from_swaybg_mode("fill"), Some(Mode::Crop));
        assert_eq!(Mode::from_swaybg_mode("solid_color"), None);
    }

    #[test]
    fn serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Mode::Stretch).unwrap(), "\"stretch\"");
        let mode: Mode = serde_json::from_str("\"span\"").unwrap();
        assert_eq!(mode, Mode::Span);
    }
}

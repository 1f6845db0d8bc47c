//! macOS backend, scripted through `osascript`.

use std::path::{Path, PathBuf};

use log::info;

use crate::command::CommandRunner;
use crate::error::{Error, Result};
use crate::mode::Mode;
use crate::Backend;

const GET_SCRIPT: &str = r#"tell application "System Events" to get picture of current desktop"#;

/// AppleScript string literal.
pub fn applescript_quote(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

/// AppleScriptObjC that re-applies each screen's current image with new
/// scaling options. System Events has no scaling property, NSWorkspace does.
fn scaling_script(scaling: u8, clipping: bool) -> String {
    format!(
        r#"use framework "AppKit"
use scripting additions
set ws to current application's NSWorkspace's sharedWorkspace()
set opts to current application's NSDictionary's dictionaryWithObjects:{{{scaling}, {clipping}}} forKeys:{{current application's NSWorkspaceDesktopImageScalingKey, current application's NSWorkspaceDesktopImageAllowClippingKey}}
repeat with s in (current application's NSScreen's screens())
	set u to (ws's desktopImageURLForScreen:s)
	set {{ok, err}} to (ws's setDesktopImageURL:u forScreen:s options:opts |error|:(reference))
	if not ok then error (err's localizedDescription() as text)
end repeat"#,
        scaling = scaling,
        clipping = clipping,
    )
}

pub struct MacBackend<R> {
    runner: R,
}

impl<R: CommandRunner> MacBackend<R> {
    pub fn new(runner: R) -> Self {
        MacBackend { runner }
    }

    fn osascript(&self, script: &str) -> Result<String> {
        self.runner.output("osascript", &["-e", script])
    }
}

impl<R: CommandRunner> Backend for MacBackend<R> {
    fn get(&self) -> Result<PathBuf> {
        Ok(PathBuf::from(self.osascript(GET_SCRIPT)?.trim()))
    }

    fn set_from_file(&self, path: &Path) -> Result<()> {
        let path = path
            .to_str()
            .ok_or_else(|| Error::encoding(&path.to_string_lossy(), "path is not valid UTF-8"))?;

        info!("Setting macOS desktop picture");
        let script = format!(
            r#"tell application "System Events" to tell every desktop to set picture to {}"#,
            applescript_quote(path)
        );
        self.osascript(&script)?;
        Ok(())
    }

    fn set_mode(&self, mode: Mode) -> Result<()> {
        let (scaling, clipping) = mode
            .macos_scaling()
            .ok_or_else(|| Error::unsupported_mode(mode, "macOS"))?;

        info!("Setting macOS desktop picture scaling to {}", mode);
        self.osascript(&scaling_script(scaling, clipping))?;
        Ok(())
    }
}

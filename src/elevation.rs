//! Administrator rights for the machine-wide lock-screen policy keys.
//!
//! A process without them cannot gain them in place. It starts an elevated
//! copy of itself with the same arguments and exits; the copy runs the
//! same operation again and finds itself elevated.

use log::info;

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElevationOutcome {
    AlreadyElevated,
    /// An elevated copy was requested. The current process must stop without
    /// completing its operation.
    RelaunchInitiated,
}

/// Process capabilities used by the elevation handshake.
pub trait Elevation {
    fn is_elevated(&self) -> bool;

    /// Starts an elevated copy of the current process with the same arguments.
    fn relaunch_elevated(&self) -> Result<()>;

    /// Ends the current process after a relaunch.
    fn exit_current(&self);
}

pub fn ensure_elevated<E: Elevation + ?Sized>(elevation: &E) -> Result<ElevationOutcome> {
    if elevation.is_elevated() {
        return Ok(ElevationOutcome::AlreadyElevated);
    }

    info!("Administrator rights required, relaunching elevated");
    elevation.relaunch_elevated()?;
    Ok(ElevationOutcome::RelaunchInitiated)
}

/// Single-quoted PowerShell literal.
pub fn powershell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// Arguments for `powershell` that start `exe` elevated with `args`.
///
/// An elevated process starts in the system directory unless told otherwise,
/// so relative paths in `args` only resolve when `working_dir` is passed on.
pub fn runas_command(exe: &str, args: &[String], working_dir: Option<&str>) -> Vec<String> {
    let mut command = vec![
        "-NoProfile".to_string(),
        "-Command".to_string(),
        "Start-Process".to_string(),
        "-FilePath".to_string(),
        powershell_quote(exe),
    ];
    if let Some(dir) = working_dir {
        command.push("-WorkingDirectory".to_string());
        command.push(powershell_quote(dir));
    }
    if !args.is_empty() {
        let list: Vec<String> = args.iter().map(|a| powershell_quote(&quote_windows_arg(a))).collect();
        command.push("-ArgumentList".to_string());
        command.push(list.join(","));
    }
    command.push("-Verb".to_string());
    command.push("RunAs".to_string());
    command
}

/// Start-Process joins its argument list with spaces, so arguments containing
/// whitespace need their own double quotes.
fn quote_windows_arg(arg: &str) -> String {
    if arg.is_empty() || arg.contains(char::is_whitespace) {
        format!("\"{}\"", arg.replace('"', "\\\""))
    } else {
        arg.to_string()
    }
}

#[cfg(windows)]
pub use self::native::NativeElevation;

#[cfg(windows)]
mod native {
    use std::env;
    use std::os::windows::process::CommandExt;
    use std::process::{self, Command, Stdio};

    use super::{runas_command, Elevation};
    use crate::error::{Error, Result};

    const CREATE_NO_WINDOW: u32 = 0x0800_0000;

    #[derive(Debug, Default, Clone, Copy)]
    pub struct NativeElevation;

    impl Elevation for NativeElevation {
        fn is_elevated(&self) -> bool {
            // `net session` is refused to non-administrators.
            Command::new("net")
                .arg("session")
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .creation_flags(CREATE_NO_WINDOW)
                .status()
                .map(|s| s.success())
                .unwrap_or(false)
        }

        fn relaunch_elevated(&self) -> Result<()> {
            let exe = env::current_exe()?;
            let exe = exe
                .to_str()
                .ok_or_else(|| Error::encoding(&exe.to_string_lossy(), "executable path is not valid Unicode"))?;
            let args: Vec<String> = env::args_os().skip(1).map(|a| a.to_string_lossy().into_owned()).collect();
            let cwd = env::current_dir()?;
            let cwd = cwd
                .to_str()
                .ok_or_else(|| Error::encoding(&cwd.to_string_lossy(), "working directory is not valid Unicode"))?;

            let status = Command::new("powershell")
                .args(runas_command(exe, &args, Some(cwd)))
                .creation_flags(CREATE_NO_WINDOW)
                .status()?;
            if !status.success() {
                return Err(Error::CommandFailed {
                    program: "powershell".to_string(),
                    status: status.code(),
                    stderr: "Start-Process -Verb RunAs failed".to_string(),
                });
            }
            Ok(())
        }

        fn exit_current(&self) {
            process::exit(0);
        }
    }
}

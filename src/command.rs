//! Subprocess plumbing shared by the macOS and Linux backends.

use std::io::{self, ErrorKind};
use std::process::{Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};

use log::debug;

use crate::error::{Error, Result};

/// Runs external programs on behalf of a backend.
pub trait CommandRunner {
    /// Runs `program` to completion and returns its stdout.
    ///
    /// A non-zero exit is `Error::CommandFailed`, a missing binary is
    /// `Error::HelperNotFound`.
    fn output(&self, program: &str, args: &[&str]) -> Result<String>;

    /// Starts `program` without waiting for it. The child is reaped once it
    /// exits, so repeated calls from a long-lived process leave no zombies.
    fn spawn(&self, program: &str, args: &[&str]) -> Result<()>;
}

impl<T: CommandRunner + ?Sized> CommandRunner for &T {
    fn output(&self, program: &str, args: &[&str]) -> Result<String> {
        (**self).output(program, args)
    }

    fn spawn(&self, program: &str, args: &[&str]) -> Result<()> {
        (**self).spawn(program, args)
    }
}

/// `CommandRunner` backed by `std::process::Command`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn output(&self, program: &str, args: &[&str]) -> Result<String> {
        debug!("Running {} {:?}", program, args);

        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| spawn_error(program, e))?;

        if !output.status.success() {
            return Err(Error::CommandFailed {
                program: program.to_string(),
                status: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn spawn(&self, program: &str, args: &[&str]) -> Result<()> {
        spawn_reaped(program, args)?;
        Ok(())
    }
}

/// Starts `program` detached from our stdio and waits for it on a background
/// thread.
fn spawn_reaped(program: &str, args: &[&str]) -> Result<JoinHandle<io::Result<ExitStatus>>> {
    debug!("Spawning {} {:?}", program, args);

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| spawn_error(program, e))?;

    let name = program.to_string();
    Ok(thread::spawn(move || {
        let status = child.wait();
        debug!("{} exited: {:?}", name, status);
        status
    }))
}

fn spawn_error(program: &str, err: io::Error) -> Error {
    if err.kind() == ErrorKind::NotFound {
        Error::HelperNotFound { program: program.to_string() }
    } else {
        Error::Io(err)
    }
}

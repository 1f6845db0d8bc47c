//! Get and set the desktop wallpaper and its display mode on Windows, macOS
//! and the common Linux desktops.
//!
//! ```no_run
//! use desktop_wallpaper::Mode;
//!
//! desktop_wallpaper::set_from_file("/usr/share/backgrounds/gnome/adwaita-day.jpg")?;
//! desktop_wallpaper::set_mode(Mode::Crop)?;
//! println!("{}", desktop_wallpaper::get()?.display());
//! # Ok::<(), desktop_wallpaper::Error>(())
//! ```
//!
//! Every call blocks until the OS, or the tool it shells out to, returns.
//! Calls from several threads must be serialized by the caller.
//!
//! On Windows, `set_from_file` also points the lock screen at the image. Doing
//! so needs administrator rights; an unelevated process relaunches itself
//! elevated with the same arguments and exits, so a successful return there
//! may mean the work continues in the new process.

use std::path::{Path, PathBuf};

use log::info;

pub mod command;
pub mod elevation;
pub mod error;
pub mod fetch;
pub mod linux;
pub mod macos;
pub mod mode;
pub mod platform;
pub mod windows;

#[cfg(windows)]
mod ffi_windows;

pub use crate::error::{Error, Result};
pub use crate::mode::Mode;
pub use crate::platform::{LinuxDesktop, Platform, PlatformContext};

use crate::command::SystemRunner;
use crate::fetch::{Fetch, HttpFetcher};

/// One platform's native wallpaper facility.
pub trait Backend {
    fn get(&self) -> Result<PathBuf>;
    fn set_from_file(&self, path: &Path) -> Result<()>;
    fn set_mode(&self, mode: Mode) -> Result<()>;
}

/// Native backend for `context`.
pub fn backend_for(context: &PlatformContext) -> Result<Box<dyn Backend>> {
    match &context.platform {
        #[cfg(windows)]
        Platform::Windows => Ok(Box::new(windows::WindowsBackend::native())),
        #[cfg(not(windows))]
        Platform::Windows => Err(Error::UnsupportedDesktop(
            "Windows backend is only available on Windows".to_string(),
        )),
        Platform::MacOs => Ok(Box::new(macos::MacBackend::new(SystemRunner))),
        Platform::Linux { desktop } => Ok(Box::new(linux::LinuxBackend::new(*desktop, SystemRunner)?)),
        Platform::Unsupported { desktop } => Err(Error::UnsupportedDesktop(desktop.clone())),
    }
}

/// Dispatches wallpaper operations to one backend.
pub struct Wallpaper {
    backend: Box<dyn Backend>,
    fetcher: Box<dyn Fetch>,
    cache_dir: PathBuf,
}

impl Wallpaper {
    /// Selector for `context`, downloading into the default cache directory.
    pub fn new(context: &PlatformContext) -> Result<Wallpaper> {
        Ok(Wallpaper::with_backend(backend_for(context)?))
    }

    pub fn with_backend(backend: Box<dyn Backend>) -> Wallpaper {
        Wallpaper {
            backend,
            fetcher: Box::new(HttpFetcher),
            cache_dir: fetch::default_cache_dir(),
        }
    }

    pub fn with_fetcher(mut self, fetcher: Box<dyn Fetch>) -> Wallpaper {
        self.fetcher = fetcher;
        self
    }

    pub fn with_cache_dir(mut self, cache_dir: PathBuf) -> Wallpaper {
        self.cache_dir = cache_dir;
        self
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn get(&self) -> Result<PathBuf> {
        self.backend.get()
    }

    pub fn set_from_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.backend.set_from_file(path.as_ref())
    }

    /// Downloads `url` into the cache directory, then sets it like any file.
    pub fn set_from_url(&self, url: &str) -> Result<()> {
        let path = self.fetcher.fetch(url, &self.cache_dir)?;
        info!("Downloaded {} to {}", url, path.display());
        self.set_from_file(&path)
    }

    pub fn set_mode(&self, mode: Mode) -> Result<()> {
        self.backend.set_mode(mode)
    }
}

fn current() -> Result<Wallpaper> {
    Wallpaper::new(PlatformContext::current())
}

/// Current wallpaper path.
pub fn get() -> Result<PathBuf> {
    current()?.get()
}

pub fn set_from_file<P: AsRef<Path>>(path: P) -> Result<()> {
    current()?.set_from_file(path)
}

pub fn set_from_url(url: &str) -> Result<()> {
    current()?.set_from_url(url)
}

pub fn set_mode(mode: Mode) -> Result<()> {
    current()?.set_mode(mode)
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::fs;
    use std::rc::Rc;

    use super::*;

    #[derive(Default)]
    struct Log {
        set: Vec<PathBuf>,
        modes: Vec<Mode>,
    }

    struct MemBackend(Rc<RefCell<Log>>);

    impl Backend for MemBackend {
        fn get(&self) -> Result<PathBuf> {
            self.0.borrow().set.last().cloned().ok_or(Error::NoWallpaper { desktop: "memory".to_string() })
        }

        fn set_from_file(&self, path: &Path) -> Result<()> {
            self.0.borrow_mut().set.push(path.to_path_buf());
            Ok(())
        }

        fn set_mode(&self, mode: Mode) -> Result<()> {
            self.0.borrow_mut().modes.push(mode);
            Ok(())
        }
    }

    /// Writes a fixed body under the last URL segment.
    struct FileFetcher;

    impl Fetch for FileFetcher {
        fn fetch(&self, url: &str, dir: &Path) -> Result<PathBuf> {
            let name = url.rsplit('/').next().unwrap_or("image");
            let path = dir.join(name);
            fs::write(&path, b"not really a jpeg")?;
            Ok(path)
        }
    }

    struct FailingFetcher;

    impl Fetch for FailingFetcher {
        fn fetch(&self, url: &str, _dir: &Path) -> Result<PathBuf> {
            Err(Error::HttpStatus { url: url.to_string(), status: 404 })
        }
    }

    fn memory() -> (Wallpaper, Rc<RefCell<Log>>) {
        let log = Rc::new(RefCell::new(Log::default()));
        (Wallpaper::with_backend(Box::new(MemBackend(log.clone()))), log)
    }

    #[test]
    fn set_then_get_round_trips() {
        let (wallpaper, _) = memory();
        wallpaper.set_from_file("/home/ada/a.jpg").unwrap();
        assert_eq!(wallpaper.get().unwrap(), PathBuf::from("/home/ada/a.jpg"));
    }

    #[test]
    fn set_from_url_downloads_then_sets_file() {
        let dir = tempfile::tempdir().unwrap();
        let (wallpaper, log) = memory();
        let wallpaper = wallpaper
            .with_fetcher(Box::new(FileFetcher))
            .with_cache_dir(dir.path().to_path_buf());

        wallpaper.set_from_url("https://example.com/img/earth.jpg").unwrap();

        let expected = dir.path().join("earth.jpg");
        assert_eq!(log.borrow().set, vec![expected.clone()]);
        assert!(expected.is_file());
        assert_eq!(wallpaper.get().unwrap(), expected);
    }

    #[test]
    fn failed_download_sets_nothing() {
        let (wallpaper, log) = memory();
        let wallpaper = wallpaper.with_fetcher(Box::new(FailingFetcher));

        assert!(matches!(
            wallpaper.set_from_url("https://example.com/missing.jpg"),
            Err(Error::HttpStatus { status: 404, .. })
        ));
        assert!(log.borrow().set.is_empty());
    }

    #[test]
    fn set_mode_delegates() {
        let (wallpaper, log) = memory();
        wallpaper.set_mode(Mode::Tile).unwrap();
        assert_eq!(log.borrow().modes, vec![Mode::Tile]);
    }

    #[test]
    fn unsupported_desktop_has_no_backend() {
        let context = PlatformContext::new(Platform::Unsupported { desktop: "Amiga Workbench".to_string() });
        match Wallpaper::new(&context) {
            Err(Error::UnsupportedDesktop(d)) => assert_eq!(d, "Amiga Workbench"),
            Err(e) => panic!("unexpected {}", e),
            Ok(_) => panic!("expected an error"),
        }
    }

    #[cfg(not(windows))]
    #[test]
    fn windows_backend_needs_windows() {
        assert!(backend_for(&PlatformContext::new(Platform::Windows)).is_err());
    }
}

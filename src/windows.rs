//! Windows backend: `SystemParametersInfoW` for the desktop, the registry for
//! the display style and the lock-screen policy.
//!
//! The OS facilities sit behind `Registry`, `DesktopApi` and `Elevation` so
//! the registry bookkeeping can be exercised on any host. `ffi_windows`
//! provides the real implementations.

use std::io;
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::elevation::{ensure_elevated, Elevation, ElevationOutcome};
use crate::error::{Error, Result};
use crate::mode::Mode;
use crate::Backend;

/// Capacity, in UTF-16 units, of the buffer `get` hands to the OS.
pub const WALLPAPER_BUF_LEN: usize = 256;

pub const PERSONALIZATION_KEY: &str = r"SOFTWARE\Policies\Microsoft\Windows\Personalization";
pub const PERSONALIZATION_CSP_KEY: &str = r"SOFTWARE\Microsoft\Windows\CurrentVersion\PersonalizationCSP";
pub const DESKTOP_KEY: &str = r"Control Panel\Desktop";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Hive {
    LocalMachine,
    CurrentUser,
}

/// String and DWORD access to the registry. Setters create missing keys.
pub trait Registry {
    fn get_string(&self, hive: Hive, key: &str, name: &str) -> io::Result<String>;
    fn get_u32(&self, hive: Hive, key: &str, name: &str) -> io::Result<u32>;
    fn set_string(&self, hive: Hive, key: &str, name: &str, value: &str) -> io::Result<()>;
    fn set_u32(&self, hive: Hive, key: &str, name: &str, value: u32) -> io::Result<()>;
}

/// The desktop wallpaper system parameter.
pub trait DesktopApi {
    /// Fills a `WALLPAPER_BUF_LEN` buffer with the current wallpaper path.
    fn get_wallpaper(&self, buf: &mut [u16]) -> io::Result<()>;

    /// Sets, persists and broadcasts the wallpaper. `path` is NUL terminated.
    fn set_wallpaper(&self, path: &[u16]) -> io::Result<()>;
}

/// A path read through a fixed-size buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundedPath {
    pub path: String,
    /// The path filled the buffer and may have been cut short.
    pub truncated: bool,
}

/// Decodes up to the first NUL.
pub fn decode_wide(buf: &[u16]) -> BoundedPath {
    let len = buf.iter().position(|&c| c == 0).unwrap_or(buf.len());
    BoundedPath {
        path: String::from_utf16_lossy(&buf[..len]),
        truncated: len + 1 >= buf.len(),
    }
}

/// NUL-terminated UTF-16 for the Win32 wide-string APIs.
pub fn to_wide(path: &str) -> Result<Vec<u16>> {
    if path.contains('\0') {
        return Err(Error::encoding(path, "path contains a NUL character"));
    }
    Ok(path.encode_utf16().chain(std::iter::once(0)).collect())
}

/// Whether `set_from_file` finished in this process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOutcome {
    Applied,
    /// An elevated copy of the process will apply it instead.
    DeferredToElevated,
}

pub struct WindowsBackend<R, D, E> {
    registry: R,
    desktop: D,
    elevation: E,
}

#[cfg(windows)]
impl WindowsBackend<crate::ffi_windows::WinRegistry, crate::ffi_windows::User32Desktop, crate::elevation::NativeElevation> {
    pub fn native() -> Self {
        WindowsBackend::new(
            crate::ffi_windows::WinRegistry,
            crate::ffi_windows::User32Desktop,
            crate::elevation::NativeElevation,
        )
    }
}

impl<R: Registry, D: DesktopApi, E: Elevation> WindowsBackend<R, D, E> {
    pub fn new(registry: R, desktop: D, elevation: E) -> Self {
        WindowsBackend { registry, desktop, elevation }
    }

    /// Current wallpaper. Paths longer than the buffer come back cut short,
    /// with `truncated` set.
    pub fn get_bounded(&self) -> Result<BoundedPath> {
        let mut buf = [0u16; WALLPAPER_BUF_LEN];
        self.desktop.get_wallpaper(&mut buf)?;
        Ok(decode_wide(&buf))
    }

    /// True when every lock-screen policy value already points at `path`.
    /// Missing keys and values count as a mismatch.
    pub fn lock_screen_matches(&self, path: &str) -> bool {
        let reg = &self.registry;
        let string_is = |key: &str, name: &str| {
            reg.get_string(Hive::LocalMachine, key, name)
                .map(|v| v == path)
                .unwrap_or(false)
        };

        string_is(PERSONALIZATION_KEY, "LockScreenImage")
            && reg
                .get_u32(Hive::LocalMachine, PERSONALIZATION_CSP_KEY, "LockScreenImageStatus")
                .map(|v| v == 1)
                .unwrap_or(false)
            && string_is(PERSONALIZATION_CSP_KEY, "LockScreenImagePath")
            && string_is(PERSONALIZATION_CSP_KEY, "LockScreenImageUrl")
    }

    /// Display mode currently recorded under `HKCU\Control Panel\Desktop`,
    /// `None` for styles outside the supported set.
    pub fn current_mode(&self) -> Result<Option<Mode>> {
        let tile = self.registry.get_string(Hive::CurrentUser, DESKTOP_KEY, "TileWallpaper")?;
        let style = self.registry.get_string(Hive::CurrentUser, DESKTOP_KEY, "WallpaperStyle")?;
        Ok(Mode::from_windows_style(&tile, &style))
    }

    fn write_lock_screen(&self, path: &str) -> Result<()> {
        info!("Setting Windows lock screen registry keys");

        let reg = &self.registry;
        reg.set_string(Hive::LocalMachine, PERSONALIZATION_KEY, "LockScreenImage", path)?;
        reg.set_u32(Hive::LocalMachine, PERSONALIZATION_CSP_KEY, "LockScreenImageStatus", 1)?;
        reg.set_string(Hive::LocalMachine, PERSONALIZATION_CSP_KEY, "LockScreenImagePath", path)?;
        reg.set_string(Hive::LocalMachine, PERSONALIZATION_CSP_KEY, "LockScreenImageUrl", path)?;
        Ok(())
    }

    /// Sets the desktop and lock screen image.
    ///
    /// When the lock-screen keys need changing and the process is not
    /// elevated, an elevated relaunch is requested and nothing else happens
    /// here.
    pub fn apply(&self, path: &Path) -> Result<SetOutcome> {
        let path = path
            .to_str()
            .ok_or_else(|| Error::encoding(&path.to_string_lossy(), "path is not valid Unicode"))?;
        let wide = to_wide(path)?;

        if !self.lock_screen_matches(path) {
            match ensure_elevated(&self.elevation)? {
                ElevationOutcome::AlreadyElevated => self.write_lock_screen(path)?,
                ElevationOutcome::RelaunchInitiated => return Ok(SetOutcome::DeferredToElevated),
            }
        }

        info!("Setting Windows desktop wallpaper");
        self.desktop.set_wallpaper(&wide)?;
        Ok(SetOutcome::Applied)
    }
}

impl<R: Registry, D: DesktopApi, E: Elevation> Backend for WindowsBackend<R, D, E> {
    fn get(&self) -> Result<PathBuf> {
        let current = self.get_bounded()?;
        if current.truncated {
            warn!(
                "Wallpaper path fills the {} unit buffer and may be truncated: {}",
                WALLPAPER_BUF_LEN, current.path
            );
        }
        Ok(PathBuf::from(current.path))
    }

    /// Returns `Ok(())` even when the work was handed to an elevated copy,
    /// in which case this process exits before returning.
    fn set_from_file(&self, path: &Path) -> Result<()> {
        if self.apply(path)? == SetOutcome::DeferredToElevated {
            self.elevation.exit_current();
        }
        Ok(())
    }

    fn set_mode(&self, mode: Mode) -> Result<()> {
        info!("Setting Windows wallpaper style to {}", mode);

        let (tile, style) = mode.windows_style();
        self.registry.set_string(Hive::CurrentUser, DESKTOP_KEY, "TileWallpaper", tile)?;
        self.registry.set_string(Hive::CurrentUser, DESKTOP_KEY, "WallpaperStyle", style)?;

        // The style is only picked up when the wallpaper is set again.
        let current = self.get()?;
        self.set_from_file(&current)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::collections::HashMap;

    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    enum Value {
        Str(String),
        Dword(u32),
    }

    #[derive(Default)]
    struct MemRegistry {
        values: RefCell<HashMap<(Hive, String, String), Value>>,
        writes: RefCell<Vec<(Hive, String, String)>>,
        deny_writes: bool,
    }

    impl MemRegistry {
        fn value(&self, hive: Hive, key: &str, name: &str) -> Option<Value> {
            self.values.borrow().get(&(hive, key.to_string(), name.to_string())).cloned()
        }

        fn put(&self, hive: Hive, key: &str, name: &str, value: Value) {
            self.values.borrow_mut().insert((hive, key.to_string(), name.to_string()), value);
        }

        fn write(&self, hive: Hive, key: &str, name: &str, value: Value) -> io::Result<()> {
            if self.deny_writes {
                return Err(io::Error::new(io::ErrorKind::PermissionDenied, "Access is denied."));
            }
            self.writes.borrow_mut().push((hive, key.to_string(), name.to_string()));
            self.put(hive, key, name, value);
            Ok(())
        }

        fn hklm_writes(&self) -> usize {
            self.writes.borrow().iter().filter(|w| w.0 == Hive::LocalMachine).count()
        }
    }

    impl<'a> Registry for &'a MemRegistry {
        fn get_string(&self, hive: Hive, key: &str, name: &str) -> io::Result<String> {
            match self.value(hive, key, name) {
                Some(Value::Str(s)) => Ok(s),
                _ => Err(io::Error::from(io::ErrorKind::NotFound)),
            }
        }

        fn get_u32(&self, hive: Hive, key: &str, name: &str) -> io::Result<u32> {
            match self.value(hive, key, name) {
                Some(Value::Dword(v)) => Ok(v),
                _ => Err(io::Error::from(io::ErrorKind::NotFound)),
            }
        }

        fn set_string(&self, hive: Hive, key: &str, name: &str, value: &str) -> io::Result<()> {
            self.write(hive, key, name, Value::Str(value.to_string()))
        }

        fn set_u32(&self, hive: Hive, key: &str, name: &str, value: u32) -> io::Result<()> {
            self.write(hive, key, name, Value::Dword(value))
        }
    }

    #[derive(Default)]
    struct MemDesktop {
        current: RefCell<Vec<u16>>,
        sets: Cell<usize>,
    }

    impl<'a> DesktopApi for &'a MemDesktop {
        fn get_wallpaper(&self, buf: &mut [u16]) -> io::Result<()> {
            let current = self.current.borrow();
            let n = current.len().min(buf.len() - 1);
            buf[..n].copy_from_slice(&current[..n]);
            buf[n] = 0;
            Ok(())
        }

        fn set_wallpaper(&self, path: &[u16]) -> io::Result<()> {
            assert_eq!(path.last(), Some(&0), "path must be NUL terminated");
            *self.current.borrow_mut() = path[..path.len() - 1].to_vec();
            self.sets.set(self.sets.get() + 1);
            Ok(())
        }
    }

    #[derive(Default)]
    struct StubElevation {
        elevated: bool,
        checks: Cell<usize>,
        relaunches: Cell<usize>,
        exits: Cell<usize>,
    }

    impl<'a> Elevation for &'a StubElevation {
        fn is_elevated(&self) -> bool {
            self.checks.set(self.checks.get() + 1);
            self.elevated
        }

        fn relaunch_elevated(&self) -> Result<()> {
            self.relaunches.set(self.relaunches.get() + 1);
            Ok(())
        }

        fn exit_current(&self) {
            self.exits.set(self.exits.get() + 1);
        }
    }

    const IMAGE: &str = r"C:\Users\ada\Pictures\earth.jpg";

    fn configure_lock_screen(reg: &MemRegistry, path: &str) {
        reg.put(Hive::LocalMachine, PERSONALIZATION_KEY, "LockScreenImage", Value::Str(path.into()));
        reg.put(Hive::LocalMachine, PERSONALIZATION_CSP_KEY, "LockScreenImageStatus", Value::Dword(1));
        reg.put(Hive::LocalMachine, PERSONALIZATION_CSP_KEY, "LockScreenImagePath", Value::Str(path.into()));
        reg.put(Hive::LocalMachine, PERSONALIZATION_CSP_KEY, "LockScreenImageUrl", Value::Str(path.into()));
    }

    #[test]
    fn decode_trims_nul_padding() {
        let mut buf = [0u16; WALLPAPER_BUF_LEN];
        let wide: Vec<u16> = "C:\\a.jpg".encode_utf16().collect();
        buf[..wide.len()].copy_from_slice(&wide);
        assert_eq!(decode_wide(&buf), BoundedPath { path: "C:\\a.jpg".to_string(), truncated: false });
    }

    #[test]
    fn decode_reports_full_buffer() {
        let buf = [b'x' as u16; WALLPAPER_BUF_LEN];
        let decoded = decode_wide(&buf);
        assert_eq!(decoded.path.len(), WALLPAPER_BUF_LEN);
        assert!(decoded.truncated);

        let mut almost = [b'x' as u16; WALLPAPER_BUF_LEN];
        almost[WALLPAPER_BUF_LEN - 1] = 0;
        assert!(decode_wide(&almost).truncated);
    }

    #[test]
    fn wide_conversion_rejects_nul() {
        assert!(matches!(to_wide("C:\\a\0b.jpg"), Err(Error::Encoding { .. })));
        assert_eq!(to_wide("ab").unwrap(), vec![b'a' as u16, b'b' as u16, 0]);
    }

    #[test]
    fn set_then_get_round_trips() {
        let (reg, desk, elev) = (MemRegistry::default(), MemDesktop::default(), StubElevation::default());
        configure_lock_screen(&reg, IMAGE);
        let backend = WindowsBackend::new(&reg, &desk, &elev);

        backend.set_from_file(Path::new(IMAGE)).unwrap();
        assert_eq!(backend.get().unwrap(), PathBuf::from(IMAGE));
    }

    #[test]
    fn configured_lock_screen_skips_elevation() {
        let (reg, desk, elev) = (MemRegistry::default(), MemDesktop::default(), StubElevation::default());
        configure_lock_screen(&reg, IMAGE);
        let backend = WindowsBackend::new(&reg, &desk, &elev);

        assert_eq!(backend.apply(Path::new(IMAGE)).unwrap(), SetOutcome::Applied);
        assert_eq!(backend.apply(Path::new(IMAGE)).unwrap(), SetOutcome::Applied);
        assert_eq!(elev.checks.get(), 0);
        assert_eq!(reg.hklm_writes(), 0);
        assert_eq!(desk.sets.get(), 2);
    }

    #[test]
    fn elevated_process_writes_lock_screen() {
        let (reg, desk) = (MemRegistry::default(), MemDesktop::default());
        let elev = StubElevation { elevated: true, ..StubElevation::default() };
        let backend = WindowsBackend::new(&reg, &desk, &elev);

        assert_eq!(backend.apply(Path::new(IMAGE)).unwrap(), SetOutcome::Applied);
        assert!(backend.lock_screen_matches(IMAGE));
        assert_eq!(
            reg.value(Hive::LocalMachine, PERSONALIZATION_CSP_KEY, "LockScreenImageStatus"),
            Some(Value::Dword(1))
        );
        assert_eq!(desk.sets.get(), 1);

        // A second pass finds everything in place.
        backend.apply(Path::new(IMAGE)).unwrap();
        assert_eq!(elev.checks.get(), 1);
    }

    #[test]
    fn stale_lock_screen_value_counts_as_mismatch() {
        let (reg, desk, elev) = (MemRegistry::default(), MemDesktop::default(), StubElevation::default());
        configure_lock_screen(&reg, IMAGE);
        reg.put(Hive::LocalMachine, PERSONALIZATION_CSP_KEY, "LockScreenImageStatus", Value::Dword(0));
        let backend = WindowsBackend::new(&reg, &desk, &elev);

        assert!(!backend.lock_screen_matches(IMAGE));
        assert!(!backend.lock_screen_matches(r"C:\other.jpg"));
    }

    #[test]
    fn unprivileged_process_relaunches_and_exits() {
        let (reg, desk, elev) = (MemRegistry::default(), MemDesktop::default(), StubElevation::default());
        let backend = WindowsBackend::new(&reg, &desk, &elev);

        assert!(backend.set_from_file(Path::new(IMAGE)).is_ok());
        assert_eq!(elev.relaunches.get(), 1);
        assert_eq!(elev.exits.get(), 1);
        assert_eq!(reg.hklm_writes(), 0);
        assert_eq!(desk.sets.get(), 0);
    }

    #[test]
    fn registry_errors_pass_through() {
        let reg = MemRegistry { deny_writes: true, ..MemRegistry::default() };
        let desk = MemDesktop::default();
        let elev = StubElevation { elevated: true, ..StubElevation::default() };
        let backend = WindowsBackend::new(&reg, &desk, &elev);

        match backend.set_from_file(Path::new(IMAGE)) {
            Err(Error::Io(e)) => assert_eq!(e.kind(), io::ErrorKind::PermissionDenied),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(desk.sets.get(), 0);
    }

    #[test]
    fn encoding_failure_mutates_nothing() {
        let (reg, desk) = (MemRegistry::default(), MemDesktop::default());
        let elev = StubElevation { elevated: true, ..StubElevation::default() };
        let backend = WindowsBackend::new(&reg, &desk, &elev);

        assert!(matches!(
            backend.set_from_file(Path::new("C:\\bad\0name.jpg")),
            Err(Error::Encoding { .. })
        ));
        assert_eq!(elev.checks.get(), 0);
        assert!(reg.writes.borrow().is_empty());
        assert_eq!(desk.sets.get(), 0);
    }

    #[test]
    fn crop_mode_writes_style_and_reapplies() {
        let (reg, desk, elev) = (MemRegistry::default(), MemDesktop::default(), StubElevation::default());
        configure_lock_screen(&reg, IMAGE);
        *desk.current.borrow_mut() = IMAGE.encode_utf16().collect();
        let backend = WindowsBackend::new(&reg, &desk, &elev);

        backend.set_mode(Mode::Crop).unwrap();
        assert_eq!(reg.value(Hive::CurrentUser, DESKTOP_KEY, "WallpaperStyle"), Some(Value::Str("10".into())));
        assert_eq!(reg.value(Hive::CurrentUser, DESKTOP_KEY, "TileWallpaper"), Some(Value::Str("0".into())));
        assert_eq!(desk.sets.get(), 1);
        assert_eq!(backend.get().unwrap(), PathBuf::from(IMAGE));
    }

    #[test]
    fn every_mode_lands_in_the_registry() {
        for mode in Mode::ALL.iter() {
            let (reg, desk, elev) = (MemRegistry::default(), MemDesktop::default(), StubElevation::default());
            configure_lock_screen(&reg, IMAGE);
            *desk.current.borrow_mut() = IMAGE.encode_utf16().collect();
            let backend = WindowsBackend::new(&reg, &desk, &elev);

            backend.set_mode(*mode).unwrap();
            let (tile, style) = mode.windows_style();
            assert_eq!(reg.value(Hive::CurrentUser, DESKTOP_KEY, "TileWallpaper"), Some(Value::Str(tile.into())));
            assert_eq!(reg.value(Hive::CurrentUser, DESKTOP_KEY, "WallpaperStyle"), Some(Value::Str(style.into())));
            assert_eq!(backend.current_mode().unwrap(), Some(*mode));
        }
    }
}

use std::io;

use winapi::ctypes::c_void;
use winapi::um::winuser::{
    SystemParametersInfoW, SPIF_SENDWININICHANGE, SPIF_UPDATEINIFILE, SPI_GETDESKWALLPAPER,
    SPI_SETDESKWALLPAPER,
};
use winreg::enums::{HKEY_CURRENT_USER, HKEY_LOCAL_MACHINE, KEY_QUERY_VALUE, KEY_SET_VALUE};
use winreg::RegKey;

use crate::windows::{DesktopApi, Hive, Registry};

fn predef(hive: Hive) -> RegKey {
    match hive {
        Hive::LocalMachine => RegKey::predef(HKEY_LOCAL_MACHINE),
        Hive::CurrentUser => RegKey::predef(HKEY_CURRENT_USER),
    }
}

/// The live registry through winreg.
#[derive(Debug, Default, Clone, Copy)]
pub struct WinRegistry;

impl Registry for WinRegistry {
    fn get_string(&self, hive: Hive, key: &str, name: &str) -> io::Result<String> {
        predef(hive).open_subkey_with_flags(key, KEY_QUERY_VALUE)?.get_value(name)
    }

    fn get_u32(&self, hive: Hive, key: &str, name: &str) -> io::Result<u32> {
        predef(hive).open_subkey_with_flags(key, KEY_QUERY_VALUE)?.get_value(name)
    }

    fn set_string(&self, hive: Hive, key: &str, name: &str, value: &str) -> io::Result<()> {
        let (subkey, _) = predef(hive).create_subkey_with_flags(key, KEY_SET_VALUE)?;
        subkey.set_value(name, &value)
    }

    fn set_u32(&self, hive: Hive, key: &str, name: &str, value: u32) -> io::Result<()> {
        let (subkey, _) = predef(hive).create_subkey_with_flags(key, KEY_SET_VALUE)?;
        subkey.set_value(name, &value)
    }
}

/// `SystemParametersInfoW` from user32.
#[derive(Debug, Default, Clone, Copy)]
pub struct User32Desktop;

impl DesktopApi for User32Desktop {
    fn get_wallpaper(&self, buf: &mut [u16]) -> io::Result<()> {
        let ok = unsafe {
            SystemParametersInfoW(
                SPI_GETDESKWALLPAPER,
                buf.len() as u32,
                buf.as_mut_ptr() as *mut c_void,
                0,
            )
        };
        if ok == 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    fn set_wallpaper(&self, path: &[u16]) -> io::Result<()> {
        // Write to the user profile and broadcast WM_SETTINGCHANGE.
        let ok = unsafe {
            SystemParametersInfoW(
                SPI_SETDESKWALLPAPER,
                0,
                path.as_ptr() as *mut c_void,
                SPIF_UPDATEINIFILE | SPIF_SENDWININICHANGE,
            )
        };
        if ok == 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}

//! Chrome discovery and launch configuration.

use anyhow::{Result, anyhow};
use chromiumoxide::browser::BrowserConfig;
use std::env;
use std::path::PathBuf;
use std::process::Command;

/// Finds the Chrome executable on the system.
///
/// Checks `CHROME_BIN` first, then well-known binary names on `PATH`.
///
/// # Errors
///
/// Returns an error if Chrome cannot be found.
pub fn find_chrome_executable() -> Result<PathBuf> {
    if let Ok(chrome_bin) = env::var("CHROME_BIN") {
        let path = PathBuf::from(&chrome_bin);
        if path.exists() {
            return Ok(path);
        }
    }

    let path_candidates = ["google-chrome", "chromium", "chromium-browser"];

    for candidate in path_candidates {
        if let Ok(output) = Command::new(candidate).arg("--version").output() {
            let stdout = String::from_utf8_lossy(&output.stdout);
            let stderr = String::from_utf8_lossy(&output.stderr);

            // Snap stubs don't output version info and may print snap messages
            if (stdout.contains("Chrome") || stdout.contains("Chromium"))
                && !stderr.contains("snap")
            {
                return Ok(PathBuf::from(candidate));
            }
        }
    }

    Err(anyhow!(
        "Chrome/Chromium executable not found. Install Chrome or set CHROME_BIN."
    ))
}

/// Builds the headless launch configuration at the given viewport size.
///
/// # Errors
///
/// Returns an error if Chrome cannot be found or the config fails to build.
pub fn headless_config(viewport_width: u32, viewport_height: u32) -> Result<BrowserConfig> {
    let chrome_path = find_chrome_executable()?;

    BrowserConfig::builder()
        .chrome_executable(chrome_path)
        .no_sandbox()
        .window_size(viewport_width, viewport_height)
        .arg("--force-device-scale-factor=1")
        .arg("--hide-scrollbars")
        .arg("--disable-gpu")
        .arg("--disable-features=OverlayScrollbar")
        .arg("--allow-file-access-from-files")
        .arg("--disable-dev-shm-usage")
        .arg("--disable-extensions")
        .arg("--disable-background-networking")
        .arg("--disable-sync")
        .arg("--force-color-profile=sRGB")
        .arg("--mute-audio")
        .build()
        .map_err(|message| anyhow!("Browser config error: {message}"))
}

//! Chrome/Chromium executable discovery
//!
//! The page fetcher drives a locally installed browser rather than bundling
//! one. Discovery checks the `CHROME` environment variable, then well-known
//! binary names on `PATH`, then platform install locations.

use std::fmt;
use std::path::PathBuf;

const BINARY_NAMES: &[&str] = &[
    "chrome",
    "google-chrome",
    "google-chrome-stable",
    "chromium",
    "chromium-browser",
];

/// No usable browser executable was found
#[derive(Debug, Clone)]
pub struct ChromeNotFound {
    /// Locations that were checked, in order
    pub checked: Vec<PathBuf>,
}

impl fmt::Display for ChromeNotFound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Chrome/Chromium not found. Checked {} locations:",
            self.checked.len()
        )?;
        for path in &self.checked {
            writeln!(f, "  - {}", path.display())?;
        }
        write!(f, "{}", installation_instructions())
    }
}

impl std::error::Error for ChromeNotFound {}

/// Finds a Chrome or Chromium executable, or reports everywhere it looked
pub fn locate_chrome() -> Result<PathBuf, ChromeNotFound> {
    let mut checked = Vec::new();

    if let Ok(value) = std::env::var("CHROME") {
        let path = PathBuf::from(&value);
        checked.push(path.clone());
        if path.exists() {
            tracing::debug!("Using browser from CHROME environment variable: {value}");
            return Ok(path);
        }
    }

    for name in BINARY_NAMES {
        match which::which(name) {
            Ok(path) => {
                tracing::debug!("Found browser on PATH: {}", path.display());
                return Ok(path);
            }
            Err(_) => checked.push(PathBuf::from(name)),
        }
    }

    for path in standard_paths() {
        checked.push(path.clone());
        if path.exists() {
            tracing::debug!("Found browser at standard location: {}", path.display());
            return Ok(path);
        }
    }

    Err(ChromeNotFound { checked })
}

/// Whether a browser executable is available on this host
pub fn is_chrome_available() -> bool {
    locate_chrome().is_ok()
}

fn standard_paths() -> Vec<PathBuf> {
    #[cfg(target_os = "linux")]
    {
        vec![
            PathBuf::from("/usr/bin/google-chrome"),
            PathBuf::from("/usr/bin/google-chrome-stable"),
            PathBuf::from("/usr/bin/chromium"),
            PathBuf::from("/usr/bin/chromium-browser"),
            PathBuf::from("/snap/bin/chromium"),
            PathBuf::from("/opt/google/chrome/chrome"),
        ]
    }

    #[cfg(target_os = "macos")]
    {
        vec![
            PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome"),
            PathBuf::from("/Applications/Chromium.app/Contents/MacOS/Chromium"),
        ]
    }

    #[cfg(not(any(target_os = "linux", target_os = "macos")))]
    {
        Vec::new()
    }
}

fn installation_instructions() -> &'static str {
    #[cfg(target_os = "linux")]
    return "Install Chrome via:\n  - apt install chromium-browser (Debian/Ubuntu)\n  - dnf install chromium (Fedora)\n  - Or download from https://www.google.com/chrome/";

    #[cfg(target_os = "macos")]
    return "Install Chrome via:\n  - brew install --cask google-chrome\n  - Or download from https://www.google.com/chrome/";

    #[cfg(not(any(target_os = "linux", target_os = "macos")))]
    return "Install Chrome or Chromium from https://www.chromium.org/getting-involved/download-chromium/";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locate_chrome_reports_checked_paths_on_failure() {
        match locate_chrome() {
            Ok(path) => assert!(path.exists()),
            Err(err) => {
                assert!(!err.checked.is_empty());
                let message = err.to_string();
                assert!(message.contains("not found"));
                assert!(message.contains("Install"));
            }
        }
    }

    #[test]
    fn test_is_chrome_available_does_not_panic() {
        let _ = is_chrome_available();
    }
}

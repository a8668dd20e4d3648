use std::path::PathBuf;

pub const PROGRAM_NAME: &str = "sift";

/// Env var naming a `log` level filter for stderr diagnostics.
pub const PROGRAM_LOG_LEVEL: &str = "SIFT_LOG_LEVEL";

/// Env var that disables the history log when set to `0` or `false`.
pub const HISTORY_DISABLED_ENV: &str = "SIFT_HISTORY";

/// Default file name for exported store images.
pub const IMAGE_FILE_NAME: &str = "store.sift";

pub fn xdg_or_home(xdg_var: &str, home_suffix: &str) -> PathBuf {
    if let Some(dir) = std::env::var_os(xdg_var) {
        PathBuf::from(dir)
    } else {
        std::env::var_os("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
            .join(home_suffix)
    }
}

/// Directory for engine state (history log, default image exports).
pub fn state_dir() -> Option<PathBuf> {
    if let Some(xdg_state) = std::env::var_os("XDG_STATE_HOME")
        && !xdg_state.is_empty()
    {
        return Some(PathBuf::from(xdg_state).join(PROGRAM_NAME));
    }

    dirs::state_dir()
        .or_else(dirs::data_local_dir)
        .map(|p| p.join(PROGRAM_NAME))
}

/// Cache-style scratch directory.
pub fn sift_dir() -> PathBuf {
    xdg_or_home("XDG_CACHE_HOME", ".cache").join(PROGRAM_NAME)
}

/// Default path for an exported store image.
pub fn default_image_path() -> PathBuf {
    sift_dir().join(IMAGE_FILE_NAME)
}

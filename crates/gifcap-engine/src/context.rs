//! Application context: configuration and output locations.

use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use tracing::{debug, info, instrument};

use gifcap_clipboard::ClipboardConfig;
use gifcap_ipc::{RecorderConfig, VideoFormat};

use crate::error::RecorderError;
use crate::RecorderResult;

/// Environment variable overriding the root directory.
pub const HOME_ENV_VAR: &str = "GIFCAP_HOME";

/// Optional configuration file inside the root directory.
pub const CONFIG_FILE_NAME: &str = "gifcap.json";

const VIDEO_DIR: &str = "video";
const GIF_DIR: &str = "gif";
const LOG_DIR: &str = "logs";

/// Where recordings, GIFs and logs are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    root: PathBuf,
}

impl OutputLayout {
    /// Layout below `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn video_dir(&self) -> PathBuf {
        self.root.join(VIDEO_DIR)
    }

    pub fn gif_dir(&self) -> PathBuf {
        self.root.join(GIF_DIR)
    }

    pub fn log_dir(&self) -> PathBuf {
        self.root.join(LOG_DIR)
    }

    /// Create the `video/`, `gif/` and `logs/` directories.
    pub fn ensure_dirs(&self) -> io::Result<()> {
        for dir in [self.video_dir(), self.gif_dir(), self.log_dir()] {
            fs::create_dir_all(&dir)?;
        }
        Ok(())
    }

    /// A fresh video path named after the current time.
    pub fn video_path(&self, format: VideoFormat) -> PathBuf {
        unique_timestamped(&self.video_dir(), format.extension(), Local::now())
    }

    /// A fresh GIF path named after the current time.
    pub fn gif_path(&self) -> PathBuf {
        unique_timestamped(&self.gif_dir(), "gif", Local::now())
    }
}

/// `<dir>/<YYYYmmdd_HHMMSS>.<ext>`, with `_N` appended if the name is taken.
fn unique_timestamped(dir: &Path, ext: &str, now: DateTime<Local>) -> PathBuf {
    let stem = now.format("%Y%m%d_%H%M%S").to_string();
    let mut path = dir.join(format!("{}.{}", stem, ext));
    let mut n = 1;
    while path.exists() {
        path = dir.join(format!("{}_{}.{}", stem, n, ext));
        n += 1;
    }
    path
}

/// Configuration plus output layout, built once at startup.
#[derive(Debug, Clone)]
pub struct AppContext {
    config: RecorderConfig,
    layout: OutputLayout,
}

impl AppContext {
    /// Build a context for `root` and create its directories.
    pub fn new(root: impl Into<PathBuf>, config: RecorderConfig) -> RecorderResult<Self> {
        config.validate()?;
        let layout = OutputLayout::new(root);
        layout.ensure_dirs()?;
        info!(root = %layout.root().display(), "Output directories ready");
        Ok(Self { config, layout })
    }

    /// Load from the environment.
    ///
    /// The root is `$GIFCAP_HOME`, else the configured `output_root`, else
    /// the executable's directory. `gifcap.json` is read from `$GIFCAP_HOME`
    /// or the executable's directory.
    #[instrument(name = "context_load")]
    pub fn load() -> RecorderResult<Self> {
        let home = env::var_os(HOME_ENV_VAR).map(PathBuf::from);
        let exe = env::current_exe()?;
        let exe_dir = exe.parent().unwrap_or_else(|| Path::new("."));
        Self::resolve(home, exe_dir)
    }

    fn resolve(home: Option<PathBuf>, exe_dir: &Path) -> RecorderResult<Self> {
        let config_dir = home.as_deref().unwrap_or(exe_dir);
        let config = read_config(&config_dir.join(CONFIG_FILE_NAME))?;
        let root = home
            .or_else(|| config.output_root.clone())
            .unwrap_or_else(|| exe_dir.to_path_buf());
        Self::new(root, config)
    }

    pub fn config(&self) -> &RecorderConfig {
        &self.config
    }

    pub fn layout(&self) -> &OutputLayout {
        &self.layout
    }

    /// Clipboard retry policy from the configuration.
    pub fn clipboard_config(&self) -> ClipboardConfig {
        ClipboardConfig {
            open_attempts: self.config.clipboard_open_attempts,
            retry_delay: self.config.clipboard_retry_delay(),
        }
    }
}

/// Read a configuration file; a missing file yields the defaults.
fn read_config(path: &Path) -> RecorderResult<RecorderConfig> {
    if !path.is_file() {
        debug!(path = %path.display(), "No configuration file, using defaults");
        return Ok(RecorderConfig::default());
    }
    let text = fs::read_to_string(path)?;
    let config = serde_json::from_str(&text).map_err(|source| RecorderError::ConfigParse {
        path: path.to_path_buf(),
        source,
    })?;
    info!(path = %path.display(), "Loaded configuration");
    Ok(config)
}

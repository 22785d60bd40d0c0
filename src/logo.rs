//! Issuer logo loading.
//!
//! Decoding happens off the async thread with a bounded wait. Any failure is
//! reported to the caller, who falls back to a text-only header.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

pub const MAX_WIDTH_MM: f32 = 60.0;
pub const MAX_HEIGHT_MM: f32 = 40.0;

#[derive(Debug, Error)]
pub enum LogoError {
    #[error("cannot read logo {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot decode logo: {0}")]
    Decode(#[from] image::ImageError),
    #[error("logo has no pixels")]
    Empty,
    #[error("logo did not load within {0:?}")]
    Timeout(Duration),
    #[error("logo task failed: {0}")]
    Task(String),
}

/// A decoded logo, flattened to 8-bit RGB over white.
#[derive(Debug, Clone, PartialEq)]
pub struct Logo {
    width: u32,
    height: u32,
    rgb: Arc<Vec<u8>>,
}

impl Logo {
    pub fn decode(bytes: &[u8]) -> Result<Self, LogoError> {
        let rgba = image::load_from_memory(bytes)?.to_rgba8();
        let (width, height) = rgba.dimensions();
        if width == 0 || height == 0 {
            return Err(LogoError::Empty);
        }

        let mut rgb = Vec::with_capacity(width as usize * height as usize * 3);
        for pixel in rgba.pixels() {
            let [r, g, b, a] = pixel.0;
            let alpha = a as u16;
            for channel in [r, g, b] {
                rgb.push(((channel as u16 * alpha + 255 * (255 - alpha)) / 255) as u8);
            }
        }

        Ok(Self { width, height, rgb: Arc::new(rgb) })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn rgb(&self) -> &[u8] {
        &self.rgb
    }

    /// Largest size with the natural aspect ratio inside `max_width × max_height`.
    pub fn fit_within(&self, max_width: f32, max_height: f32) -> (f32, f32) {
        let (w, h) = (self.width as f32, self.height as f32);
        let ratio = (max_width / w).min(max_height / h);
        (w * ratio, h * ratio)
    }
}

fn read_and_decode(path: &Path) -> Result<Logo, LogoError> {
    let bytes = std::fs::read(path).map_err(|source| LogoError::Io { path: path.to_path_buf(), source })?;
    Logo::decode(&bytes)
}

/// Reads and decodes the logo on the blocking pool, giving up after `timeout`.
pub async fn load_logo(path: &Path, timeout: Duration) -> Result<Logo, LogoError> {
    let owned = path.to_path_buf();
    let task = tokio::task::spawn_blocking(move || read_and_decode(&owned));

    match tokio::time::timeout(timeout, task).await {
        Err(_) => Err(LogoError::Timeout(timeout)),
        Ok(Err(join)) => Err(LogoError::Task(join.to_string())),
        Ok(Ok(result)) => result,
    }
}

/// Like [`load_logo`] but degrades every failure to `None`.
pub async fn try_load_logo(path: Option<&Path>, timeout: Duration) -> Option<Logo> {
    let path = path?;
    match load_logo(path, timeout).await {
        Ok(logo) => {
            log::debug!("logo {} decoded ({}x{})", path.display(), logo.width, logo.height);
            Some(logo)
        }
        Err(e) => {
            log::warn!("{}, using a text-only header", e);
            None
        }
    }
}

/// A logo path that never finishes loading until released.
#[cfg(all(test, unix))]
pub(crate) mod testing {
    use std::fs::OpenOptions;
    use std::path::{Path, PathBuf};
    use std::process::Command;

    /// A named pipe: reading it blocks on open until a writer shows up.
    pub struct StalledLogo {
        pub path: PathBuf,
    }

    impl StalledLogo {
        pub fn create(dir: &Path) -> Self {
            let path = dir.join("stalled.png");
            let status = Command::new("mkfifo").arg(&path).status().unwrap();
            assert!(status.success(), "mkfifo failed");
            Self { path }
        }

        /// Opens and closes the writer end so the blocked reader sees EOF
        /// and its blocking thread can exit.
        pub fn release(self) {
            drop(OpenOptions::new().write(true).open(&self.path).unwrap());
        }
    }
}

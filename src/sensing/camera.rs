use anyhow::{bail, Context, Result};
use image::{imageops::FilterType, RgbImage};
use serde::{Deserialize, Serialize};
use std::{
    collections::VecDeque,
    fs,
    path::{Path, PathBuf},
};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info};

const FRAME_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "bmp", "webp"];

/// Source of face frames. Exclusively owned by one capture session at a time.
pub trait Camera: Send {
    fn open(&mut self) -> Result<()>;

    /// Next frame, or `None` once the source has nothing left to give.
    fn grab_frame(&mut self) -> Result<Option<RgbImage>>;

    fn release(&mut self);

    fn describe(&self) -> String {
        "camera".to_string()
    }
}

/// An opened camera that is released exactly once: on `release()` or on drop,
/// whichever comes first.
pub struct CameraLease {
    camera: Box<dyn Camera>,
    released: bool,
}

impl CameraLease {
    /// Opens the camera. On failure nothing was acquired and nothing is released.
    pub fn acquire(mut camera: Box<dyn Camera>) -> Result<Self> {
        let name = camera.describe();
        camera
            .open()
            .with_context(|| format!("failed to open {name}"))?;
        log_info!("Acquired {name}");
        Ok(Self {
            camera,
            released: false,
        })
    }

    pub fn grab_frame(&mut self) -> Result<Option<RgbImage>> {
        if self.released {
            bail!("camera already released");
        }
        self.camera.grab_frame()
    }

    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.camera.release();
        log_info!("Released {}", self.camera.describe());
    }
}

impl Drop for CameraLease {
    fn drop(&mut self) {
        self.release();
    }
}

/// Opens and immediately releases the camera to see whether it is usable.
pub fn check_camera(camera: Box<dyn Camera>) -> bool {
    match CameraLease::acquire(camera) {
        Ok(mut lease) => {
            lease.release();
            true
        }
        Err(err) => {
            log_debug!("camera check failed: {err:#}");
            false
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Directory holding one still image per face, captured in file-name order.
    pub frames_dir: PathBuf,
    pub frame_width: u32,
    pub frame_height: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            frames_dir: PathBuf::from("frames"),
            frame_width: 640,
            frame_height: 480,
        }
    }
}

/// Replays still images from a directory as camera frames, resized to the
/// configured capture resolution.
pub struct DirectoryCamera {
    dir: PathBuf,
    width: u32,
    height: u32,
    pending: VecDeque<PathBuf>,
}

impl DirectoryCamera {
    pub fn new(config: &CameraConfig) -> Self {
        Self {
            dir: config.frames_dir.clone(),
            width: config.frame_width,
            height: config.frame_height,
            pending: VecDeque::new(),
        }
    }
}

impl Camera for DirectoryCamera {
    fn open(&mut self) -> Result<()> {
        let mut frames = list_frames(&self.dir)?;
        if frames.is_empty() {
            bail!("no frames found in {}", self.dir.display());
        }
        frames.sort();
        log_debug!("{} frames queued from {}", frames.len(), self.dir.display());
        self.pending = frames.into();
        Ok(())
    }

    fn grab_frame(&mut self) -> Result<Option<RgbImage>> {
        let Some(path) = self.pending.pop_front() else {
            return Ok(None);
        };
        let frame = image::open(&path)
            .with_context(|| format!("failed to decode frame {}", path.display()))?
            .to_rgb8();

        if self.width == 0 || self.height == 0 || frame.dimensions() == (self.width, self.height) {
            return Ok(Some(frame));
        }
        Ok(Some(image::imageops::resize(
            &frame,
            self.width,
            self.height,
            FilterType::Triangle,
        )))
    }

    fn release(&mut self) {
        self.pending.clear();
    }

    fn describe(&self) -> String {
        format!("frame directory {}", self.dir.display())
    }
}

fn list_frames(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir)
        .with_context(|| format!("camera not accessible: {}", dir.display()))?;

    let mut frames = Vec::new();
    for entry in entries {
        let path = entry?.path();
        let is_frame = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| FRAME_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
            .unwrap_or(false);
        if path.is_file() && is_frame {
            frames.push(path);
        }
    }
    Ok(frames)
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    pub(crate) enum ScriptedFrame {
        Image(RgbImage),
        Fail,
    }

    #[derive(Clone, Default)]
    pub(crate) struct CameraCounters {
        pub opens: Arc<AtomicUsize>,
        pub releases: Arc<AtomicUsize>,
        pub grabs: Arc<AtomicUsize>,
    }

    impl CameraCounters {
        pub fn releases(&self) -> usize {
            self.releases.load(Ordering::SeqCst)
        }

        pub fn grabs(&self) -> usize {
            self.grabs.load(Ordering::SeqCst)
        }
    }

    /// Plays back a fixed list of frames; runs dry afterwards.
    pub(crate) struct ScriptedCamera {
        pub frames: VecDeque<ScriptedFrame>,
        pub fail_open: bool,
        pub counters: CameraCounters,
    }

    impl ScriptedCamera {
        pub fn new(frames: Vec<ScriptedFrame>) -> Self {
            Self {
                frames: frames.into(),
                fail_open: false,
                counters: CameraCounters::default(),
            }
        }

        pub fn broken() -> Self {
            Self {
                fail_open: true,
                ..Self::new(Vec::new())
            }
        }
    }

    impl Camera for ScriptedCamera {
        fn open(&mut self) -> Result<()> {
            self.counters.opens.fetch_add(1, Ordering::SeqCst);
            if self.fail_open {
                bail!("device busy");
            }
            Ok(())
        }

        fn grab_frame(&mut self) -> Result<Option<RgbImage>> {
            self.counters.grabs.fetch_add(1, Ordering::SeqCst);
            match self.frames.pop_front() {
                Some(ScriptedFrame::Image(image)) => Ok(Some(image)),
                Some(ScriptedFrame::Fail) => bail!("frame read failed"),
                None => Ok(None),
            }
        }

        fn release(&mut self) {
            self.counters.releases.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use image::Rgb;
    use tempfile::TempDir;

    #[test]
    fn lease_releases_once_even_when_released_explicitly() {
        let camera = ScriptedCamera::new(Vec::new());
        let counters = camera.counters.clone();

        let mut lease = CameraLease::acquire(Box::new(camera)).unwrap();
        lease.release();
        lease.release();
        drop(lease);

        assert_eq!(counters.releases(), 1);
    }

    #[test]
    fn lease_releases_on_drop() {
        let camera = ScriptedCamera::new(Vec::new());
        let counters = camera.counters.clone();
        {
            let _lease = CameraLease::acquire(Box::new(camera)).unwrap();
        }
        assert_eq!(counters.releases(), 1);
    }

    #[test]
    fn failed_open_acquires_and_releases_nothing() {
        let camera = ScriptedCamera::broken();
        let counters = camera.counters.clone();

        let err = CameraLease::acquire(Box::new(camera)).err().unwrap();
        assert!(format!("{err:#}").contains("device busy"));
        assert_eq!(counters.releases(), 0);
    }

    #[test]
    fn grabbing_after_release_fails() {
        let camera = ScriptedCamera::new(vec![ScriptedFrame::Image(RgbImage::new(3, 3))]);
        let mut lease = CameraLease::acquire(Box::new(camera)).unwrap();
        lease.release();
        assert!(lease.grab_frame().is_err());
    }

    #[test]
    fn check_camera_reports_availability() {
        assert!(check_camera(Box::new(ScriptedCamera::new(Vec::new()))));
        assert!(!check_camera(Box::new(ScriptedCamera::broken())));
    }

    #[test]
    fn directory_camera_replays_frames_in_name_order() {
        let dir = TempDir::new().unwrap();
        RgbImage::from_pixel(8, 8, Rgb([255, 0, 0]))
            .save(dir.path().join("2_red.png"))
            .unwrap();
        RgbImage::from_pixel(8, 8, Rgb([0, 0, 255]))
            .save(dir.path().join("1_blue.png"))
            .unwrap();
        fs::write(dir.path().join("notes.txt"), "not a frame").unwrap();

        let config = CameraConfig {
            frames_dir: dir.path().to_path_buf(),
            frame_width: 8,
            frame_height: 8,
        };
        let mut camera = DirectoryCamera::new(&config);
        camera.open().unwrap();

        let first = camera.grab_frame().unwrap().unwrap();
        assert_eq!(*first.get_pixel(0, 0), Rgb([0, 0, 255]));
        let second = camera.grab_frame().unwrap().unwrap();
        assert_eq!(*second.get_pixel(0, 0), Rgb([255, 0, 0]));
        assert!(camera.grab_frame().unwrap().is_none());
    }

    #[test]
    fn directory_camera_resizes_to_capture_resolution() {
        let dir = TempDir::new().unwrap();
        RgbImage::from_pixel(30, 20, Rgb([0, 255, 0]))
            .save(dir.path().join("face.png"))
            .unwrap();

        let config = CameraConfig {
            frames_dir: dir.path().to_path_buf(),
            frame_width: 12,
            frame_height: 9,
        };
        let mut camera = DirectoryCamera::new(&config);
        camera.open().unwrap();
        assert_eq!(camera.grab_frame().unwrap().unwrap().dimensions(), (12, 9));
    }

    #[test]
    fn missing_or_empty_directory_cannot_open() {
        let dir = TempDir::new().unwrap();
        let empty = CameraConfig {
            frames_dir: dir.path().to_path_buf(),
            ..CameraConfig::default()
        };
        assert!(DirectoryCamera::new(&empty).open().is_err());

        let missing = CameraConfig {
            frames_dir: dir.path().join("nope"),
            ..CameraConfig::default()
        };
        assert!(DirectoryCamera::new(&missing).open().is_err());
    }
}

//! Plant camera: captures a frame into the gallery as a timestamped JPEG.
//!
//! The production path shells out to `libcamera-still` (the supported CLI on
//! current Pi kernels). When no capture backend produces a frame, a
//! synthesized plant-like test pattern goes through the same JPEG path so
//! the capture/classify pipeline stays exercised on hardware-less machines.

use std::fs::DirBuilder;
use std::os::unix::fs::DirBuilderExt;
use std::path::{Path, PathBuf};
use std::process::Command;

use chrono::Local;
use image::{Rgb, RgbImage};
use log::{info, warn};
use rand::random_range;

const JPEG_QUALITY: u8 = 85;
const FRAME_WIDTH: u32 = 640;
const FRAME_HEIGHT: u32 = 480;

/// A captured frame on disk.
#[derive(Debug, Clone)]
pub struct Capture {
    pub filename: String,
    pub path: PathBuf,
}

/// Camera contract. `take_photo` returns `None` when no frame could be
/// produced this cycle; the caller skips the cycle and tries again on the
/// next one.
pub trait CameraDevice: Send {
    fn take_photo(&mut self) -> Option<Capture>;
}

/// The production camera: gallery management + libcamera capture +
/// synthesized fallback frame.
pub struct GalleryCamera {
    gallery_dir: PathBuf,
    synthesize_on_failure: bool,
}

impl GalleryCamera {
    pub fn new(gallery_dir: impl Into<PathBuf>, synthesize_on_failure: bool) -> Self {
        Self {
            gallery_dir: gallery_dir.into(),
            synthesize_on_failure,
        }
    }

    fn ensure_gallery(&self) -> std::io::Result<()> {
        if self.gallery_dir.exists() {
            return Ok(());
        }
        DirBuilder::new()
            .recursive(true)
            .mode(0o755)
            .create(&self.gallery_dir)
    }

    fn next_filename() -> String {
        format!("plant_{}.jpg", Local::now().format("%Y%m%d_%H%M%S"))
    }

    fn try_libcamera(&self, path: &Path) -> bool {
        let status = Command::new("libcamera-still")
            .arg("-o")
            .arg(path)
            .args(["--width", "640", "--height", "480", "-t", "500", "-n"])
            .output();

        match status {
            Ok(output) if output.status.success() => std::fs::metadata(path)
                .map(|meta| meta.len() > 0)
                .unwrap_or(false),
            _ => false,
        }
    }
}

impl CameraDevice for GalleryCamera {
    fn take_photo(&mut self) -> Option<Capture> {
        if let Err(err) = self.ensure_gallery() {
            warn!(
                "[Camera] cannot create gallery {}: {err}",
                self.gallery_dir.display()
            );
            return None;
        }

        let filename = Self::next_filename();
        let path = self.gallery_dir.join(&filename);

        let frame = if self.try_libcamera(&path) {
            info!("[Camera] captured via libcamera-still: {}", path.display());
            match image::open(&path) {
                Ok(frame) => frame.to_rgb8(),
                Err(err) => {
                    warn!("[Camera] captured frame is unreadable: {err:#}");
                    return None;
                }
            }
        } else if self.synthesize_on_failure {
            warn!("[Camera] hardware capture failed; writing synthesized test frame");
            synthesize_test_frame()
        } else {
            warn!("[Camera] no capture backend produced a frame");
            return None;
        };

        // Both capture paths go through the same enhance-then-encode step.
        match save_jpeg(&enhance(&frame), &path) {
            Ok(()) => Some(Capture { filename, path }),
            Err(err) => {
                warn!("[Camera] failed to write frame: {err:#}");
                None
            }
        }
    }
}

/// Writes `img` as a JPEG at the gallery quality setting.
pub fn save_jpeg(img: &RgbImage, path: &Path) -> anyhow::Result<()> {
    let file = std::fs::File::create(path)?;
    let mut writer = std::io::BufWriter::new(file);
    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut writer, JPEG_QUALITY);
    img.write_with_encoder(encoder)?;
    Ok(())
}

/// Mild quality pass applied to frames the engine encodes itself: auto
/// white balance toward mid-gray, then an unsharp mask.
pub fn enhance(img: &RgbImage) -> RgbImage {
    let (width, height) = img.dimensions();
    let pixel_count = (width * height) as f64;

    let mut sums = [0.0f64; 3];
    for pixel in img.pixels() {
        for c in 0..3 {
            sums[c] += pixel[c] as f64;
        }
    }
    let scales: Vec<f64> = sums
        .iter()
        .map(|sum| {
            let mean = sum / pixel_count;
            if mean > 0.0 {
                128.0 / mean
            } else {
                1.0
            }
        })
        .collect();

    let mut balanced = RgbImage::new(width, height);
    for (x, y, pixel) in img.enumerate_pixels() {
        let mut out = [0u8; 3];
        for c in 0..3 {
            out[c] = (pixel[c] as f64 * scales[c]).round().clamp(0.0, 255.0) as u8;
        }
        balanced.put_pixel(x, y, Rgb(out));
    }

    let blurred = image::imageops::blur(&balanced, 3.0);
    let mut sharpened = RgbImage::new(width, height);
    for (x, y, pixel) in balanced.enumerate_pixels() {
        let soft = blurred.get_pixel(x, y);
        let mut out = [0u8; 3];
        for c in 0..3 {
            let v = 1.5 * pixel[c] as f64 - 0.5 * soft[c] as f64;
            out[c] = v.round().clamp(0.0, 255.0) as u8;
        }
        sharpened.put_pixel(x, y, Rgb(out));
    }
    sharpened
}

/// Plant-like pattern: noisy soil background with a handful of green blobs.
fn synthesize_test_frame() -> RgbImage {
    let mut img = RgbImage::new(FRAME_WIDTH, FRAME_HEIGHT);

    for pixel in img.pixels_mut() {
        let noise = random_range(-20i32..20);
        *pixel = Rgb([
            (70 + noise).clamp(0, 255) as u8,
            (80 + noise).clamp(0, 255) as u8,
            (60 + noise).clamp(0, 255) as u8,
        ]);
    }

    for _ in 0..8 {
        let cx = 320 + random_range(-100i32..100);
        let cy = 200 + random_range(-80i32..80);
        let radius = random_range(30i32..60);
        let green = random_range(100u8..180);
        let color = Rgb([random_range(50u8..90), green, random_range(40u8..80)]);

        for dy in -radius..=radius {
            for dx in -radius..=radius {
                if dx * dx + dy * dy > radius * radius {
                    continue;
                }
                let x = cx + dx;
                let y = cy + dy;
                if x >= 0 && y >= 0 && (x as u32) < FRAME_WIDTH && (y as u32) < FRAME_HEIGHT {
                    img.put_pixel(x as u32, y as u32, color);
                }
            }
        }
    }

    img
}

/// Test camera: writes a solid-color frame into its gallery on every call.
pub struct FixedFrameCamera {
    gallery_dir: PathBuf,
    color: Rgb<u8>,
    counter: u32,
}

impl FixedFrameCamera {
    pub fn new(gallery_dir: impl Into<PathBuf>, color: Rgb<u8>) -> Self {
        Self {
            gallery_dir: gallery_dir.into(),
            color,
            counter: 0,
        }
    }
}

impl CameraDevice for FixedFrameCamera {
    fn take_photo(&mut self) -> Option<Capture> {
        std::fs::create_dir_all(&self.gallery_dir).ok()?;
        self.counter += 1;
        let filename = format!("plant_fixed_{:04}.jpg", self.counter);
        let path = self.gallery_dir.join(&filename);
        let img = RgbImage::from_pixel(64, 64, self.color);
        save_jpeg(&img, &path).ok()?;
        Some(Capture { filename, path })
    }
}

/// Test camera simulating a capture failure: never produces a frame.
pub struct OfflineCamera;

impl CameraDevice for OfflineCamera {
    fn take_photo(&mut self) -> Option<Capture> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_gallery(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "leafsense_gallery_{tag}_{}",
            std::process::id()
        ));
        std::fs::remove_dir_all(&dir).ok();
        dir
    }

    #[test]
    fn filename_matches_gallery_pattern() {
        let name = GalleryCamera::next_filename();
        assert!(name.starts_with("plant_"));
        assert!(name.ends_with(".jpg"));
        // plant_YYYYMMDD_HHMMSS.jpg
        assert_eq!(name.len(), "plant_20250101_120000.jpg".len());
    }

    #[test]
    fn synthesized_frame_lands_in_gallery() {
        let dir = temp_gallery("synth");
        let mut camera = GalleryCamera::new(&dir, true);

        let capture = camera.take_photo().expect("synthesized frame");
        assert!(capture.path.exists());
        assert!(capture.filename.starts_with("plant_"));

        let decoded = image::open(&capture.path).unwrap().to_rgb8();
        assert_eq!(decoded.dimensions(), (FRAME_WIDTH, FRAME_HEIGHT));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn capture_failure_yields_none() {
        let dir = temp_gallery("offline");
        let mut camera = GalleryCamera::new(&dir, false);
        assert!(camera.take_photo().is_none());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn fixed_frame_camera_produces_decodable_jpegs() {
        let dir = temp_gallery("fixed");
        let mut camera = FixedFrameCamera::new(&dir, Rgb([30, 200, 40]));
        let capture = camera.take_photo().unwrap();
        let decoded = image::open(&capture.path).unwrap().to_rgb8();
        assert_eq!(decoded.dimensions(), (64, 64));
        std::fs::remove_dir_all(&dir).ok();
    }
}

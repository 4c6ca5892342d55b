use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{ColorType, DynamicImage, GenericImageView, Rgb, RgbImage};
use std::path::{Component, Path, PathBuf};
use tracing::{error, info};
use uuid::Uuid;

use crate::config::StorageConfig;
use crate::utils::error::{AppError, Result};

const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp"];

/// Uploaded item photos. Every stored image is re-encoded as JPEG, flattened
/// onto white and capped to `max_dimension` on its longest side.
#[derive(Debug, Clone)]
pub struct ImageStore {
    /// Directory as configured, used to build the paths handed to clients.
    dir: PathBuf,
    /// Absolute, symlink-free form of `dir`.
    root: PathBuf,
    max_dimension: u32,
    jpeg_quality: u8,
    max_images: usize,
}

/// Removes `.` and `..` without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(normalize(path))
    } else {
        Ok(normalize(&std::env::current_dir()?.join(path)))
    }
}

fn flatten_onto_white(image: &DynamicImage) -> RgbImage {
    if !image.color().has_alpha() {
        return image.to_rgb8();
    }
    let rgba = image.to_rgba8();
    let mut rgb = RgbImage::new(rgba.width(), rgba.height());
    for (x, y, pixel) in rgba.enumerate_pixels() {
        let [r, g, b, a] = pixel.0;
        let alpha = a as u16;
        let blend = |channel: u8| ((channel as u16 * alpha + 255 * (255 - alpha)) / 255) as u8;
        rgb.put_pixel(x, y, Rgb([blend(r), blend(g), blend(b)]));
    }
    rgb
}

fn encode_jpeg(bytes: &[u8], max_dimension: u32, quality: u8) -> Result<(Vec<u8>, (u32, u32))> {
    let mut image = image::load_from_memory(bytes)?;
    let original = image.dimensions();
    if original.0 > max_dimension || original.1 > max_dimension {
        image = image.resize(max_dimension, max_dimension, FilterType::Lanczos3);
    }

    let rgb = flatten_onto_white(&image);
    let mut encoded = Vec::new();
    JpegEncoder::new_with_quality(&mut encoded, quality).encode(
        rgb.as_raw(),
        rgb.width(),
        rgb.height(),
        ColorType::Rgb8,
    )?;
    Ok((encoded, (rgb.width(), rgb.height())))
}

impl ImageStore {
    pub fn new(config: &StorageConfig) -> Result<Self> {
        let dir = PathBuf::from(&config.upload_dir);
        std::fs::create_dir_all(&dir)?;
        let root = dir.canonicalize()?;
        Ok(Self {
            dir,
            root,
            max_dimension: config.max_dimension,
            jpeg_quality: config.jpeg_quality,
            max_images: config.max_upload_images,
        })
    }

    pub fn max_images(&self) -> usize {
        self.max_images
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn save_image(&self, filename: Option<&str>, bytes: Vec<u8>) -> Result<String> {
        let extension = filename
            .and_then(|name| Path::new(name).extension())
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
            return Err(AppError::Validation(format!(
                "Invalid file type. Allowed: {}",
                ALLOWED_EXTENSIONS.join(", ")
            )));
        }

        let (max_dimension, quality) = (self.max_dimension, self.jpeg_quality);
        let (encoded, (width, height)) =
            tokio::task::spawn_blocking(move || encode_jpeg(&bytes, max_dimension, quality))
                .await
                .map_err(|e| AppError::Internal(format!("Image processing task failed: {}", e)))??;

        let name = format!("{}.jpg", Uuid::new_v4());
        tokio::fs::write(self.root.join(&name), encoded).await?;
        info!("Saved image {} ({}x{})", name, width, height);

        Ok(self.dir.join(name).to_string_lossy().into_owned())
    }

    /// Saves each upload, skipping (and logging) the ones that fail.
    pub async fn save_images(&self, files: Vec<(Option<String>, Vec<u8>)>) -> Vec<String> {
        let mut saved = Vec::new();
        for (filename, bytes) in files {
            match self.save_image(filename.as_deref(), bytes).await {
                Ok(path) => saved.push(path),
                Err(e) => error!("Failed to save image {:?}: {}", filename, e),
            }
        }
        saved
    }

    /// Maps a client-supplied image path to a file inside the upload directory.
    pub fn resolve(&self, raw: &str) -> Result<PathBuf> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(AppError::Validation("Empty image path".to_string()));
        }

        let requested = absolute(Path::new(raw))?;
        let lexical_root = absolute(&self.dir)?;
        if !requested.starts_with(&lexical_root) && !requested.starts_with(&self.root) {
            return Err(AppError::Forbidden("Access denied: Invalid image path".to_string()));
        }
        if !requested.exists() {
            return Err(AppError::not_found(format!("Image {}", raw)));
        }

        // Symlinks must not lead out of the upload directory either.
        let canonical = requested.canonicalize()?;
        if !canonical.starts_with(&self.root) {
            return Err(AppError::Forbidden("Access denied: Invalid image path".to_string()));
        }
        Ok(canonical)
    }
}

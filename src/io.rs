// ============================================================================
// IMAGE + SETTINGS I/O — albedo/mask loading, alpha reattach, livery.json
// ============================================================================

use image::codecs::bmp::BmpEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::tga::TgaEncoder;
use image::{DynamicImage, GrayImage, ImageEncoder, ImageError, RgbImage, RgbaImage, imageops};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::ops::grading::Adjustments;
use crate::ops::text::TextStyle;
use crate::ops::transform::Interpolation;
use crate::project::Asset;

/// File name of the per-livery settings file.
pub const CONFIG_FILE_NAME: &str = "livery.json";

/// Default JPEG quality for `save_rgba`.
const JPEG_QUALITY: u8 = 92;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug)]
pub enum IoError {
    Io(std::io::Error),
    Image(ImageError),
    Json(serde_json::Error),
    InvalidInput(String),
}

impl std::fmt::Display for IoError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IoError::Io(e) => write!(f, "I/O error: {}", e),
            IoError::Image(e) => write!(f, "Image error: {}", e),
            IoError::Json(e) => write!(f, "Settings error: {}", e),
            IoError::InvalidInput(e) => write!(f, "Invalid input: {}", e),
        }
    }
}

impl std::error::Error for IoError {}

impl From<std::io::Error> for IoError {
    fn from(e: std::io::Error) -> Self {
        IoError::Io(e)
    }
}

impl From<ImageError> for IoError {
    fn from(e: ImageError) -> Self {
        IoError::Image(e)
    }
}

impl From<serde_json::Error> for IoError {
    fn from(e: serde_json::Error) -> Self {
        IoError::Json(e)
    }
}

// ============================================================================
// IMAGE LOADING
// ============================================================================

/// Load a color texture and split it into RGB and its 8-bit alpha.
/// Images without alpha get a fully opaque alpha plane.
pub fn load_albedo(path: &Path) -> Result<(RgbImage, GrayImage), IoError> {
    let rgba = image::open(path)?.to_rgba8();
    Ok(split_alpha(&rgba))
}

pub fn split_alpha(rgba: &RgbaImage) -> (RgbImage, GrayImage) {
    let (w, h) = rgba.dimensions();
    let rgb = RgbImage::from_fn(w, h, |x, y| {
        let p = rgba.get_pixel(x, y);
        image::Rgb([p[0], p[1], p[2]])
    });
    let alpha = GrayImage::from_fn(w, h, |x, y| image::Luma([rgba.get_pixel(x, y)[3]]));
    (rgb, alpha)
}

/// Load a mask as RGB (alpha ignored), bilinear-resized to `size` if needed.
pub fn load_mask_rgb(path: &Path, size: (u32, u32)) -> Result<RgbImage, IoError> {
    let mask = image::open(path)?.to_rgb8();
    if mask.dimensions() == size {
        return Ok(mask);
    }
    log_info!(
        "Resizing mask {} from {}x{} to {}x{}",
        path.display(),
        mask.width(),
        mask.height(),
        size.0,
        size.1
    );
    Ok(imageops::resize(&mask, size.0, size.1, Interpolation::Bilinear.to_filter()))
}

/// Find the `<stem>_<token><ext>` sibling of `albedo`. Falls back to a
/// case-insensitive match on the stem (same extension, any case).
pub fn related_mask_path(albedo: &Path, token: &str) -> Option<PathBuf> {
    let stem = albedo.file_stem()?.to_string_lossy();
    let ext = albedo.extension().map(|e| e.to_string_lossy().into_owned()).unwrap_or_default();
    let parent = albedo.parent().unwrap_or(Path::new("."));

    let wanted = format!("{}_{}", stem, token);
    let exact = if ext.is_empty() { parent.join(&wanted) } else { parent.join(format!("{}.{}", wanted, ext)) };
    if exact.is_file() {
        return Some(exact);
    }

    let wanted_low = wanted.to_lowercase();
    let ext_low = ext.to_lowercase();
    let mut matches: Vec<PathBuf> = std::fs::read_dir(parent)
        .ok()?
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .filter(|p| {
            let e = p.extension().map(|e| e.to_string_lossy().to_lowercase()).unwrap_or_default();
            let s = p.file_stem().map(|s| s.to_string_lossy().to_lowercase()).unwrap_or_default();
            e == ext_low && s == wanted_low
        })
        .collect();
    matches.sort();
    matches.into_iter().next()
}

/// Merge RGB and alpha into RGBA. A differently sized alpha is
/// bilinear-resized to the RGB size first.
pub fn reattach_alpha(rgb: &RgbImage, alpha: &GrayImage) -> RgbaImage {
    let (w, h) = rgb.dimensions();
    let resized;
    let alpha = if alpha.dimensions() == (w, h) {
        alpha
    } else {
        resized = imageops::resize(alpha, w, h, Interpolation::Bilinear.to_filter());
        &resized
    };
    RgbaImage::from_fn(w, h, |x, y| {
        let p = rgb.get_pixel(x, y);
        image::Rgba([p[0], p[1], p[2], alpha.get_pixel(x, y)[0]])
    })
}

// ============================================================================
// IMAGE SAVING
// ============================================================================

/// Output encodings chosen from the file extension.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SaveFormat {
    Png,
    Jpeg,
    Bmp,
    Tga,
    Tiff,
}

impl SaveFormat {
    /// Format for `path`'s extension; PNG when unknown or missing.
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();
        match ext.as_str() {
            "jpg" | "jpeg" => SaveFormat::Jpeg,
            "bmp"          => SaveFormat::Bmp,
            "tga"          => SaveFormat::Tga,
            "tif" | "tiff" => SaveFormat::Tiff,
            _              => SaveFormat::Png,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            SaveFormat::Png  => "png",
            SaveFormat::Jpeg => "jpg",
            SaveFormat::Bmp  => "bmp",
            SaveFormat::Tga  => "tga",
            SaveFormat::Tiff => "tiff",
        }
    }
}

/// Encode `image` to `path`, picking the format from the extension.
/// JPEG drops alpha; every other format keeps it.
pub fn save_rgba(image: &RgbaImage, path: &Path) -> Result<(), IoError> {
    if let Some(dir) = path.parent()
        && !dir.as_os_str().is_empty()
    {
        std::fs::create_dir_all(dir)?;
    }
    let format = SaveFormat::from_path(path);
    if format == SaveFormat::Tiff {
        DynamicImage::ImageRgba8(image.clone()).save_with_format(path, image::ImageFormat::Tiff)?;
        return Ok(());
    }

    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    let (w, h) = image.dimensions();

    match format {
        SaveFormat::Jpeg => {
            let rgb = DynamicImage::ImageRgba8(image.clone()).to_rgb8();
            JpegEncoder::new_with_quality(&mut writer, JPEG_QUALITY)
                .write_image(rgb.as_raw(), w, h, image::ColorType::Rgb8)?;
        }
        SaveFormat::Bmp => {
            BmpEncoder::new(&mut writer).write_image(image.as_raw(), w, h, image::ColorType::Rgba8)?;
        }
        SaveFormat::Tga => {
            TgaEncoder::new(&mut writer).write_image(image.as_raw(), w, h, image::ColorType::Rgba8)?;
        }
        SaveFormat::Png | SaveFormat::Tiff => {
            PngEncoder::new(&mut writer).write_image(image.as_raw(), w, h, image::ColorType::Rgba8)?;
        }
    }
    writer.flush()?;
    Ok(())
}

// ============================================================================
// LIVERY SETTINGS (livery.json)
// ============================================================================

/// Saved state of one asset.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetSettings {
    /// Display name, used to re-match the asset when its key changed.
    pub name: String,
    /// Albedo file name, the last-resort match.
    pub albedo: String,
    pub channels: Adjustments,
    pub text_props: TextStyle,
}

/// Whole-livery settings file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveryConfig {
    pub project_root: String,
    pub aircraft_root: String,
    pub tailnumber: String,
    /// Wings and cowlings reuse the fuselage's color adjustments.
    pub propagate_fuselage: bool,
    pub fonts_dir: String,
    pub assets: BTreeMap<String, AssetSettings>,
}

impl Default for LiveryConfig {
    fn default() -> Self {
        Self {
            project_root: String::new(),
            aircraft_root: String::new(),
            tailnumber: String::new(),
            propagate_fuselage: true,
            fonts_dir: String::new(),
            assets: BTreeMap::new(),
        }
    }
}

impl LiveryConfig {
    /// Settings saved for `asset`: by key, then display name, then albedo
    /// file name.
    pub fn settings_for(&self, asset: &Asset) -> Option<&AssetSettings> {
        if let Some(s) = self.assets.get(&asset.key) {
            return Some(s);
        }
        if let Some(s) = self.assets.values().find(|s| s.name == asset.name) {
            return Some(s);
        }
        let file = asset.albedo_file_name();
        self.assets.values().find(|s| !s.albedo.is_empty() && s.albedo == file)
    }

    /// Store `settings` under `asset`'s key, filling in name and file name.
    pub fn set_settings(&mut self, asset: &Asset, mut settings: AssetSettings) {
        settings.name = asset.name.clone();
        settings.albedo = asset.albedo_file_name();
        self.assets.insert(asset.key.clone(), settings);
    }
}

pub fn load_config(path: &Path) -> Result<LiveryConfig, IoError> {
    let file = File::open(path)?;
    let config = serde_json::from_reader(BufReader::new(file))?;
    log_info!("Loaded settings from {}", path.display());
    Ok(config)
}

pub fn save_config(config: &LiveryConfig, path: &Path) -> Result<(), IoError> {
    if let Some(dir) = path.parent()
        && !dir.as_os_str().is_empty()
    {
        std::fs::create_dir_all(dir)?;
    }
    let file = File::create(path)?;
    serde_json::to_writer_pretty(BufWriter::new(file), config)?;
    log_info!("Saved settings to {}", path.display());
    Ok(())
}

// ============================================================================
// LIVERY PROJECT — asset discovery, per-asset rendering, livery export
// ============================================================================
//
// An aircraft project keeps its textures under `Resources/Interior` and
// `Resources/Exterior`. Every albedo PNG there is one asset; its `_PK1` /
// `_PK2` siblings are the paint masks that drive the six grading channels.
// A livery is written to `<aircraft>/liveries/<tail>/objects/`, with the
// settings file one level up.
// ============================================================================

use image::RgbaImage;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::io::{self, AssetSettings, IoError, LiveryConfig};
use crate::ops::fonts::{FontError, FontProvider};
use crate::ops::grading::{self, Adjustments, GradeError, WeightSet};
use crate::ops::text::{self, TextStyle};

/// File-name token of the first paint mask (`<stem>_PK1.png`).
pub const MASK1_TOKEN: &str = "PK1";
/// File-name token of the second paint mask.
pub const MASK2_TOKEN: &str = "PK2";

/// Texture folders scanned under the project root, with their name labels.
const ASSET_DIRS: &[(&str, &str)] = &[("Interior", "Interior"), ("Exterior", "Exterior")];

// ============================================================================
// ASSETS
// ============================================================================

/// One editable texture and its optional paint masks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Asset {
    /// Stable identifier, the albedo path as text.
    pub key: String,
    /// Display name, e.g. "Exterior: fuselage".
    pub name: String,
    pub albedo: PathBuf,
    pub mask1: Option<PathBuf>,
    pub mask2: Option<PathBuf>,
}

impl Asset {
    /// Build an asset for `albedo`, picking up its mask siblings.
    /// An empty `label` names the asset by its stem alone.
    pub fn from_albedo(albedo: &Path, label: &str) -> Self {
        let stem = albedo.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
        let name = if label.is_empty() { stem } else { format!("{}: {}", label, stem) };
        Self {
            key: albedo.to_string_lossy().into_owned(),
            name,
            albedo: albedo.to_path_buf(),
            mask1: io::related_mask_path(albedo, MASK1_TOKEN),
            mask2: io::related_mask_path(albedo, MASK2_TOKEN),
        }
    }

    pub fn albedo_file_name(&self) -> String {
        self.albedo.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default()
    }

    pub fn role(&self) -> AssetRole {
        AssetRole::from_name(&self.name)
    }
}

/// What part of the aircraft an asset paints, derived from its name.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AssetRole {
    Fuselage,
    Wings,
    Cowlings,
    Internal,
    Other,
}

impl AssetRole {
    pub fn from_name(name: &str) -> Self {
        let n = name.to_lowercase();
        if n.contains("fuselage") {
            AssetRole::Fuselage
        } else if n.contains("wing") {
            AssetRole::Wings
        } else if n.contains("cowling") {
            AssetRole::Cowlings
        } else if n.contains("internal") || n.contains("interior") {
            AssetRole::Internal
        } else {
            AssetRole::Other
        }
    }

    /// Tail numbers are only painted on the fuselage and wings.
    pub fn allows_text(&self) -> bool {
        matches!(self, AssetRole::Fuselage | AssetRole::Wings)
    }

    /// Roles that take over the fuselage colors when propagation is on.
    pub fn follows_fuselage(&self) -> bool {
        matches!(self, AssetRole::Wings | AssetRole::Cowlings)
    }
}

/// Formats an albedo can be graded from outside a project folder.
const ALBEDO_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "tga", "tif", "tiff"];

/// Masks, normal maps and spinners live next to the albedos but are not
/// assets of their own.
pub fn is_auxiliary_texture(stem: &str) -> bool {
    let low = stem.to_lowercase();
    if low.contains("_nml") || low.contains("spinner") {
        return true;
    }
    match low.rfind("_pk") {
        Some(i) => {
            let digits = &low[i + 3..];
            !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
        }
        None => false,
    }
}

/// An existing image file in a supported format that is not an auxiliary
/// texture.
pub fn is_albedo_file(path: &Path) -> bool {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();
    path.is_file()
        && ALBEDO_EXTENSIONS.contains(&ext.as_str())
        && path.file_stem().is_some_and(|s| !is_auxiliary_texture(&s.to_string_lossy()))
}

fn discover_in_dir(dir: &Path, label: &str) -> Vec<Asset> {
    if !dir.is_dir() {
        return Vec::new();
    }
    let pattern = format!("{}/*.png", glob::Pattern::escape(&dir.to_string_lossy()));
    let paths = match glob::glob(&pattern) {
        Ok(paths) => paths,
        Err(e) => {
            log_warn!("Bad asset pattern {}: {}", pattern, e);
            return Vec::new();
        }
    };

    let mut found: Vec<PathBuf> = paths
        .filter_map(Result::ok)
        .filter(|p| p.is_file())
        .filter(|p| p.file_stem().is_some_and(|s| !is_auxiliary_texture(&s.to_string_lossy())))
        .collect();
    found.sort();
    found.iter().map(|p| Asset::from_albedo(p, label)).collect()
}

/// Find every albedo under `<root>/Resources/{Interior,Exterior}`.
/// Interior assets come before exterior ones, each folder sorted by file
/// name, then fuselage assets are moved to the front.
pub fn scan_project(root: &Path) -> Vec<Asset> {
    let resources = root.join("Resources");
    let mut assets: Vec<Asset> = ASSET_DIRS
        .iter()
        .flat_map(|(dir, label)| discover_in_dir(&resources.join(dir), label))
        .collect();
    // Stable: keeps folder order within each group
    assets.sort_by_key(|a| a.role() != AssetRole::Fuselage);

    if assets.is_empty() {
        log_warn!("No albedo textures found under {}", resources.display());
    } else {
        log_info!("Discovered {} assets under {}", assets.len(), resources.display());
    }
    assets
}

// ============================================================================
// LIVERY FOLDER
// ============================================================================

/// Make a tail number safe for a folder name: letters, digits, `_`, `-` and
/// spaces survive, everything else becomes `_`; surrounding whitespace is
/// trimmed.
pub fn sanitize_tailnumber(tail: &str) -> Result<String, IoError> {
    let safe: String = tail
        .trim()
        .chars()
        .map(|c| if c.is_alphanumeric() || matches!(c, '_' | '-' | ' ') { c } else { '_' })
        .collect();
    let safe = safe.trim().to_string();
    if safe.is_empty() {
        return Err(IoError::InvalidInput(format!("tail number '{}' has no usable characters", tail)));
    }
    Ok(safe)
}

/// `<aircraft>/liveries/<tail>/objects`, created if missing.
pub fn livery_objects_dir(aircraft_root: &Path, tail: &str) -> Result<PathBuf, IoError> {
    if aircraft_root.as_os_str().is_empty() {
        return Err(IoError::InvalidInput("aircraft folder is not set".to_string()));
    }
    let dir = aircraft_root.join("liveries").join(sanitize_tailnumber(tail)?).join("objects");
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

// ============================================================================
// RENDERING
// ============================================================================

#[derive(Debug)]
pub enum RenderError {
    Io(IoError),
    Grade(GradeError),
    Font(FontError),
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::Io(e) => write!(f, "{}", e),
            RenderError::Grade(e) => write!(f, "Grading failed: {}", e),
            RenderError::Font(e) => write!(f, "Font error: {}", e),
        }
    }
}

impl std::error::Error for RenderError {}

impl From<IoError> for RenderError {
    fn from(e: IoError) -> Self {
        RenderError::Io(e)
    }
}

impl From<GradeError> for RenderError {
    fn from(e: GradeError) -> Self {
        RenderError::Grade(e)
    }
}

impl From<FontError> for RenderError {
    fn from(e: FontError) -> Self {
        RenderError::Font(e)
    }
}

/// Render one asset at full resolution.
///
/// Grades with the asset's channel adjustments (or `fuselage_channels` for
/// wings and cowlings when given) and draws the text overlay if the role
/// allows one. Missing settings render the albedo ungraded and without text.
pub fn render_asset(
    asset: &Asset,
    settings: Option<&AssetSettings>,
    fonts: &dyn FontProvider,
    fuselage_channels: Option<&Adjustments>,
) -> Result<RgbaImage, RenderError> {
    let role = asset.role();
    let empty = Adjustments::new();
    let own = settings.map(|s| &s.channels).unwrap_or(&empty);
    let channels = match fuselage_channels {
        Some(fuselage) if role.follows_fuselage() && !fuselage.is_empty() => fuselage,
        _ => own,
    };
    let overlay = settings.map(|s| &s.text_props).filter(|_| role.allows_text());
    render_with(asset, channels, overlay, fonts)
}

/// Load, grade, overlay and restore alpha, regardless of role.
///
/// The font is only resolved when `overlay` has something to draw.
pub fn render_with(
    asset: &Asset,
    channels: &Adjustments,
    overlay: Option<&TextStyle>,
    fonts: &dyn FontProvider,
) -> Result<RgbaImage, RenderError> {
    let (rgb, alpha) = io::load_albedo(&asset.albedo)?;
    let size = rgb.dimensions();

    let mask1 = asset.mask1.as_deref().map(|p| io::load_mask_rgb(p, size)).transpose()?;
    let mask2 = asset.mask2.as_deref().map(|p| io::load_mask_rgb(p, size)).transpose()?;
    let weights = WeightSet::from_masks(size.0, size.1, mask1.as_ref(), mask2.as_ref());

    let mut rgb = grading::grade(&rgb, &weights, channels)?;

    if let Some(style) = overlay
        && style.is_visible()
    {
        let font = fonts.glyph_source(&style.font_family, &style.font_style)?;
        rgb = text::compose(&rgb, style, font.as_ref()).image;
    }

    log_info!("Rendered {} ({}x{}, {} weight maps)", asset.name, size.0, size.1, weights.len());
    Ok(io::reattach_alpha(&rgb, &alpha))
}

/// Outcome of a whole-livery export.
#[derive(Clone, Debug, Default)]
pub struct RenderReport {
    pub saved: Vec<PathBuf>,
    /// One line per failed asset (or the settings file).
    pub errors: Vec<String>,
    pub config_path: Option<PathBuf>,
}

impl RenderReport {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Render every asset into `out_dir` as PNG (named after its albedo) and
/// write the settings file next to `out_dir`. A failing asset is recorded
/// and the export carries on.
pub fn render_livery(assets: &[Asset], config: &LiveryConfig, fonts: &dyn FontProvider, out_dir: &Path) -> RenderReport {
    let mut report = RenderReport::default();

    if let Err(e) = std::fs::create_dir_all(out_dir) {
        report.errors.push(format!("{}: {}", out_dir.display(), e));
        return report;
    }

    let fuselage_channels = if config.propagate_fuselage {
        assets
            .iter()
            .find(|a| a.role() == AssetRole::Fuselage)
            .and_then(|a| config.settings_for(a))
            .map(|s| &s.channels)
    } else {
        None
    };

    for asset in assets {
        let out_path = out_dir.join(asset.albedo_file_name()).with_extension("png");
        let result = render_asset(asset, config.settings_for(asset), fonts, fuselage_channels)
            .and_then(|img| {
                if out_path.exists() {
                    log_warn!("Overwriting {}", out_path.display());
                }
                io::save_rgba(&img, &out_path).map_err(RenderError::from)
            });
        match result {
            Ok(()) => report.saved.push(out_path),
            Err(e) => {
                log_err!("Failed to render {}: {}", asset.name, e);
                report.errors.push(format!("{}: {}", asset.name, e));
            }
        }
    }

    let config_path = out_dir.parent().unwrap_or(out_dir).join(io::CONFIG_FILE_NAME);
    match io::save_config(config, &config_path) {
        Ok(()) => report.config_path = Some(config_path),
        Err(e) => report.errors.push(format!("Config save: {}", e)),
    }

    log_info!(
        "Livery export to {}: {} saved, {} errors",
        out_dir.display(),
        report.saved.len(),
        report.errors.len()
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::glyphs::GlyphSource;
    use crate::ops::glyphs::BlockFont;
    use crate::ops::grading::{ChannelAdjustment, ChannelKey};
    use image::{Rgb, RgbImage, Rgba};

    struct NoFonts;

    impl FontProvider for NoFonts {
        fn glyph_source(&self, family: &str, style: &str) -> Result<Box<dyn GlyphSource>, FontError> {
            Err(FontError::NoFontAvailable { family: family.to_string(), style: style.to_string() })
        }
    }

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("liveryfe-project-{}-{}", name, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write_png(path: &Path, w: u32, h: u32, color: [u8; 4]) {
        RgbaImage::from_pixel(w, h, Rgba(color)).save(path).unwrap();
    }

    fn write_mask(path: &Path, w: u32, h: u32, color: [u8; 3]) {
        RgbImage::from_pixel(w, h, Rgb(color)).save(path).unwrap();
    }

    #[test]
    fn roles_follow_names() {
        assert_eq!(AssetRole::from_name("Exterior: Fuselage_01"), AssetRole::Fuselage);
        assert_eq!(AssetRole::from_name("Exterior: wings"), AssetRole::Wings);
        assert_eq!(AssetRole::from_name("Exterior: Cowlings"), AssetRole::Cowlings);
        assert_eq!(AssetRole::from_name("Interior: panel"), AssetRole::Internal);
        assert_eq!(AssetRole::from_name("Exterior: gear"), AssetRole::Other);
        assert!(AssetRole::Wings.allows_text());
        assert!(!AssetRole::Cowlings.allows_text());
        assert!(AssetRole::Cowlings.follows_fuselage());
        assert!(!AssetRole::Fuselage.follows_fuselage());
    }

    #[test]
    fn auxiliary_textures_are_recognized() {
        assert!(is_auxiliary_texture("fuselage_PK1"));
        assert!(is_auxiliary_texture("fuselage_pk12"));
        assert!(is_auxiliary_texture("fuselage_nml"));
        assert!(is_auxiliary_texture("Spinner_Blue"));
        assert!(!is_auxiliary_texture("fuselage"));
        assert!(!is_auxiliary_texture("fuselage_pk"));
        assert!(!is_auxiliary_texture("fuselage_pk1b"));
    }

    #[test]
    fn scan_finds_albedos_and_their_masks() {
        let root = scratch_dir("scan");
        let ext = root.join("Resources").join("Exterior");
        let int = root.join("Resources").join("Interior");
        std::fs::create_dir_all(&ext).unwrap();
        std::fs::create_dir_all(&int).unwrap();
        for name in ["cowlings.png", "fuselage.png", "fuselage_PK1.png", "fuselage_PK2.png", "fuselage_nml.png", "spinner.png"] {
            write_png(&ext.join(name), 2, 2, [0, 0, 0, 255]);
        }
        write_png(&int.join("panel.png"), 2, 2, [0, 0, 0, 255]);

        let assets = scan_project(&root);
        let names: Vec<&str> = assets.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["Exterior: fuselage", "Interior: panel", "Exterior: cowlings"]);

        let fuselage = &assets[0];
        assert_eq!(fuselage.key, ext.join("fuselage.png").to_string_lossy());
        assert_eq!(fuselage.mask1.as_deref().and_then(|p| p.file_name()).unwrap(), "fuselage_PK1.png");
        assert_eq!(fuselage.mask2.as_deref().and_then(|p| p.file_name()).unwrap(), "fuselage_PK2.png");
        assert_eq!(assets[2].mask1, None);

        std::fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn albedo_files_are_supported_images_only() {
        let dir = scratch_dir("albedo");
        for name in ["tail.png", "tail.TGA", "tail_PK1.png", "tail_nml.jpg", "notes.txt"] {
            std::fs::write(dir.join(name), b"x").unwrap();
        }
        assert!(is_albedo_file(&dir.join("tail.png")));
        assert!(is_albedo_file(&dir.join("tail.TGA")));
        assert!(!is_albedo_file(&dir.join("tail_PK1.png")));
        assert!(!is_albedo_file(&dir.join("tail_nml.jpg")));
        assert!(!is_albedo_file(&dir.join("notes.txt")));
        assert!(!is_albedo_file(&dir.join("missing.png")));
        assert!(!is_albedo_file(&dir));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn scan_handles_glob_metacharacters_in_the_root() {
        let root = scratch_dir("[livery]*");
        let ext = root.join("Resources").join("Exterior");
        std::fs::create_dir_all(&ext).unwrap();
        write_png(&ext.join("wings.png"), 2, 2, [0, 0, 0, 255]);

        let assets = scan_project(&root);
        assert_eq!(assets.len(), 1);
        assert_eq!(assets[0].role(), AssetRole::Wings);
        std::fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn scan_of_empty_project_is_empty() {
        let root = scratch_dir("empty");
        assert!(scan_project(&root).is_empty());
        std::fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn tail_numbers_are_sanitized() {
        assert_eq!(sanitize_tailnumber("  N123AB ").unwrap(), "N123AB");
        assert_eq!(sanitize_tailnumber("D-EABC/1").unwrap(), "D-EABC_1");
        assert_eq!(sanitize_tailnumber("G ABCD").unwrap(), "G ABCD");
        assert_eq!(sanitize_tailnumber("??").unwrap(), "__");
        assert!(matches!(sanitize_tailnumber("   "), Err(IoError::InvalidInput(_))));
    }

    #[test]
    fn objects_dir_is_created_under_liveries() {
        let root = scratch_dir("objects");
        let dir = livery_objects_dir(&root, "N1/2").unwrap();
        assert_eq!(dir, root.join("liveries").join("N1_2").join("objects"));
        assert!(dir.is_dir());
        assert!(livery_objects_dir(Path::new(""), "N1").is_err());
        std::fs::remove_dir_all(&root).ok();
    }

    fn hue_shift(deg: f32) -> Adjustments {
        let mut adj = Adjustments::new();
        adj.insert("M1_R".parse::<ChannelKey>().unwrap(), ChannelAdjustment::new(deg, 0.0, 0.0, false));
        adj
    }

    fn red_asset(dir: &Path, stem: &str) -> Asset {
        let albedo = dir.join(format!("{}.png", stem));
        write_png(&albedo, 20, 10, [255, 0, 0, 128]);
        write_mask(&dir.join(format!("{}_PK1.png", stem)), 20, 10, [255, 0, 0]);
        Asset::from_albedo(&albedo, "Exterior")
    }

    #[test]
    fn render_grades_and_keeps_alpha() {
        let dir = scratch_dir("render");
        let asset = red_asset(&dir, "fuselage");
        let settings = AssetSettings { channels: hue_shift(180.0), ..Default::default() };

        let out = render_asset(&asset, Some(&settings), &NoFonts, None).unwrap();
        assert_eq!(out.dimensions(), (20, 10));
        assert_eq!(*out.get_pixel(5, 5), Rgba([0, 255, 255, 128]));

        let plain = render_asset(&asset, None, &NoFonts, None).unwrap();
        assert_eq!(*plain.get_pixel(5, 5), Rgba([255, 0, 0, 128]));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn wings_take_fuselage_colors_when_propagating() {
        let dir = scratch_dir("propagate");
        let wings = red_asset(&dir, "wings");
        let own = AssetSettings { channels: hue_shift(0.0), ..Default::default() };
        let fuselage = hue_shift(180.0);

        let out = render_asset(&wings, Some(&own), &NoFonts, Some(&fuselage)).unwrap();
        assert_eq!(*out.get_pixel(0, 0), Rgba([0, 255, 255, 128]));

        // Empty fuselage adjustments do not override
        let out = render_asset(&wings, Some(&own), &NoFonts, Some(&Adjustments::new())).unwrap();
        assert_eq!(*out.get_pixel(0, 0), Rgba([255, 0, 0, 128]));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn text_only_on_roles_that_allow_it() {
        let dir = scratch_dir("text");
        let style = TextStyle {
            enabled: true,
            text: "AB".to_string(),
            font_size_px: 8.0,
            fill_color: [0, 0, 255],
            ..Default::default()
        };
        let settings = AssetSettings { text_props: style, ..Default::default() };

        let fuselage = red_asset(&dir, "fuselage");
        let out = render_asset(&fuselage, Some(&settings), &BlockFont, None).unwrap();
        // Layer is 10x8 at (5,1); the first block spans x 5..9
        assert_eq!(*out.get_pixel(6, 5), Rgba([0, 0, 255, 128]));

        let cowlings = red_asset(&dir, "cowlings");
        let out = render_asset(&cowlings, Some(&settings), &BlockFont, None).unwrap();
        assert_eq!(*out.get_pixel(6, 5), Rgba([255, 0, 0, 128]));

        // Text that needs a font fails when none can be found
        assert!(matches!(
            render_asset(&fuselage, Some(&settings), &NoFonts, None),
            Err(RenderError::Font(FontError::NoFontAvailable { .. }))
        ));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn livery_export_collects_errors_and_writes_settings() {
        let dir = scratch_dir("livery");
        let tex = dir.join("tex");
        std::fs::create_dir_all(&tex).unwrap();
        let fuselage = red_asset(&tex, "fuselage");
        let wings = red_asset(&tex, "wings");
        let broken = Asset::from_albedo(&tex.join("missing.png"), "Exterior");

        let mut config = LiveryConfig { tailnumber: "N1".to_string(), ..Default::default() };
        config.set_settings(&fuselage, AssetSettings { channels: hue_shift(180.0), ..Default::default() });

        let out_dir = dir.join("liveries").join("N1").join("objects");
        let report = render_livery(&[fuselage, wings, broken], &config, &NoFonts, &out_dir);

        assert_eq!(report.saved.len(), 2);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].starts_with("Exterior: missing"));
        assert!(!report.is_ok());

        // Wings follow the fuselage by default
        let wings_out = image::open(out_dir.join("wings.png")).unwrap().to_rgba8();
        assert_eq!(*wings_out.get_pixel(0, 0), Rgba([0, 255, 255, 128]));

        let config_path = report.config_path.unwrap();
        assert_eq!(config_path, dir.join("liveries").join("N1").join(io::CONFIG_FILE_NAME));
        let saved = io::load_config(&config_path).unwrap();
        assert_eq!(saved, config);

        std::fs::remove_dir_all(&dir).ok();
    }
}

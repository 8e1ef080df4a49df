// ============================================================================
// FONTS — font library indexing, fallback resolution, ab_glyph handle
// ============================================================================

use ab_glyph::{Font, FontArc, FontVec, GlyphId, ScaleFont, point};
use image::{GrayImage, Luma};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use super::PixelRect;
use super::glyphs::{BlockFont, GlyphSource};

/// Style used when the requested one is missing from a family.
pub const DEFAULT_STYLE: &str = "Regular";

/// File-name suffixes that identify a style, checked in order.
/// Multi-word tokens come first so "Bold Italic" is not read as "Italic".
const STYLE_TOKENS: &[(&str, &str)] = &[
    ("bold italic", "Bold Italic"),
    ("italic bold", "Bold Italic"),
    ("black italic", "Bold Italic"),
    ("bold", "Bold"),
    ("italic", "Italic"),
    ("oblique", "Italic"),
    ("regular", "Regular"),
    ("book", "Regular"),
    ("roman", "Regular"),
];

const FONT_EXTENSIONS: &[&str] = &["ttf", "otf", "ttc"];

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug)]
pub enum FontError {
    Io(std::io::Error),
    InvalidFont(String),
    /// Every fallback was exhausted.
    NoFontAvailable { family: String, style: String },
}

impl fmt::Display for FontError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FontError::Io(e) => write!(f, "I/O error: {}", e),
            FontError::InvalidFont(e) => write!(f, "Invalid font: {}", e),
            FontError::NoFontAvailable { family, style } => {
                write!(f, "No font could be loaded for '{}' ({}) or any fallback", family, style)
            }
        }
    }
}

impl std::error::Error for FontError {}

impl From<std::io::Error> for FontError {
    fn from(e: std::io::Error) -> Self {
        FontError::Io(e)
    }
}

// ============================================================================
// FONT HANDLE
// ============================================================================

/// A loaded, scalable font plus the family/style it was resolved to.
#[derive(Clone)]
pub struct FontHandle {
    font: FontArc,
    pub family: String,
    pub style: String,
}

impl fmt::Debug for FontHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FontHandle")
            .field("family", &self.family)
            .field("style", &self.style)
            .finish()
    }
}

impl FontHandle {
    pub fn from_bytes(bytes: Vec<u8>, family: &str, style: &str) -> Result<Self, FontError> {
        let font = FontArc::try_from_vec(bytes).map_err(|e| FontError::InvalidFont(e.to_string()))?;
        Ok(Self { font, family: family.to_string(), style: style.to_string() })
    }

    /// Load face `face.index` of the file (0 for single-face files).
    pub fn from_face(face: &FontFace, family: &str, style: &str) -> Result<Self, FontError> {
        let bytes = std::fs::read(&face.path)?;
        let font = FontVec::try_from_vec_and_index(bytes, face.index)
            .map_err(|e| FontError::InvalidFont(format!("{} #{}: {}", face.path.display(), face.index, e)))?;
        Ok(Self { font: FontArc::new(font), family: family.to_string(), style: style.to_string() })
    }

    /// Pen positions for a single line, no kerning.
    fn layout(&self, text: &str, px: f32) -> Vec<(GlyphId, f32)> {
        let scaled = self.font.as_scaled(px);
        let mut cursor_x = 0.0f32;
        let mut glyphs = Vec::with_capacity(text.len());
        for ch in text.chars() {
            if ch.is_control() {
                continue;
            }
            let id = self.font.glyph_id(ch);
            glyphs.push((id, cursor_x));
            cursor_x += scaled.h_advance(id);
        }
        glyphs
    }
}

impl GlyphSource for FontHandle {
    fn measure(&self, text: &str, px: f32) -> Option<PixelRect> {
        let mut bounds: Option<PixelRect> = None;
        for (id, x) in self.layout(text, px) {
            let glyph = id.with_scale_and_position(px, point(x, 0.0));
            if let Some(outlined) = self.font.outline_glyph(glyph) {
                let b = outlined.px_bounds();
                let r = PixelRect::new(
                    b.min.x.floor() as i32,
                    b.min.y.floor() as i32,
                    b.max.x.ceil() as i32,
                    b.max.y.ceil() as i32,
                );
                bounds = Some(match bounds {
                    Some(acc) => acc.union(&r),
                    None => r,
                });
            }
        }
        bounds.filter(|b| !b.is_empty())
    }

    fn draw(&self, text: &str, px: f32, origin: (i32, i32), mask: &mut GrayImage) {
        let (mw, mh) = (mask.width() as i32, mask.height() as i32);
        for (id, x) in self.layout(text, px) {
            let glyph = id.with_scale_and_position(px, point(x, 0.0));
            let Some(outlined) = self.font.outline_glyph(glyph) else { continue };
            let b = outlined.px_bounds();
            let bx = b.min.x.floor() as i32 + origin.0;
            let by = b.min.y.floor() as i32 + origin.1;
            outlined.draw(|gx, gy, cov| {
                let ix = bx + gx as i32;
                let iy = by + gy as i32;
                if ix < 0 || iy < 0 || ix >= mw || iy >= mh {
                    return;
                }
                let v = (cov * 255.0).round().clamp(0.0, 255.0) as u8;
                let p = mask.get_pixel_mut(ix as u32, iy as u32);
                if v > p[0] {
                    *p = Luma([v]);
                }
            });
        }
    }
}

// ============================================================================
// FONT LIBRARY
// ============================================================================

/// One face inside a font file. Collections (`.ttc`) hold several.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FontFace {
    pub path: PathBuf,
    pub index: u32,
}

impl FontFace {
    pub fn new(path: PathBuf, index: u32) -> Self {
        Self { path, index }
    }
}

/// Family → style → font face index.
#[derive(Clone, Debug, Default)]
pub struct FontLibrary {
    families: BTreeMap<String, BTreeMap<String, FontFace>>,
    /// Family tried when the requested one is unknown. Falls back to the
    /// alphabetically first family when unset or missing.
    pub default_family: Option<String>,
}

/// Split a font file stem like `Liberation_Sans-Bold_Italic` into
/// (`Liberation Sans`, `Bold Italic`).
pub fn family_and_style_from_stem(stem: &str) -> (String, String) {
    let name = stem.replace(['_', '-'], " ");
    let low = name.to_lowercase();
    for (token, style) in STYLE_TOKENS {
        let suffix = format!(" {}", token);
        if low.ends_with(&suffix) {
            let family = name[..name.len() - suffix.len()].trim().to_string();
            return (family, style.to_string());
        }
    }
    (name.trim().to_string(), DEFAULT_STYLE.to_string())
}

/// Style name for a face's weight and slant, in the same vocabulary as
/// [`family_and_style_from_stem`].
pub fn style_from_properties(props: &font_kit::properties::Properties) -> String {
    use font_kit::properties::{Style, Weight};

    let bold = props.weight.0 >= Weight::SEMIBOLD.0;
    let italic = props.style != Style::Normal;
    match (bold, italic) {
        (true, true) => "Bold Italic",
        (true, false) => "Bold",
        (false, true) => "Italic",
        (false, false) => DEFAULT_STYLE,
    }
    .to_string()
}

/// Family and style of every face in a font collection, named from the
/// faces' own tables. `None` when the file is not a readable collection.
fn collection_faces(path: &Path) -> Option<Vec<(String, String, u32)>> {
    use font_kit::file_type::FileType;
    use font_kit::font::Font as SystemFont;

    let FileType::Collection(count) = SystemFont::analyze_path(path).ok()? else { return None };
    let mut faces = Vec::with_capacity(count as usize);
    for index in 0..count {
        match SystemFont::from_path(path, index) {
            Ok(font) => faces.push((font.family_name(), style_from_properties(&font.properties()), index)),
            Err(e) => log_warn!("Skipping face {} of {}: {:?}", index, path.display(), e),
        }
    }
    Some(faces)
}

impl FontLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the first face of a font file under an explicit family/style.
    pub fn insert(&mut self, family: &str, style: &str, path: PathBuf) {
        self.insert_face(family, style, FontFace::new(path, 0));
    }

    pub fn insert_face(&mut self, family: &str, style: &str, face: FontFace) {
        self.families
            .entry(family.to_string())
            .or_default()
            .insert(style.to_string(), face);
    }

    /// Recursively index `.ttf`/`.otf`/`.ttc` files under `dir`. Single
    /// fonts are named from the file name. Each face of a collection is
    /// named from its own family and weight, falling back to the file name
    /// for its first face when the collection cannot be read.
    pub fn scan_dir(dir: &Path) -> Result<Self, FontError> {
        if !dir.is_dir() {
            return Err(FontError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("font directory '{}' does not exist", dir.display()),
            )));
        }
        let mut lib = Self::new();
        let pattern = format!("{}/**/*", glob::Pattern::escape(&dir.to_string_lossy()));
        let entries = glob::glob(&pattern).map_err(|e| FontError::InvalidFont(e.to_string()))?;
        for path in entries.flatten() {
            let ext = path
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or("")
                .to_lowercase();
            if !path.is_file() || !FONT_EXTENSIONS.contains(&ext.as_str()) {
                continue;
            }
            if ext == "ttc"
                && let Some(faces) = collection_faces(&path)
            {
                for (family, style, index) in faces {
                    if lib.families.get(&family).is_some_and(|m| m.contains_key(&style)) {
                        continue;
                    }
                    lib.insert_face(&family, &style, FontFace::new(path.clone(), index));
                }
                continue;
            }
            let Some(stem) = path.file_stem().map(|s| s.to_string_lossy().into_owned()) else { continue };
            let (family, style) = family_and_style_from_stem(&stem);
            lib.insert(&family, &style, path);
        }
        log_info!("Indexed {} font families under {}", lib.families.len(), dir.display());
        Ok(lib)
    }

    pub fn is_empty(&self) -> bool {
        self.families.is_empty()
    }

    pub fn families(&self) -> impl Iterator<Item = &str> {
        self.families.keys().map(|s| s.as_str())
    }

    pub fn styles(&self, family: &str) -> Vec<&str> {
        self.families
            .get(family)
            .map(|m| m.keys().map(|s| s.as_str()).collect())
            .unwrap_or_default()
    }

    /// Ordered candidate files for (family, style): requested style, then
    /// Regular, then any other style of the family, then the same walk over
    /// the default family.
    pub fn candidates(&self, family: &str, style: &str) -> Vec<(String, String, FontFace)> {
        let mut out: Vec<(String, String, FontFace)> = Vec::new();
        let push_family = |fam: &str, out: &mut Vec<(String, String, FontFace)>| {
            let Some(styles) = self.families.get(fam) else { return };
            let mut order: Vec<&str> = vec![style, DEFAULT_STYLE];
            order.extend(styles.keys().map(|s| s.as_str()));
            for st in order {
                if let Some(p) = styles.get(st)
                    && !out.iter().any(|(_, _, q)| q == p)
                {
                    out.push((fam.to_string(), st.to_string(), p.clone()));
                }
            }
        };

        push_family(family, &mut out);
        if let Some(default) = self.default_family_name()
            && default != family
        {
            push_family(default, &mut out);
        }
        out
    }

    fn default_family_name(&self) -> Option<&str> {
        if let Some(d) = &self.default_family
            && self.families.contains_key(d)
        {
            return Some(d.as_str());
        }
        self.families.keys().next().map(|s| s.as_str())
    }

    /// Resolve a usable font, walking the fallback chain and finishing with
    /// the operating system's fonts. Only fails when nothing can be loaded.
    pub fn resolve(&self, family: &str, style: &str) -> Result<FontHandle, FontError> {
        for (fam, st, face) in self.candidates(family, style) {
            match FontHandle::from_face(&face, &fam, &st) {
                Ok(handle) => {
                    if fam != family || st != style {
                        log_warn!("Font '{}' ({}) unavailable, using '{}' ({})", family, style, fam, st);
                    }
                    return Ok(handle);
                }
                Err(e) => log_warn!("Skipping font {}: {}", face.path.display(), e),
            }
        }

        if let Some(handle) = load_system_font(Some(family), style) {
            return Ok(handle);
        }
        if let Some(handle) = load_system_font(None, style) {
            log_warn!("Font '{}' ({}) unavailable, using system default '{}'", family, style, handle.family);
            return Ok(handle);
        }

        log_err!("No font available for '{}' ({})", family, style);
        Err(FontError::NoFontAvailable { family: family.to_string(), style: style.to_string() })
    }
}

/// Anything that can hand out a glyph source for a family/style pair.
/// The asset pipeline takes this instead of a concrete library so it can be
/// driven without real font files.
pub trait FontProvider {
    fn glyph_source(&self, family: &str, style: &str) -> Result<Box<dyn GlyphSource>, FontError>;
}

impl FontProvider for FontLibrary {
    fn glyph_source(&self, family: &str, style: &str) -> Result<Box<dyn GlyphSource>, FontError> {
        Ok(Box::new(self.resolve(family, style)?))
    }
}

/// Every family and style renders as blocks.
impl FontProvider for BlockFont {
    fn glyph_source(&self, _family: &str, _style: &str) -> Result<Box<dyn GlyphSource>, FontError> {
        Ok(Box::new(BlockFont))
    }
}

/// Installed font family names, sorted and deduplicated.
pub fn system_families() -> Vec<String> {
    match font_kit::source::SystemSource::new().all_families() {
        Ok(mut families) => {
            families.sort();
            families.dedup();
            families
        }
        Err(e) => {
            log_warn!("Could not enumerate system fonts: {}", e);
            Vec::new()
        }
    }
}

/// Load a font from the operating system. `None` family selects the generic
/// sans-serif default.
pub fn load_system_font(family: Option<&str>, style: &str) -> Option<FontHandle> {
    use font_kit::family_name::FamilyName;
    use font_kit::properties::{Properties, Style, Weight};
    use font_kit::source::SystemSource;

    let names = match family {
        Some(f) if !f.trim().is_empty() => vec![FamilyName::Title(f.to_string())],
        Some(_) => return None,
        None => vec![FamilyName::SansSerif],
    };

    let low = style.to_lowercase();
    let mut props = Properties::new();
    if low.contains("bold") {
        props.weight = Weight::BOLD;
    }
    if low.contains("italic") || low.contains("oblique") {
        props.style = Style::Italic;
    }

    let source = SystemSource::new();
    let handle = source.select_best_match(&names, &props).ok()?;
    let font = handle.load().ok()?;
    let family_name = font.family_name();
    let data = font.copy_font_data()?;
    let bytes: Vec<u8> = (*data).clone();
    FontHandle::from_bytes(bytes, &family_name, style).ok()
}

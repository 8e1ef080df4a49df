// ============================================================================
// LiveryFE CLI — headless texture grading and livery export
// ============================================================================
//
// Usage examples:
//   liveryfe -i fuselage.png --adjust M1_R=30,0,0 -o out.png
//   liveryfe -i fuselage.png --text N123AB --font-family Stencil --child --output-dir out/
//   liveryfe -i "Resources/Exterior/*.png" --settings livery.json --output-dir out/
//   liveryfe --project . --aircraft ../MyPlane --tailnumber N123AB --settings livery.json
//   liveryfe --list-fonts --fonts-dir fonts/
//
// Single-file mode grades every input with its auto-discovered `_PK1` /
// `_PK2` masks (or `--mask1` / `--mask2`). Settings from `--settings` are
// applied first, then command-line overrides. Livery mode renders every
// asset of a project into `<aircraft>/liveries/<tail>/objects/`.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;

use crate::io::{self, AssetSettings, LiveryConfig, SaveFormat};
use crate::ops::color::parse_hex;
use crate::ops::fonts::{FontLibrary, system_families};
use crate::ops::grading::{ChannelAdjustment, ChannelKey};
use crate::ops::text::TextStyle;
use crate::project::{self, Asset};

/// Stem suffix of outputs written next to their input.
const LIVERY_SUFFIX: &str = "_livery";

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// LiveryFE headless livery renderer.
#[derive(Parser, Debug, Clone, Default)]
#[command(
    name = "liveryfe",
    version,
    about = "Recolor aircraft textures through paint masks and stamp tail numbers",
    long_about = "Grade albedo textures with per-channel HSV adjustments driven by their\n\
                  _PK1/_PK2 paint masks, overlay outlined text, and export whole liveries.\n\n\
                  Example:\n  \
                  liveryfe -i fuselage.png --adjust M1_R=30,0,0 --text N123AB -o out.png\n  \
                  liveryfe --project . --aircraft ../MyPlane --tailnumber N123AB"
)]
pub struct CliArgs {
    /// Input albedo(s): files, folders or glob patterns (e.g. "Resources/Exterior/*.png").
    /// Masks, normal maps, spinners and earlier `_livery` outputs are skipped.
    #[arg(short, long, num_args = 1.., value_name = "FILE")]
    pub input: Vec<String>,

    /// First paint mask. Defaults to the input's `<stem>_PK1` sibling.
    #[arg(long, value_name = "FILE")]
    pub mask1: Option<PathBuf>,

    /// Second paint mask. Defaults to the input's `<stem>_PK2` sibling.
    #[arg(long, value_name = "FILE")]
    pub mask2: Option<PathBuf>,

    /// Livery settings file to read adjustments and text from.
    #[arg(long, value_name = "livery.json")]
    pub settings: Option<PathBuf>,

    /// Settings entry to use instead of matching the input file.
    #[arg(long, value_name = "KEY")]
    pub asset: Option<String>,

    /// Channel adjustment, repeatable: M1_R=hue,sat,val[,invert].
    #[arg(long = "adjust", value_name = "KEY=H,S,V[,invert]", value_parser = parse_adjust)]
    pub adjust: Vec<(ChannelKey, ChannelAdjustment)>,

    /// Overlay text. Enables the overlay.
    #[arg(long)]
    pub text: Option<String>,

    #[arg(long, value_name = "FAMILY")]
    pub font_family: Option<String>,

    /// Regular, Bold, Italic or Bold Italic.
    #[arg(long, value_name = "STYLE")]
    pub font_style: Option<String>,

    /// Base font size in pixels.
    #[arg(long, value_name = "PX")]
    pub font_size: Option<f32>,

    /// Size multiplier applied before rasterization.
    #[arg(long)]
    pub scale: Option<f32>,

    /// Parent layer rotation in degrees, counter-clockwise.
    #[arg(long, value_name = "DEG", allow_hyphen_values = true)]
    pub rotation: Option<f32>,

    /// Fill color as #rrggbb.
    #[arg(long, value_name = "#RRGGBB", value_parser = parse_color)]
    pub fill: Option<[u8; 3]>,

    /// Stroke color as #rrggbb.
    #[arg(long, value_name = "#RRGGBB", value_parser = parse_color)]
    pub stroke: Option<[u8; 3]>,

    #[arg(long, value_name = "PX")]
    pub stroke_width: Option<f32>,

    /// Distance between glyph edge and stroke ring.
    #[arg(long, value_name = "PX")]
    pub stroke_gap: Option<f32>,

    /// Stroke displacement in pixels.
    #[arg(long, value_name = "DX,DY", allow_hyphen_values = true, value_parser = parse_offset)]
    pub stroke_offset: Option<(i32, i32)>,

    /// Parent layer center, normalized to the image (0..1).
    #[arg(long, value_name = "X,Y", value_parser = parse_pair)]
    pub pos: Option<(f32, f32)>,

    /// Also draw the child layer (rotated 180° minus the parent rotation).
    #[arg(long)]
    pub child: bool,

    /// Child layer center, normalized to the image (0..1).
    #[arg(long, value_name = "X,Y", value_parser = parse_pair)]
    pub child_pos: Option<(f32, f32)>,

    /// Mirror the parent layer horizontally.
    #[arg(long)]
    pub mirror: bool,

    /// Mirror the child layer horizontally.
    #[arg(long)]
    pub child_mirror: bool,

    /// Folder of .ttf/.otf/.ttc files to resolve font families from.
    #[arg(long, value_name = "DIR")]
    pub fonts_dir: Option<PathBuf>,

    /// Output file path. Only valid for single-file input.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output directory for batch processing.
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Print per-file timing and mirror log lines to stderr.
    #[arg(short, long)]
    pub verbose: bool,

    /// List available font families and exit.
    #[arg(long)]
    pub list_fonts: bool,

    /// Livery mode: project root containing Resources/Interior and Resources/Exterior.
    #[arg(long, value_name = "DIR", requires = "aircraft")]
    pub project: Option<PathBuf>,

    /// Livery mode: aircraft folder receiving liveries/<tail>/objects.
    #[arg(long, value_name = "DIR", requires = "project")]
    pub aircraft: Option<PathBuf>,

    /// Livery mode: tail number naming the livery folder.
    #[arg(long, value_name = "TAIL")]
    pub tailnumber: Option<String>,
}

impl CliArgs {
    fn livery_mode(&self) -> bool {
        self.project.is_some() && self.aircraft.is_some()
    }

    /// Command-line text flags on top of `base`.
    fn overlay_style(&self, mut base: TextStyle) -> TextStyle {
        if let Some(text) = &self.text {
            base.text = text.clone();
            base.enabled = true;
        }
        if let Some(v) = &self.font_family {
            base.font_family = v.clone();
        }
        if let Some(v) = &self.font_style {
            base.font_style = v.clone();
        }
        if let Some(v) = self.font_size {
            base.font_size_px = v;
        }
        if let Some(v) = self.scale {
            base.scale = v;
        }
        if let Some(v) = self.rotation {
            base.rotation_deg = v;
        }
        if let Some(v) = self.fill {
            base.fill_color = v;
        }
        if let Some(v) = self.stroke {
            base.stroke_color = v;
        }
        if let Some(v) = self.stroke_width {
            base.stroke_width = v;
        }
        if let Some(v) = self.stroke_gap {
            base.stroke_gap = v;
        }
        if let Some(v) = self.stroke_offset {
            base.stroke_offset = v;
        }
        if let Some(v) = self.pos {
            base.pos = v;
        }
        if let Some(v) = self.child_pos {
            base.child_pos = v;
        }
        base.child_enabled |= self.child;
        base.parent_mirror_h |= self.mirror;
        base.child_mirror_h |= self.child_mirror;
        base
    }
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run the requested mode and return an OS exit code.
/// `0` = everything succeeded, `1` = one or more files failed.
pub fn run(args: CliArgs) -> ExitCode {
    crate::logger::set_echo(args.verbose);

    let config = match &args.settings {
        Some(path) => match io::load_config(path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("error: could not read settings '{}': {}", path.display(), e);
                return ExitCode::FAILURE;
            }
        },
        None => LiveryConfig::default(),
    };

    let fonts = load_fonts(args.fonts_dir.as_deref(), &config);

    if args.list_fonts {
        list_fonts(&fonts);
        return ExitCode::SUCCESS;
    }

    if args.livery_mode() {
        return run_livery(&args, config, &fonts);
    }

    let inputs = resolve_inputs(&args.input);
    if inputs.is_empty() {
        eprintln!("error: no input files matched the given pattern(s). Use --input, or --project with --aircraft.");
        return ExitCode::FAILURE;
    }

    if inputs.len() > 1 && args.output.is_some() && args.output_dir.is_none() {
        eprintln!(
            "error: {} input files given but --output only accepts a single file path.\n\
             Use --output-dir to specify a destination directory for batch processing.",
            inputs.len()
        );
        return ExitCode::FAILURE;
    }

    if inputs.len() > 1 && (args.mask1.is_some() || args.mask2.is_some()) {
        eprintln!("error: --mask1/--mask2 only apply to a single input file.");
        return ExitCode::FAILURE;
    }

    if let Some(key) = &args.asset
        && !config.assets.contains_key(key)
    {
        eprintln!("error: settings have no asset '{}'.", key);
        return ExitCode::FAILURE;
    }

    if let Some(dir) = &args.output_dir
        && let Err(e) = std::fs::create_dir_all(dir)
    {
        eprintln!("error: could not create output directory '{}': {}", dir.display(), e);
        return ExitCode::FAILURE;
    }

    let format = args.output.as_deref().map(SaveFormat::from_path).unwrap_or(SaveFormat::Png);
    let total = inputs.len();
    let multi = total > 1;
    let mut any_failure = false;

    for (idx, input_path) in inputs.iter().enumerate() {
        if multi || args.verbose {
            println!("[{}/{}] {}", idx + 1, total, input_path.display());
        }

        let file_start = Instant::now();

        let Some(output_path) = build_output_path(input_path, args.output.as_deref(), args.output_dir.as_deref(), format)
        else {
            eprintln!("  error: cannot determine output path for '{}'.", input_path.display());
            any_failure = true;
            continue;
        };

        match run_one(input_path, &output_path, &args, &config, &fonts) {
            Ok(()) => {
                if args.verbose || multi {
                    println!(
                        "  → {} ({:.0}ms)",
                        output_path.display(),
                        file_start.elapsed().as_secs_f64() * 1000.0
                    );
                }
            }
            Err(e) => {
                log_err!("{}: {}", input_path.display(), e);
                eprintln!("  error: {}", e);
                any_failure = true;
            }
        }
    }

    if any_failure { ExitCode::FAILURE } else { ExitCode::SUCCESS }
}

// ============================================================================
// Per-file processing pipeline
// ============================================================================

fn run_one(input: &Path, output: &Path, args: &CliArgs, config: &LiveryConfig, fonts: &FontLibrary) -> Result<(), String> {
    let mut asset = Asset::from_albedo(input, "");
    if let Some(m) = &args.mask1 {
        asset.mask1 = Some(m.clone());
    }
    if let Some(m) = &args.mask2 {
        asset.mask2 = Some(m.clone());
    }

    let saved = match &args.asset {
        Some(key) => config.assets.get(key),
        None => config.settings_for(&asset),
    };
    let settings = resolved_settings(saved, args);

    let image = project::render_with(&asset, &settings.channels, Some(&settings.text_props), fonts)
        .map_err(|e| format!("render failed: {}", e))?;
    io::save_rgba(&image, output).map_err(|e| format!("save failed: {}", e))?;
    Ok(())
}

/// Saved settings (if any) with the command-line adjustments and text flags
/// layered on top.
fn resolved_settings(saved: Option<&AssetSettings>, args: &CliArgs) -> AssetSettings {
    let mut settings = saved.cloned().unwrap_or_default();
    for (key, adj) in &args.adjust {
        settings.channels.insert(*key, *adj);
    }
    settings.text_props = args.overlay_style(settings.text_props);
    settings
}

fn run_livery(args: &CliArgs, mut config: LiveryConfig, fonts: &FontLibrary) -> ExitCode {
    let (Some(root), Some(aircraft)) = (&args.project, &args.aircraft) else {
        return ExitCode::FAILURE;
    };

    let tail = args.tailnumber.clone().unwrap_or_else(|| config.tailnumber.clone());
    let out_dir = match project::livery_objects_dir(aircraft, &tail) {
        Ok(dir) => dir,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let assets = project::scan_project(root);
    if assets.is_empty() {
        eprintln!(
            "error: no PNG albedos found in {}/Resources/Interior or Resources/Exterior.",
            root.display()
        );
        return ExitCode::FAILURE;
    }

    config.project_root = root.to_string_lossy().into_owned();
    config.aircraft_root = aircraft.to_string_lossy().into_owned();
    config.tailnumber = tail;
    if let Some(dir) = &args.fonts_dir {
        config.fonts_dir = dir.to_string_lossy().into_owned();
    }

    let start = Instant::now();
    let report = project::render_livery(&assets, &config, fonts, &out_dir);

    println!("Saved {} file(s) to {}", report.saved.len(), out_dir.display());
    if args.verbose {
        for path in &report.saved {
            println!("  → {}", path.display());
        }
        println!("  ({:.0}ms)", start.elapsed().as_secs_f64() * 1000.0);
    }
    for e in &report.errors {
        eprintln!("  error: {}", e);
    }

    if report.is_ok() { ExitCode::SUCCESS } else { ExitCode::FAILURE }
}

// ============================================================================
// Helpers
// ============================================================================

/// Font library from `--fonts-dir`, else the settings' fonts folder. An
/// unreadable folder leaves the library empty so system fonts still work.
fn load_fonts(fonts_dir: Option<&Path>, config: &LiveryConfig) -> FontLibrary {
    let dir = fonts_dir
        .map(Path::to_path_buf)
        .or_else(|| (!config.fonts_dir.is_empty()).then(|| PathBuf::from(&config.fonts_dir)));
    let Some(dir) = dir else {
        return FontLibrary::new();
    };
    match FontLibrary::scan_dir(&dir) {
        Ok(lib) => lib,
        Err(e) => {
            eprintln!("warning: could not read fonts folder '{}': {}", dir.display(), e);
            FontLibrary::new()
        }
    }
}

fn list_fonts(fonts: &FontLibrary) {
    if !fonts.is_empty() {
        println!("Fonts folder:");
        for family in fonts.families() {
            println!("  {} ({})", family, fonts.styles(family).join(", "));
        }
    }
    println!("System:");
    for family in system_families() {
        println!("  {}", family);
    }
}

/// Albedo textures named by `--input`, in order, first occurrence wins.
/// A folder contributes its top-level images. Auxiliary textures and files
/// this tool wrote next to their source are dropped.
fn resolve_inputs(patterns: &[String]) -> Vec<PathBuf> {
    let mut result: Vec<PathBuf> = Vec::new();

    for pattern in patterns {
        let as_path = Path::new(pattern);
        let matches: Vec<PathBuf> = if as_path.is_dir() {
            expand_glob(&format!("{}/*", glob::Pattern::escape(pattern)))
        } else if as_path.exists() {
            vec![as_path.to_path_buf()]
        } else {
            expand_glob(pattern)
        };

        let mut albedos = 0usize;
        for path in matches {
            if !project::is_albedo_file(&path) || is_livery_output(&path) {
                log_info!("Input {} is not an albedo texture, skipped", path.display());
                continue;
            }
            albedos += 1;
            if !result.contains(&path) {
                result.push(path);
            }
        }
        if albedos == 0 {
            eprintln!("warning: '{}' matched no albedo textures.", pattern);
        }
    }

    result
}

fn expand_glob(pattern: &str) -> Vec<PathBuf> {
    match glob::glob(pattern) {
        Ok(entries) => entries.flatten().collect(),
        Err(e) => {
            log_warn!("Invalid input pattern '{}': {}", pattern, e);
            Vec::new()
        }
    }
}

/// Default single-file output, see [`build_output_path`].
fn is_livery_output(path: &Path) -> bool {
    path.file_stem()
        .is_some_and(|s| s.to_string_lossy().to_lowercase().ends_with(LIVERY_SUFFIX))
}

/// Compute the output path for a single input file.
///
/// Priority:
/// 1. `--output` (explicit path, used for single-file input)
/// 2. `--output-dir` (keeps the input's file stem)
/// 3. Next to the input with a `_livery` suffix, so the source texture is
///    never overwritten
fn build_output_path(input: &Path, output: Option<&Path>, output_dir: Option<&Path>, format: SaveFormat) -> Option<PathBuf> {
    if let Some(out) = output {
        return Some(out.to_path_buf());
    }

    let ext = format.extension();
    let stem = input.file_stem()?.to_string_lossy().into_owned();

    if let Some(dir) = output_dir {
        return Some(dir.join(format!("{}.{}", stem, ext)));
    }

    let parent = input.parent().unwrap_or(Path::new("."));
    Some(parent.join(format!("{}{}.{}", stem, LIVERY_SUFFIX, ext)))
}

/// `M1_R=hue,sat,val[,invert]`.
fn parse_adjust(s: &str) -> Result<(ChannelKey, ChannelAdjustment), String> {
    let (key, values) = s.split_once('=').ok_or_else(|| format!("expected KEY=H,S,V[,invert], got '{}'", s))?;
    let key: ChannelKey = key.parse()?;

    let parts: Vec<&str> = values.split(',').map(str::trim).collect();
    if !(3..=4).contains(&parts.len()) {
        return Err(format!("expected 3 or 4 comma-separated values after '=', got '{}'", values));
    }
    let num = |v: &str| v.parse::<f32>().map_err(|_| format!("'{}' is not a number", v));
    let invert = match parts.get(3).map(|v| v.to_ascii_lowercase()) {
        None => false,
        Some(v) => match v.as_str() {
            "invert" | "true" | "1" => true,
            "false" | "0" => false,
            _ => return Err(format!("'{}' is not a valid invert flag", v)),
        },
    };
    Ok((key, ChannelAdjustment::new(num(parts[0])?, num(parts[1])?, num(parts[2])?, invert)))
}

fn parse_color(s: &str) -> Result<[u8; 3], String> {
    parse_hex(s).ok_or_else(|| format!("invalid color '{}', expected #rrggbb", s))
}

fn split_pair(s: &str) -> Result<(&str, &str), String> {
    s.split_once(',')
        .map(|(a, b)| (a.trim(), b.trim()))
        .ok_or_else(|| format!("expected two comma-separated values, got '{}'", s))
}

fn parse_pair(s: &str) -> Result<(f32, f32), String> {
    let (a, b) = split_pair(s)?;
    let x = a.parse::<f32>().map_err(|_| format!("'{}' is not a number", a))?;
    let y = b.parse::<f32>().map_err(|_| format!("'{}' is not a number", b))?;
    Ok((x, y))
}

fn parse_offset(s: &str) -> Result<(i32, i32), String> {
    let (a, b) = split_pair(s)?;
    let x = a.parse::<i32>().map_err(|_| format!("'{}' is not an integer", a))?;
    let y = b.parse::<i32>().map_err(|_| format!("'{}' is not an integer", b))?;
    Ok((x, y))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::grading::{MaskChannel, MaskSlot};
    use image::{Rgb, RgbImage, Rgba, RgbaImage};

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("liveryfe-cli-{}-{}", name, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn adjust_flags_parse() {
        let (key, adj) = parse_adjust("m2_g=30,-20,10").unwrap();
        assert_eq!(key, ChannelKey::new(MaskSlot::Two, MaskChannel::Green));
        assert_eq!(adj, ChannelAdjustment::new(30.0, -20.0, 10.0, false));

        let (_, adj) = parse_adjust("M1_R=400,0,0,invert").unwrap();
        assert_eq!(adj.hue_deg, 180.0);
        assert!(adj.invert);

        assert!(parse_adjust("M1_R").is_err());
        assert!(parse_adjust("M3_R=1,2,3").is_err());
        assert!(parse_adjust("M1_R=1,2").is_err());
        assert!(parse_adjust("M1_R=1,2,x").is_err());
        assert!(parse_adjust("M1_R=1,2,3,maybe").is_err());
    }

    #[test]
    fn pairs_and_colors_parse() {
        assert_eq!(parse_pair("0.25, 0.75").unwrap(), (0.25, 0.75));
        assert_eq!(parse_offset("-3,4").unwrap(), (-3, 4));
        assert!(parse_pair("0.5").is_err());
        assert!(parse_offset("1.5,2").is_err());
        assert_eq!(parse_color("#ff8000").unwrap(), [255, 128, 0]);
        assert!(parse_color("orange").is_err());
    }

    #[test]
    fn clap_accepts_the_full_flag_set() {
        let args = CliArgs::try_parse_from([
            "liveryfe", "-i", "a.png", "--adjust", "M1_R=10,0,0", "--adjust", "M2_B=0,0,-5",
            "--text", "N123AB", "--rotation", "-30", "--stroke-offset", "-2,3", "--pos", "0.3,0.6",
            "--fill", "#102030", "--child", "--child-mirror",
        ])
        .unwrap();
        assert_eq!(args.input, vec!["a.png".to_string()]);
        assert_eq!(args.adjust.len(), 2);
        assert_eq!(args.rotation, Some(-30.0));
        assert_eq!(args.stroke_offset, Some((-2, 3)));
        assert_eq!(args.fill, Some([0x10, 0x20, 0x30]));
        assert!(!args.livery_mode());

        assert!(CliArgs::try_parse_from(["liveryfe", "--project", "p"]).is_err());
        let livery = CliArgs::try_parse_from(["liveryfe", "--project", "p", "--aircraft", "a", "--tailnumber", "N1"]).unwrap();
        assert!(livery.livery_mode());
    }

    #[test]
    fn overrides_layer_on_saved_settings() {
        let mut saved = AssetSettings::default();
        saved.channels.insert("M1_R".parse().unwrap(), ChannelAdjustment::new(5.0, 0.0, 0.0, false));
        saved.channels.insert("M1_G".parse().unwrap(), ChannelAdjustment::new(7.0, 0.0, 0.0, false));
        saved.text_props.text = "OLD".to_string();
        saved.text_props.font_size_px = 40.0;

        let args = CliArgs {
            adjust: vec![("M1_R".parse().unwrap(), ChannelAdjustment::new(-5.0, 0.0, 0.0, false))],
            text: Some("N1".to_string()),
            child: true,
            ..Default::default()
        };
        let s = resolved_settings(Some(&saved), &args);
        assert_eq!(s.channels[&"M1_R".parse().unwrap()].hue_deg, -5.0);
        assert_eq!(s.channels[&"M1_G".parse().unwrap()].hue_deg, 7.0);
        assert!(s.text_props.enabled);
        assert!(s.text_props.child_enabled);
        assert_eq!(s.text_props.text, "N1");
        assert_eq!(s.text_props.font_size_px, 40.0);

        let untouched = resolved_settings(None, &CliArgs::default());
        assert!(!untouched.text_props.enabled);
        assert!(untouched.channels.is_empty());
    }

    #[test]
    fn output_paths() {
        let input = Path::new("tex/fuselage.png");
        assert_eq!(
            build_output_path(input, Some(Path::new("x.jpg")), None, SaveFormat::Jpeg),
            Some(PathBuf::from("x.jpg"))
        );
        assert_eq!(
            build_output_path(input, None, Some(Path::new("out")), SaveFormat::Png),
            Some(Path::new("out").join("fuselage.png"))
        );
        assert_eq!(
            build_output_path(input, None, None, SaveFormat::Png),
            Some(Path::new("tex").join("fuselage_livery.png"))
        );
    }

    #[test]
    fn inputs_expand_globs_without_duplicates() {
        let dir = scratch_dir("globs");
        for name in ["a.png", "b.png", "c.txt"] {
            std::fs::write(dir.join(name), b"x").unwrap();
        }
        let literal = dir.join("a.png").to_string_lossy().into_owned();
        let pattern = dir.join("*.png").to_string_lossy().into_owned();
        let missing = dir.join("*.tga").to_string_lossy().into_owned();

        let found = resolve_inputs(&[literal, pattern, missing]);
        assert_eq!(found, vec![dir.join("a.png"), dir.join("b.png")]);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn inputs_keep_only_albedos() {
        let dir = scratch_dir("albedos");
        for name in [
            "fuselage.png",
            "fuselage_PK1.png",
            "fuselage_PK2.png",
            "fuselage_nml.png",
            "fuselage_livery.png",
            "spinner.png",
            "wings.tga",
            "readme.txt",
        ] {
            std::fs::write(dir.join(name), b"x").unwrap();
        }

        let pattern = dir.join("*").to_string_lossy().into_owned();
        assert_eq!(resolve_inputs(&[pattern]), vec![dir.join("fuselage.png"), dir.join("wings.tga")]);

        // A folder expands the same way; a named mask is still skipped
        let folder = dir.to_string_lossy().into_owned();
        let mask = dir.join("fuselage_PK1.png").to_string_lossy().into_owned();
        assert_eq!(resolve_inputs(&[mask, folder]), vec![dir.join("fuselage.png"), dir.join("wings.tga")]);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn single_file_run_grades_through_masks() {
        let dir = scratch_dir("run");
        let albedo = dir.join("fuselage.png");
        RgbaImage::from_pixel(8, 4, Rgba([255, 0, 0, 200])).save(&albedo).unwrap();
        RgbImage::from_pixel(8, 4, Rgb([255, 0, 0])).save(dir.join("fuselage_PK1.png")).unwrap();

        let out = dir.join("out.png");
        let args = CliArgs {
            input: vec![albedo.to_string_lossy().into_owned()],
            adjust: vec![parse_adjust("M1_R=180,0,0").unwrap()],
            output: Some(out.clone()),
            ..Default::default()
        };
        run_one(&albedo, &out, &args, &LiveryConfig::default(), &FontLibrary::new()).unwrap();

        let result = image::open(&out).unwrap().to_rgba8();
        assert_eq!(*result.get_pixel(3, 2), Rgba([0, 255, 255, 200]));

        let err = run_one(&dir.join("nope.png"), &out, &args, &LiveryConfig::default(), &FontLibrary::new());
        assert!(err.unwrap_err().starts_with("render failed"));

        std::fs::remove_dir_all(&dir).ok();
    }
}

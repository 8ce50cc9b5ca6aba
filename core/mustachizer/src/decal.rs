//! Mustache catalog: assets, calibration constants and size presets.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use image::RgbaImage;
use nalgebra::Point3;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::MustacheError;

/// Width of the canonical face model, in model units.
pub const FACE_WIDTH: f64 = 500.0;

/// Default maximum size multiplier for decals that do not specify one.
pub const DEFAULT_MAX_SIZE: f64 = 2.0;

/// Hand-tuned calibration for one mustache asset.
///
/// Source art has inconsistent crop margins and centers, so each asset gets
/// its own width ratio and anchor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecalSpec {
    /// Unique identifier, matched case-insensitively.
    pub name: String,
    /// Image file name, relative to the asset directory.
    pub file: String,
    /// Mustache width as a fraction of the canonical face width.
    pub width: f64,
    /// Offset from the face model origin (the nose tip).
    pub anchor: [f64; 3],
    /// Largest size multiplier, used by the `massive` preset.
    #[serde(default = "default_max_size")]
    pub max_size: f64,
}

fn default_max_size() -> f64 {
    DEFAULT_MAX_SIZE
}

struct BuiltinDecal {
    name: &'static str,
    file: &'static str,
    width: f64,
    anchor: [f64; 3],
    max_size: f64,
}

#[rustfmt::skip]
const BUILTIN_DECALS: [BuiltinDecal; 14] = [
    BuiltinDecal { name: "BAMBINO", file: "Bambino.png", width: 0.6, anchor: [0.0, -70.0, -50.0], max_size: 2.0 },
    BuiltinDecal { name: "CAPTAIN_HOOK", file: "Captain_Hook.png", width: 0.8, anchor: [10.0, -90.0, -50.0], max_size: 1.5 },
    BuiltinDecal { name: "DOCTOR_WATSON", file: "Doctor_Watson.png", width: 0.6, anchor: [0.0, -80.0, -50.0], max_size: 2.0 },
    BuiltinDecal { name: "EDWARDIAN", file: "Edwardian.png", width: 0.7, anchor: [10.0, -50.0, -50.0], max_size: 1.8 },
    BuiltinDecal { name: "FANCY_CURL", file: "Fancy_Curl.png", width: 0.6, anchor: [0.0, -70.0, -50.0], max_size: 2.0 },
    BuiltinDecal { name: "HANDLEBAR", file: "Handlebar.png", width: 0.7, anchor: [0.0, -80.0, -50.0], max_size: 1.8 },
    BuiltinDecal { name: "HERCULE_POIROT", file: "Hercule_Poirot.png", width: 0.7, anchor: [0.0, -85.0, -50.0], max_size: 1.8 },
    BuiltinDecal { name: "HULK_HOGAN", file: "Hulk_Hogan.png", width: 0.6, anchor: [0.0, -140.0, -50.0], max_size: 1.5 },
    BuiltinDecal { name: "KAISER_WILHELM", file: "Kaiser_Wilhelm.png", width: 0.7, anchor: [0.0, -65.0, -50.0], max_size: 1.8 },
    BuiltinDecal { name: "REVERSE_HANDLEBAR", file: "Reverse_Handlebar.png", width: 0.65, anchor: [0.0, -95.0, -50.0], max_size: 1.8 },
    BuiltinDecal { name: "ROLLIE_FINGERS", file: "Rollie_Fingers.png", width: 0.6, anchor: [0.0, -70.0, -50.0], max_size: 2.5 },
    BuiltinDecal { name: "SALVADOR_DALI", file: "Salvador_Dali.png", width: 0.8, anchor: [0.0, -50.0, -50.0], max_size: 1.5 },
    BuiltinDecal { name: "TRYPHON_TOURNESOL", file: "Tryphon_Tournesol.png", width: 0.8, anchor: [0.0, -85.0, -50.0], max_size: 1.5 },
    BuiltinDecal { name: "WRESTLER", file: "Wrestler.png", width: 0.6, anchor: [0.0, -100.0, -50.0], max_size: 2.0 },
];

/// Calibration table of the bundled mustache collection.
pub fn builtin_specs() -> Vec<DecalSpec> {
    BUILTIN_DECALS
        .iter()
        .map(|builtin| DecalSpec {
            name: builtin.name.to_string(),
            file: builtin.file.to_string(),
            width: builtin.width,
            anchor: builtin.anchor,
            max_size: builtin.max_size,
        })
        .collect()
}

/// A loaded mustache: its RGBA sprite plus calibration.
///
/// Immutable once built. The size multiplier is chosen per placement through
/// [`Decal::resolve`], never stored here.
#[derive(Debug, Clone)]
pub struct Decal {
    name: String,
    image: RgbaImage,
    width_ratio: f64,
    anchor: Point3<f64>,
    max_size: f64,
}

impl Decal {
    /// Validate and build a decal. The name is upper-cased.
    pub fn new(
        name: &str,
        image: RgbaImage,
        width_ratio: f64,
        anchor: Point3<f64>,
        max_size: f64,
    ) -> Result<Self, MustacheError> {
        if image.width() == 0 || image.height() == 0 {
            return Err(MustacheError::DecalAsset {
                name: name.to_string(),
                reason: "image dimensions are zero".to_string(),
            });
        }
        if !(width_ratio > 0.0) {
            return Err(MustacheError::DecalAsset {
                name: name.to_string(),
                reason: format!("width ratio must be positive, got {width_ratio}"),
            });
        }
        if !(max_size >= 1.0) {
            return Err(MustacheError::DecalAsset {
                name: name.to_string(),
                reason: format!("max size must be at least 1.0, got {max_size}"),
            });
        }

        Ok(Self {
            name: name.to_uppercase(),
            image,
            width_ratio,
            anchor,
            max_size,
        })
    }

    /// Build from a calibration record and its loaded image.
    pub fn from_spec(spec: &DecalSpec, image: RgbaImage) -> Result<Self, MustacheError> {
        let [x, y, z] = spec.anchor;
        Self::new(&spec.name, image, spec.width, Point3::new(x, y, z), spec.max_size)
    }

    /// Upper-case identifier.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Source sprite.
    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    /// Width as a fraction of the canonical face width.
    pub fn width_ratio(&self) -> f64 {
        self.width_ratio
    }

    /// Placement origin in face model space.
    pub fn anchor(&self) -> &Point3<f64> {
        &self.anchor
    }

    /// Largest size multiplier.
    pub fn max_size(&self) -> f64 {
        self.max_size
    }

    /// Source width over source height.
    pub fn aspect_ratio(&self) -> f64 {
        f64::from(self.image.width()) / f64::from(self.image.height())
    }

    /// Pair the decal with the multiplier of `preset`.
    pub fn resolve(&self, preset: SizePreset) -> ResolvedDecal<'_> {
        self.with_size(preset.multiplier(self.max_size))
    }

    /// Pair the decal with an explicit size multiplier.
    pub fn with_size(&self, size: f64) -> ResolvedDecal<'_> {
        ResolvedDecal { decal: self, size }
    }
}

/// A decal with the size it should be drawn at.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedDecal<'a> {
    decal: &'a Decal,
    size: f64,
}

impl<'a> ResolvedDecal<'a> {
    /// The underlying decal.
    pub fn decal(&self) -> &'a Decal {
        self.decal
    }

    /// Size multiplier in effect.
    pub fn size(&self) -> f64 {
        self.size
    }

    /// Width in face model units.
    pub fn width(&self) -> f64 {
        FACE_WIDTH * self.decal.width_ratio * self.size
    }

    /// Height in face model units, keeping the source aspect ratio.
    pub fn height(&self) -> f64 {
        self.width() / self.decal.aspect_ratio()
    }
}

/// How large the mustache should be drawn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SizePreset {
    /// Multiplier 1.0.
    #[default]
    Realist,
    /// Halfway between 1.0 and the decal's maximum.
    Big,
    /// The decal's maximum.
    Massive,
}

impl SizePreset {
    /// Parse a preset name. Unrecognized names fall back to `Realist`.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "realist" => SizePreset::Realist,
            "big" => SizePreset::Big,
            "massive" => SizePreset::Massive,
            other => {
                log::warn!("unknown size preset {other:?}, using realist");
                SizePreset::Realist
            }
        }
    }

    /// Lower-case name, as accepted by [`SizePreset::from_name`].
    pub fn name(&self) -> &'static str {
        match self {
            SizePreset::Realist => "realist",
            SizePreset::Big => "big",
            SizePreset::Massive => "massive",
        }
    }

    /// Size multiplier for a decal whose maximum is `max_size`.
    pub fn multiplier(&self, max_size: f64) -> f64 {
        match self {
            SizePreset::Realist => 1.0,
            SizePreset::Big => (1.0 + max_size) / 2.0,
            SizePreset::Massive => max_size,
        }
    }
}

impl fmt::Display for SizePreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which mustache to draw.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DecalSelector {
    /// Any mustache, chosen uniformly.
    #[default]
    Random,
    /// A mustache by name. Unknown names fall back to random.
    Named(String),
}

impl DecalSelector {
    /// `"random"` or an empty string select at random; anything else is a name.
    pub fn from_name(name: &str) -> Self {
        let name = name.trim();
        if name.is_empty() || name.eq_ignore_ascii_case("random") {
            DecalSelector::Random
        } else {
            DecalSelector::Named(name.to_string())
        }
    }
}

/// All available mustaches, loaded once and shared read-only.
#[derive(Debug, Clone)]
pub struct DecalCatalog {
    decals: Vec<Decal>,
    index: HashMap<String, usize>,
}

impl DecalCatalog {
    /// Build a catalog from already loaded decals.
    pub fn from_decals(decals: Vec<Decal>) -> Result<Self, MustacheError> {
        if decals.is_empty() {
            return Err(MustacheError::EmptyCatalog);
        }

        let mut index = HashMap::with_capacity(decals.len());
        for (position, decal) in decals.iter().enumerate() {
            if index.insert(decal.name.clone(), position).is_some() {
                return Err(MustacheError::Config(format!(
                    "duplicate mustache name: {}",
                    decal.name
                )));
            }
        }

        Ok(Self { decals, index })
    }

    /// Load every spec's image from `asset_dir`.
    pub fn load<P: AsRef<Path>>(asset_dir: P, specs: &[DecalSpec]) -> Result<Self, MustacheError> {
        let asset_dir = asset_dir.as_ref();
        let decals = specs
            .iter()
            .map(|spec| {
                let path = asset_dir.join(&spec.file);
                let image = image::open(&path)
                    .map_err(|e| MustacheError::DecalAsset {
                        name: spec.name.clone(),
                        reason: format!("{}: {e}", path.display()),
                    })?
                    .to_rgba8();
                Decal::from_spec(spec, image)
            })
            .collect::<Result<Vec<_>, _>>()?;

        log::info!(
            "Loaded {} mustaches from {}",
            decals.len(),
            asset_dir.display()
        );
        Self::from_decals(decals)
    }

    /// Load the bundled collection from `asset_dir`.
    pub fn load_builtin<P: AsRef<Path>>(asset_dir: P) -> Result<Self, MustacheError> {
        Self::load(asset_dir, &builtin_specs())
    }

    /// Number of decals.
    pub fn len(&self) -> usize {
        self.decals.len()
    }

    /// Always false: an empty catalog cannot be built.
    pub fn is_empty(&self) -> bool {
        self.decals.is_empty()
    }

    /// Decal names, in load order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.decals.iter().map(Decal::name)
    }

    /// Look a decal up by name, ignoring case.
    pub fn get(&self, name: &str) -> Result<&Decal, MustacheError> {
        self.index
            .get(&name.trim().to_uppercase())
            .map(|&position| &self.decals[position])
            .ok_or_else(|| MustacheError::UnknownDecal(name.to_string()))
    }

    /// Uniform pick among all decals.
    pub fn random<R: Rng>(&self, rng: &mut R) -> &Decal {
        &self.decals[rng.random_range(0..self.decals.len())]
    }

    /// Resolve a selector. An unknown name is not fatal: it logs a warning
    /// and picks at random.
    pub fn select<R: Rng>(&self, selector: &DecalSelector, rng: &mut R) -> &Decal {
        match selector {
            DecalSelector::Random => self.random(rng),
            DecalSelector::Named(name) => match self.get(name) {
                Ok(decal) => decal,
                Err(err) => {
                    log::warn!("{err}, a random mustache will be assigned");
                    self.random(rng)
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn sprite(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_pixel(width, height, image::Rgba([20, 20, 20, 255]))
    }

    fn decal(name: &str) -> Decal {
        Decal::new(name, sprite(200, 100), 0.6, Point3::new(0.0, -70.0, -50.0), 2.0).unwrap()
    }

    fn catalog() -> DecalCatalog {
        DecalCatalog::from_decals(vec![decal("BAMBINO"), decal("HANDLEBAR"), decal("WRESTLER")])
            .unwrap()
    }

    #[test]
    fn builtin_table_has_fourteen_unique_entries() {
        let specs = builtin_specs();
        assert_eq!(specs.len(), 14);
        let mut names: Vec<_> = specs.iter().map(|s| s.name.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), 14);
        let bambino = specs.iter().find(|s| s.name == "BAMBINO").unwrap();
        assert_eq!(bambino.width, 0.6);
        assert_eq!(bambino.anchor, [0.0, -70.0, -50.0]);
        assert!(specs.iter().all(|s| s.max_size >= 1.0));
    }

    #[test]
    fn size_derives_from_face_width_and_aspect() {
        let decal = decal("bambino");
        let resolved = decal.resolve(SizePreset::Realist);
        assert_eq!(resolved.width(), 300.0);
        assert_eq!(resolved.height(), 150.0);
    }

    #[test]
    fn presets_map_to_multipliers() {
        let decal = decal("bambino");
        assert_eq!(decal.resolve(SizePreset::Realist).size(), 1.0);
        assert_eq!(decal.resolve(SizePreset::Big).size(), 1.5);
        assert_eq!(decal.resolve(SizePreset::Massive).size(), 2.0);
        assert_eq!(decal.resolve(SizePreset::Massive).width(), 600.0);
    }

    #[test]
    fn resolving_does_not_touch_the_decal() {
        let decal = decal("bambino");
        let massive = decal.resolve(SizePreset::Massive);
        let realist = decal.resolve(SizePreset::Realist);
        assert_eq!(massive.width(), 600.0);
        assert_eq!(realist.width(), 300.0);
    }

    #[test]
    fn unknown_preset_falls_back_to_realist() {
        assert_eq!(SizePreset::from_name("gigantic"), SizePreset::Realist);
        assert_eq!(SizePreset::from_name("BIG"), SizePreset::Big);
        assert_eq!(SizePreset::from_name(" massive "), SizePreset::Massive);
    }

    #[test]
    fn selector_parsing() {
        assert_eq!(DecalSelector::from_name("random"), DecalSelector::Random);
        assert_eq!(DecalSelector::from_name(""), DecalSelector::Random);
        assert_eq!(
            DecalSelector::from_name("handlebar"),
            DecalSelector::Named("handlebar".to_string())
        );
    }

    #[test]
    fn get_is_case_insensitive() {
        let catalog = catalog();
        assert_eq!(catalog.get("handlebar").unwrap().name(), "HANDLEBAR");
        assert!(matches!(
            catalog.get("NONEXISTENT"),
            Err(MustacheError::UnknownDecal(name)) if name == "NONEXISTENT"
        ));
    }

    #[test]
    fn unknown_name_falls_back_to_random() {
        let catalog = catalog();
        let mut rng = StdRng::seed_from_u64(7);
        let selector = DecalSelector::Named("NONEXISTENT".to_string());
        let chosen = catalog.select(&selector, &mut rng);
        assert!(catalog.names().any(|name| name == chosen.name()));
    }

    #[test]
    fn random_covers_the_catalog() {
        let catalog = catalog();
        let mut rng = StdRng::seed_from_u64(42);
        let mut seen: Vec<&str> = (0..200).map(|_| catalog.random(&mut rng).name()).collect();
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), catalog.len());
    }

    #[test]
    fn empty_catalog_is_rejected() {
        assert!(matches!(
            DecalCatalog::from_decals(Vec::new()),
            Err(MustacheError::EmptyCatalog)
        ));
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let result = DecalCatalog::from_decals(vec![decal("BAMBINO"), decal("bambino")]);
        assert!(matches!(result, Err(MustacheError::Config(_))));
    }

    #[test]
    fn invalid_calibration_is_rejected() {
        let origin = Point3::origin();
        assert!(Decal::new("A", sprite(0, 10), 0.6, origin, 2.0).is_err());
        assert!(Decal::new("A", sprite(10, 10), 0.0, origin, 2.0).is_err());
        assert!(Decal::new("A", sprite(10, 10), 0.6, origin, 0.5).is_err());
    }

    #[test]
    fn load_reads_assets_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        sprite(40, 20).save(dir.path().join("Bambino.png")).unwrap();
        let spec = builtin_specs().into_iter().find(|s| s.name == "BAMBINO").unwrap();

        let catalog = DecalCatalog::load(dir.path(), &[spec]).unwrap();
        let decal = catalog.get("BAMBINO").unwrap();
        assert_eq!(decal.aspect_ratio(), 2.0);
        assert_eq!(decal.anchor(), &Point3::new(0.0, -70.0, -50.0));
    }

    #[test]
    fn load_reports_missing_asset() {
        let dir = tempfile::tempdir().unwrap();
        let result = DecalCatalog::load_builtin(dir.path());
        assert!(matches!(result, Err(MustacheError::DecalAsset { .. })));
    }
}

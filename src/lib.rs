use image::{ imageops::{ self, FilterType }, RgbImage };
use log::debug;
use rand::Rng;

use std::path::{ Path, PathBuf };

use compositor::{ GlyphCompositor, InkMode, PlateLayout };
use error::PlateError;
use glyph::{ GlyphRasterizer, PlateFonts };
use plate_string::{ Pin, PlateFormat, PlateString, StringPolicy };
use scene::{ BackgroundPool, SceneComposer, SceneLocation };

pub mod batch;
pub mod compositor;
pub mod error;
pub mod glyph;
pub mod image_process;
pub mod plate_string;
pub mod scene;
pub mod utils;


/// Which plate family a generator produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlateKind {
    /// blue plate with white characters
    Common,
    /// green new-energy plate with black characters
    Green,
    /// blue plate pasted into a natural scene
    Scene,
}

impl PlateKind {

    pub fn format(self) -> PlateFormat {
        match self {
            PlateKind::Green => PlateFormat::NewEnergy,
            _ => PlateFormat::Common,
        }
    }

    pub fn ink_mode(self) -> InkMode {
        match self {
            PlateKind::Green => InkMode::Dark,
            _ => InkMode::Light,
        }
    }

    /// the template is resized to this before merging
    pub fn template_size(self) -> (u32, u32) {
        match self {
            PlateKind::Green => (226 + 23 + 6, 70),
            _ => (226, 70),
        }
    }

    pub fn default_template(self) -> &'static str {
        match self {
            PlateKind::Common => "./images/template1.bmp",
            _ => "./images/template.bmp",
        }
    }
}

pub struct GenConfig {
    pub kind: PlateKind,
    pub font_ch: PathBuf,
    pub font_en: PathBuf,
    /// falls back to `PlateKind::default_template`
    pub template: Option<PathBuf>,
    pub bg_dir: PathBuf,
}

impl GenConfig {
    pub fn new(kind: PlateKind) -> Self {
        Self {
            kind,
            font_ch: PathBuf::from("./font/platech.ttf"),
            font_en: PathBuf::from("./font/platechar.ttf"),
            template: None,
            bg_dir: PathBuf::from("./NoPlates"),
        }
    }

    pub fn template_path(&self) -> &Path {
        match &self.template {
            Some(path) => path,
            None => Path::new(self.kind.default_template()),
        }
    }
}

/// Plate image generator: string -> glyphs -> template -> filters -> scene.
pub struct GenPlate<G = PlateFonts> {
    kind: PlateKind,
    glyphs: G,
    policy: StringPolicy,
    compositor: GlyphCompositor,
    backgrounds: BackgroundPool,
    scene: SceneComposer,
}

impl GenPlate<PlateFonts> {

    /// Load fonts, template and background paths. Any missing asset is fatal.
    pub fn new(config: &GenConfig) -> Result<Self, PlateError> {
        let glyphs = PlateFonts::load(&config.font_ch, &config.font_en)?;
        let template_path = config.template_path();
        let template = image::open(template_path)
            .map_err(|e| PlateError::asset_load(format!("template {}: {}", template_path.display(), e)))?
            .to_rgb8();
        let backgrounds = BackgroundPool::from_dir(&config.bg_dir)?;
        debug!("{} backgrounds under {}", backgrounds.len(), config.bg_dir.display());
        Ok(Self::from_parts(config.kind, glyphs, template, backgrounds))
    }
}

impl<G: GlyphRasterizer> GenPlate<G> {

    pub fn from_parts(kind: PlateKind, glyphs: G, template: RgbImage, backgrounds: BackgroundPool) -> Self {
        let (width, height) = kind.template_size();
        let template = if template.dimensions() == (width, height) {
            template
        } else {
            imageops::resize(&template, width, height, FilterType::Triangle)
        };
        let layout = PlateLayout::for_format(kind.format());
        Self {
            kind,
            glyphs,
            policy: StringPolicy::new(kind.format()),
            compositor: GlyphCompositor::new(layout, template, kind.ink_mode()),
            backgrounds,
            scene: SceneComposer::default(),
        }
    }

    pub fn kind(&self) -> PlateKind {
        self.kind
    }

    pub fn gen_plate_string<R: Rng>(&self, pin: Option<Pin>, rng: &mut R) -> PlateString {
        self.policy.generate(pin, rng)
    }

    /// The plate merged into its template, before any degradation.
    pub fn draw(&self, plate: &PlateString) -> Result<RgbImage, PlateError> {
        self.compositor.compose(&self.glyphs, plate)
    }

    /// A degraded stand-alone plate image.
    pub fn generate<R: Rng>(&self, plate: &PlateString, rng: &mut R) -> Result<RgbImage, PlateError> {
        let com = self.draw(plate)?;
        let com = match self.kind {
            PlateKind::Common => utils::random_environment(&com, &self.backgrounds, rng)?,
            PlateKind::Green => {
                let (com, _) = utils::rotate_in_plane(&com, 5, rng)?;
                utils::color_adjust(&com, rng)
            },
            PlateKind::Scene => utils::color_adjust(&com, rng),
        };
        let level = 1 + utils::r(rng, 2);
        let mut com = utils::blur(&com, level);
        utils::add_noise(&mut com, rng);
        Ok(com)
    }

    /// The plate pasted into a random background plus its location, or
    /// `None` when no background can take it.
    pub fn generate_scene<R: Rng>(&self, plate: &PlateString, rng: &mut R) -> Result<Option<(RgbImage, SceneLocation)>, PlateError> {
        let com = self.draw(plate)?;
        let com = utils::color_adjust(&com, rng);
        let (scene, location) = match self.scene.embed(&com, plate, &self.backgrounds, rng)? {
            Some(res) => res,
            None => return Ok(None),
        };
        let level = 1 + utils::r(rng, 4);
        let mut scene = utils::blur(&scene, level);
        utils::add_noise(&mut scene, rng);
        Ok(Some((scene, location)))
    }
}

use image::RgbImage;
use log::{ debug, warn };
use rand::Rng;

use std::fmt;
use std::path::{ Path, PathBuf };

use crate::compositor::{ overlay_keyed, resize_keyed };
use crate::error::PlateError;
use crate::plate_string::PlateString;
use crate::utils;

// assume the smallest detectable plate is 65*21, aspect ratio within (1.5, 4.0)
pub const PLATE_SIZE_MIN: (u32, u32) = (65, 21);
pub const ASPECT_RANGE: (f32, f32) = (1.5, 4.0);

enum Background {
    File(PathBuf),
    Image(RgbImage),
}

/// Candidate scene backgrounds, read-only once built.
pub struct BackgroundPool {
    backgrounds: Vec<Background>,
}

impl BackgroundPool {

    /// every file below `dir`; an unreadable or empty directory is an error
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self, PlateError> {
        let dir = dir.as_ref();
        let paths = utils::collect_files(dir)
            .map_err(|e| PlateError::asset_load(format!("background dir {}: {}", dir.display(), e)))?;
        if paths.is_empty() {
            return Err(PlateError::asset_load(format!("background dir {} has no files", dir.display())));
        }
        Ok(Self::from_paths(paths))
    }

    pub fn from_paths(paths: Vec<PathBuf>) -> Self {
        Self { backgrounds: paths.into_iter().map(Background::File).collect() }
    }

    pub fn from_images(images: Vec<RgbImage>) -> Self {
        Self { backgrounds: images.into_iter().map(Background::Image).collect() }
    }

    pub fn len(&self) -> usize {
        self.backgrounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backgrounds.is_empty()
    }

    pub fn load(&self, index: usize) -> Result<RgbImage, PlateError> {
        match &self.backgrounds[index] {
            Background::File(path) => {
                debug!("background {}", path.display());
                Ok(image::open(path)?.to_rgb8())
            },
            Background::Image(img) => Ok(img.clone()),
        }
    }

    /// uniformly chosen background, `None` for an empty pool
    pub fn load_random<R: Rng>(&self, rng: &mut R) -> Result<Option<RgbImage>, PlateError> {
        if self.is_empty() {
            return Ok(None);
        }
        let index = rng.gen_range(0..self.len());
        self.load(index).map(Some)
    }
}

/// Where a plate landed inside a scene: its quadrilateral, clockwise from
/// top-left, plus the plate string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneLocation {
    pub corners: [(u32, u32); 4],
    pub plate: PlateString,
}

impl SceneLocation {

    /// (min_x, min_y, max_x, max_y)
    pub fn bounding_box(&self) -> (u32, u32, u32, u32) {
        let xs = self.corners.iter().map(|c| c.0);
        let ys = self.corners.iter().map(|c| c.1);
        (
            xs.clone().min().unwrap_or(0),
            ys.clone().min().unwrap_or(0),
            xs.max().unwrap_or(0),
            ys.max().unwrap_or(0),
        )
    }

    /// `x1,y1,...,x4,y4,"plate"` with a trailing newline
    pub fn to_label_line(&self) -> String {
        format!("{}\n", self)
    }
}

impl fmt::Display for SceneLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (x, y) in self.corners.iter() {
            write!(f, "{},{},", x, y)?;
        }
        write!(f, "\"{}\"", self.plate)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Placement {
    x: u32,
    y: u32,
    width: u32,
    height: u32,
}

/// Places plates into natural backgrounds.
#[derive(Debug, Clone, Copy)]
pub struct SceneComposer {
    pub min_size: (u32, u32),
    pub aspect_range: (f32, f32),
    /// largest plate height relative to the background height
    pub max_height_fraction: f32,
    pub skew_max_angle: f32,
    pub jitter_factor: u32,
}

impl Default for SceneComposer {
    fn default() -> Self {
        Self {
            min_size: PLATE_SIZE_MIN,
            aspect_range: ASPECT_RANGE,
            max_height_fraction: 0.5,
            skew_max_angle: 30.0,
            jitter_factor: 10,
        }
    }
}

impl SceneComposer {

    /// Skew and jitter `plate_image`, then paste it into a random background.
    ///
    /// Returns `Ok(None)` when there is nothing to place the plate into: an
    /// empty pool, an unreadable background, or one too small for a plate of
    /// the minimum size. Callers skip that sample.
    pub fn embed<R: Rng>(
        &self,
        plate_image: &RgbImage,
        plate: &PlateString,
        pool: &BackgroundPool,
        rng: &mut R,
    ) -> Result<Option<(RgbImage, SceneLocation)>, PlateError> {
        let mut scene = match pool.load_random(rng) {
            Ok(Some(scene)) => scene,
            Ok(None) => return Ok(None),
            Err(e) => {
                warn!("skipping unreadable background: {}", e);
                return Ok(None);
            },
        };

        let max = self.skew_max_angle;
        let angle = rng.gen_range(-max..=max);
        let (skewed, quad) = utils::skew(plate_image, angle, max, self.jitter_factor, rng)?;

        let placement = match self.place(scene.dimensions(), rng) {
            Some(placement) => placement,
            None => {
                debug!("no placement for a plate in a {:?} background", scene.dimensions());
                return Ok(None);
            },
        };
        debug!("placing plate at {:?}", placement);

        let resized = resize_keyed(&skewed, placement.width, placement.height);
        overlay_keyed(&resized, &mut scene, placement.x, placement.y);

        let sx = placement.width as f32 / skewed.width() as f32;
        let sy = placement.height as f32 / skewed.height() as f32;
        let (max_x, max_y) = ((scene.width() - 1) as f32, (scene.height() - 1) as f32);
        let corners = quad.map(|(qx, qy)| {
            let x = (placement.x as f32 + qx * sx).round().max(0.0).min(max_x);
            let y = (placement.y as f32 + qy * sy).round().max(0.0).min(max_y);
            (x as u32, y as u32)
        });
        Ok(Some((scene, SceneLocation { corners, plate: plate.clone() })))
    }

    // pick aspect ratio, then a height keeping the footprint at least
    // min_size and inside the background
    fn place<R: Rng>(&self, background: (u32, u32), rng: &mut R) -> Option<Placement> {
        let (bg_w, bg_h) = background;
        let (min_w, min_h) = self.min_size;
        let ratio = rng.gen_range(self.aspect_range.0..=self.aspect_range.1);
        let min_height = (min_h as f32).max(min_w as f32 / ratio);
        let max_height = (bg_h as f32 * self.max_height_fraction).min(bg_w as f32 / ratio);
        if !(max_height >= min_height) {
            return None;
        }
        let height = rng.gen_range(min_height..=max_height);
        let width = (height * ratio).round() as u32;
        let height = height.round() as u32;
        if width < min_w || height < min_h || width > bg_w || height > bg_h {
            return None;
        }
        let x = rng.gen_range(0..=bg_w - width);
        let y = rng.gen_range(0..=bg_h - height);
        Some(Placement { x, y, width, height })
    }
}


#[cfg(test)]
mod test {

    use image::{ Rgb, RgbImage };
    use rand::{ SeedableRng, rngs::StdRng };

    use super::{ BackgroundPool, SceneComposer, SceneLocation, PLATE_SIZE_MIN };
    use crate::error::PlateError;
    use crate::plate_string::PlateString;

    use std::path::PathBuf;

    fn plate_image() -> RgbImage {
        RgbImage::from_pixel(226, 70, Rgb([30, 60, 200]))
    }

    fn pool(width: u32, height: u32) -> BackgroundPool {
        BackgroundPool::from_images(vec![
            RgbImage::from_pixel(width, height, Rgb([90, 120, 60])),
            RgbImage::from_pixel(width, height, Rgb([10, 10, 10])),
        ])
    }

    #[test]
    fn embedded_location_stays_inside_background() -> Result<(), PlateError> {
        let composer = SceneComposer::default();
        let backgrounds = pool(640, 480);
        let plate = PlateString::from("京A12345");
        let mut placed = 0;
        for seed in 0..50 {
            let mut rng = StdRng::seed_from_u64(seed);
            if let Some((scene, location)) = composer.embed(&plate_image(), &plate, &backgrounds, &mut rng)? {
                placed += 1;
                assert_eq!(scene.dimensions(), (640, 480));
                let (x0, y0, x1, y1) = location.bounding_box();
                assert!(x0 <= x1 && y0 <= y1);
                assert!(x1 < 640 && y1 < 480);
                assert_eq!(location.plate, plate);
                // the plate colour shows up inside the bounding box
                let (cx, cy) = ((x0 + x1) / 2, (y0 + y1) / 2);
                assert_ne!(scene.get_pixel(cx, cy).0, [90, 120, 60]);
            }
        }
        assert!(placed > 0);
        Ok(())
    }

    #[test]
    fn pasted_plate_has_no_dark_outline() -> Result<(), PlateError> {
        let composer = SceneComposer::default();
        let bg = Rgb([0, 160, 0]);
        let backgrounds = BackgroundPool::from_images(vec![RgbImage::from_pixel(640, 480, bg)]);
        let magenta = RgbImage::from_pixel(226, 70, Rgb([255, 0, 255]));
        let plate = PlateString::from("京A12345");
        for seed in 0..30 {
            let mut rng = StdRng::seed_from_u64(seed);
            if let Some((scene, _)) = composer.embed(&magenta, &plate, &backgrounds, &mut rng)? {
                for pixel in scene.pixels().filter(|p| **p != bg) {
                    assert!(pixel[0] >= 253 && pixel[1] <= 2 && pixel[2] >= 253, "seed {} pasted {:?}", seed, pixel);
                }
            }
        }
        Ok(())
    }

    #[test]
    fn label_box_matches_pasted_pixels() -> Result<(), PlateError> {
        let composer = SceneComposer::default();
        let bg = Rgb([0, 160, 0]);
        let backgrounds = BackgroundPool::from_images(vec![RgbImage::from_pixel(640, 480, bg)]);
        let magenta = RgbImage::from_pixel(226, 70, Rgb([255, 0, 255]));
        let plate = PlateString::from("京A12345");
        let mut checked = 0;
        for seed in 0..60 {
            let mut rng = StdRng::seed_from_u64(seed);
            let (scene, location) = match composer.embed(&magenta, &plate, &backgrounds, &mut rng)? {
                Some(res) => res,
                None => continue,
            };
            let painted: Vec<(u32, u32)> = scene.enumerate_pixels()
                .filter(|(_, _, p)| **p != bg)
                .map(|(x, y, _)| (x, y))
                .collect();
            assert!(!painted.is_empty());
            let min_x = painted.iter().map(|p| p.0).min().unwrap();
            let max_x = painted.iter().map(|p| p.0).max().unwrap();
            let min_y = painted.iter().map(|p| p.1).min().unwrap();
            let max_y = painted.iter().map(|p| p.1).max().unwrap();
            let (x0, y0, x1, y1) = location.bounding_box();
            for (label, actual) in [(x0, min_x), (y0, min_y), (x1, max_x), (y1, max_y)].iter() {
                assert!((*label as i64 - *actual as i64).abs() <= 6, "seed {}: label {} vs pixels {}", seed, label, actual);
            }
            checked += 1;
        }
        assert!(checked > 0);
        Ok(())
    }

    #[test]
    fn footprint_respects_minimum_and_aspect() {
        let composer = SceneComposer::default();
        let mut rng = StdRng::seed_from_u64(21);
        for _ in 0..500 {
            if let Some(p) = composer.place((800, 600), &mut rng) {
                assert!(p.width >= PLATE_SIZE_MIN.0 && p.height >= PLATE_SIZE_MIN.1);
                let ratio = p.width as f32 / p.height as f32;
                assert!(ratio > 1.4 && ratio < 4.1, "ratio {}", ratio);
                assert!(p.x + p.width <= 800 && p.y + p.height <= 600);
            }
        }
    }

    #[test]
    fn tiny_background_yields_nothing() -> Result<(), PlateError> {
        let composer = SceneComposer::default();
        let backgrounds = pool(60, 30);
        let mut rng = StdRng::seed_from_u64(0);
        for _ in 0..20 {
            assert!(composer.embed(&plate_image(), &PlateString::from("京A12345"), &backgrounds, &mut rng)?.is_none());
        }
        Ok(())
    }

    #[test]
    fn empty_or_broken_pool_yields_nothing() -> Result<(), PlateError> {
        let composer = SceneComposer::default();
        let mut rng = StdRng::seed_from_u64(0);
        let plate = PlateString::from("京A12345");
        let empty = BackgroundPool::from_images(Vec::new());
        assert!(composer.embed(&plate_image(), &plate, &empty, &mut rng)?.is_none());
        let broken = BackgroundPool::from_paths(vec![PathBuf::from("./no/such/background.jpg")]);
        assert!(composer.embed(&plate_image(), &plate, &broken, &mut rng)?.is_none());
        Ok(())
    }

    #[test]
    fn missing_dir_is_an_error() {
        assert!(BackgroundPool::from_dir("./no/such/NoPlates").is_err());
    }

    #[test]
    fn label_line_format() {
        let location = SceneLocation {
            corners: [(10, 20), (110, 22), (108, 60), (9, 58)],
            plate: PlateString::from("沪B8K2J9"),
        };
        assert_eq!(location.to_label_line(), "10,20,110,22,108,60,9,58,\"沪B8K2J9\"\n");
        assert_eq!(location.bounding_box(), (9, 20, 110, 60));
    }
}

use image::imageops::{ self, FilterType };
use log::{ info, warn };
use rand::{ rngs::StdRng, SeedableRng };

use std::fs;
use std::path::PathBuf;

use crate::error::PlateError;
use crate::glyph::GlyphRasterizer;
use crate::image_process;
use crate::plate_string::{ Pin, PlateString };
use crate::{ GenPlate, PlateKind };

pub struct BatchConfig {
    pub out_dir: PathBuf,
    pub count: usize,
    /// final (width, height) of stand-alone plates; scenes keep their size
    pub size: (u32, u32),
    /// seeds every sample's rng from (seed, index) when set
    pub seed: Option<u64>,
    /// tilt stand-alone plates and cut the black wedge off
    pub angle: bool,
    pub pin: Option<Pin>,
}

impl BatchConfig {
    pub fn new(out_dir: impl Into<PathBuf>, count: usize) -> Self {
        Self { out_dir: out_dir.into(), count, size: (120, 32), seed: None, angle: false, pin: None }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub written: usize,
    pub skipped: usize,
}

/// Independent rng for sample `index`, so samples can be made in any order.
pub fn sample_rng(seed: Option<u64>, index: usize) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed ^ (index as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)),
        None => StdRng::from_entropy(),
    }
}

pub fn plate_file_name(index: usize, plate: &PlateString) -> String {
    format!("{:05}_{}.jpg", index, plate)
}

/// Generate `config.count` samples into `config.out_dir`.
pub fn gen_batch<G: GlyphRasterizer>(gen: &GenPlate<G>, config: &BatchConfig) -> Result<BatchReport, PlateError> {
    fs::create_dir_all(&config.out_dir)?;
    info!("generating {} {:?} samples into {}", config.count, gen.kind(), config.out_dir.display());
    let mut report = BatchReport::default();
    for index in 0..config.count {
        let mut rng = sample_rng(config.seed, index);
        let plate = gen.gen_plate_string(config.pin, &mut rng);
        match gen.kind() {
            PlateKind::Scene => {
                let (img, location) = match gen.generate_scene(&plate, &mut rng)? {
                    Some(res) => res,
                    None => {
                        warn!("sample {} ({}) could not be placed, skipped", index, plate);
                        report.skipped += 1;
                        continue;
                    },
                };
                let stem = format!("{:02}", index);
                let img_path = config.out_dir.join(format!("{}.jpg", stem));
                img.save(&img_path)?;
                fs::write(config.out_dir.join(format!("{}.txt", stem)), location.to_label_line())?;
                info!("{} {}", img_path.display(), plate);
            },
            _ => {
                let mut img = gen.generate(&plate, &mut rng)?;
                if config.angle {
                    img = image_process::remove_border(&img, &mut rng)?;
                }
                let (width, height) = config.size;
                let img = imageops::resize(&img, width, height, FilterType::Triangle);
                let path = config.out_dir.join(plate_file_name(index, &plate));
                img.save(&path)?;
                info!("{} {}", path.display(), plate);
            },
        }
        report.written += 1;
    }
    info!("done: {} written, {} skipped", report.written, report.skipped);
    Ok(report)
}

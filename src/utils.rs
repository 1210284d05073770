use image::{ imageops::{ self, FilterType }, GrayImage, ImageBuffer, Luma, Rgb, RgbImage };
use imageproc::{ filter, geometric_transformations::Projection, noise };
use palette::{ FromColor, Hsv, RgbHue, Srgb };
use rand::Rng;

use std::fs;
use std::io;
use std::path::{ Path, PathBuf };

use crate::compositor::is_ink;
use crate::error::PlateError;
use crate::image_process::{ frame_corners, warp_perspective };
use crate::scene::BackgroundPool;

/// uniform integer in [0, val)
pub fn r<R: Rng>(rng: &mut R, val: u32) -> u32 {
    if val == 0 {
        return 0;
    }
    rng.gen_range(0..val)
}

fn channel(img: &RgbImage, c: usize) -> GrayImage {
    ImageBuffer::from_fn(img.width(), img.height(), |x, y| Luma([img.get_pixel(x, y)[c]]))
}

fn map_channels<F>(img: &RgbImage, mut f: F) -> RgbImage
where F: FnMut(GrayImage) -> GrayImage
{
    let channels: Vec<GrayImage> = (0..3).map(|c| f(channel(img, c))).collect();
    RgbImage::from_fn(img.width(), img.height(), |x, y| {
        Rgb([channels[0].get_pixel(x, y)[0], channels[1].get_pixel(x, y)[0], channels[2].get_pixel(x, y)[0]])
    })
}

/// box blur with a (2 * level + 1) square kernel
pub fn blur(img: &RgbImage, level: u32) -> RgbImage {
    if level == 0 {
        return img.clone();
    }
    map_channels(img, |gray| filter::box_filter(&gray, level, level))
}

/// Additive noise, scaled per channel into the headroom above the channel's
/// brightest value. Pixels never get darker and never saturate past 255.
pub fn add_noise<R: Rng>(img: &mut RgbImage, rng: &mut R) {
    let sdev = 8.0 * (1 + r(rng, 6)) as f64;
    for c in 0..3 {
        let max = img.pixels().map(|p| p[c]).max().unwrap_or(255);
        let diff = 255 - max;
        if diff == 0 {
            continue;
        }
        let mut noise = GrayImage::from_pixel(img.width(), img.height(), Luma([128]));
        noise::gaussian_noise_mut(&mut noise, 0.0, sdev, rng.gen());
        let lo = noise.pixels().map(|p| p[0]).min().unwrap_or(0);
        let hi = noise.pixels().map(|p| p[0]).max().unwrap_or(0);
        if hi == lo {
            continue;
        }
        for (pixel, n) in img.pixels_mut().zip(noise.pixels()) {
            let scaled = (n[0] - lo) as f32 / (hi - lo) as f32 * diff as f32;
            pixel[c] += scaled as u8;
        }
    }
}

/// Random HSV factors: hue x[0.8, 1.0], saturation x[0.3, 1.0],
/// value x[0.2, 1.0]. Black stays black.
pub fn color_adjust<R: Rng>(img: &RgbImage, rng: &mut R) -> RgbImage {
    let hue_factor = 0.8 + rng.gen::<f32>() * 0.2;
    let sat_factor = 0.3 + rng.gen::<f32>() * 0.7;
    let value_factor = 0.2 + rng.gen::<f32>() * 0.8;
    let mut out = img.clone();
    for pixel in out.pixels_mut() {
        let rgb = Srgb::new(pixel[0], pixel[1], pixel[2]).into_format::<f32>();
        let mut hsv: Hsv = Hsv::from_color(rgb);
        hsv.hue = RgbHue::from_degrees(hsv.hue.into_positive_degrees() * hue_factor);
        hsv.saturation *= sat_factor;
        hsv.value *= value_factor;
        let rgb: Srgb = Srgb::from_color(hsv);
        let rgb: Srgb<u8> = rgb.into_format();
        pixel.0 = [rgb.red, rgb.green, rgb.blue];
    }
    out
}

/// Homography pulling every corner of a w x h frame inwards by up to
/// `factor` pixels.
pub fn jitter_projection<R: Rng>(width: u32, height: u32, factor: u32, rng: &mut R) -> Result<Projection, PlateError> {
    let (w, h) = (width as f32, height as f32);
    let mut jitter = || r(rng, factor) as f32;
    let to = [
        (jitter(), jitter()),
        (w - jitter(), jitter()),
        (w - jitter(), h - jitter()),
        (jitter(), h - jitter()),
    ];
    Projection::from_control_points(frame_corners(width, height), to)
        .ok_or_else(|| PlateError::degenerate("in-plane jitter collapsed the frame"))
}

/// Jitter the corners and resample at the same size. Returns the
/// projection applied.
pub fn rotate_in_plane<R: Rng>(img: &RgbImage, factor: u32, rng: &mut R) -> Result<(RgbImage, Projection), PlateError> {
    let (width, height) = img.dimensions();
    let projection = jitter_projection(width, height, factor, rng)?;
    Ok((warp_perspective(img, &projection, width, height), projection))
}

/// Shear the plate into a parallelogram leaning by `angle` degrees, then
/// jitter its corners by up to `factor` pixels. Output width grows by
/// `h * cos(max_angle)`.
///
/// Both steps go through a single resample of `img`, so every output pixel
/// is either plate or pure key. Returns the final corners clockwise from
/// top-left.
pub fn skew<R: Rng>(img: &RgbImage, angle: f32, max_angle: f32, factor: u32, rng: &mut R) -> Result<(RgbImage, [(f32, f32); 4]), PlateError> {
    let (width, height) = img.dimensions();
    let h = height as f32;
    let out_w = width + (h * max_angle.to_radians().cos()) as u32;
    let size_w = out_w as f32;
    let interval = (angle.to_radians().sin() * h).trunc().abs();
    let quad = if angle > 0.0 {
        [(interval, 0.0), (size_w, 0.0), (size_w - interval, h), (0.0, h)]
    } else {
        [(0.0, 0.0), (size_w - interval, 0.0), (size_w, h), (interval, h)]
    };
    let jitter = jitter_projection(out_w, height, factor, rng)?;
    let quad = quad.map(|corner| jitter * corner);
    let projection = Projection::from_control_points(frame_corners(width, height), quad)
        .ok_or_else(|| PlateError::degenerate(format!("skew by {} degrees", angle)))?;
    Ok((warp_perspective(img, &projection, out_w, height), quad))
}

/// Fill ink-key pixels from a random background resized to the plate.
pub fn random_environment<R: Rng>(img: &RgbImage, pool: &BackgroundPool, rng: &mut R) -> Result<RgbImage, PlateError> {
    let env = match pool.load_random(rng)? {
        Some(env) => imageops::resize(&env, img.width(), img.height(), FilterType::Triangle),
        None => return Ok(img.clone()),
    };
    let mut out = img.clone();
    for (pixel, env_pixel) in out.pixels_mut().zip(env.pixels()) {
        if is_ink(pixel) {
            *pixel = *env_pixel;
        }
    }
    Ok(out)
}

/// Every file below `dir`, depth first.
pub fn collect_files(dir: impl AsRef<Path>) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut pending = vec![dir.as_ref().to_path_buf()];
    while let Some(dir) = pending.pop() {
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.is_dir() {
                pending.push(path);
            } else {
                files.push(path);
            }
        }
    }
    files.sort();
    Ok(files)
}

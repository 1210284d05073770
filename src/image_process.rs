//! Camera viewpoint simulation: rotate the image plane in 3D, project it back
//! through a pinhole camera and resample.

use image::{ imageops, Rgb, RgbImage };
use imageproc::geometric_transformations::Projection;
use log::debug;
use nalgebra::{ Matrix4, Vector4 };
use rand::{ seq::SliceRandom, Rng };

use crate::error::PlateError;

/// field of view of the virtual camera, in degrees
pub const FOV: f64 = 42.0;
/// largest accepted magnitude for any single angle
pub const MAX_ANGLE: f64 = 80.0;
/// |angle_y| candidates for border removal, applied with a negative sign
pub const BORDER_ANGLES: [f64; 5] = [36.0, 38.0, 40.0, 42.0, 44.0];

// projected points closer to the camera plane than this are rejected
const MIN_DEPTH: f64 = 1e-3;

/// Euler angles of the image plane, in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform3D {
    angle_x: f64,
    angle_y: f64,
    angle_z: f64,
}

impl Transform3D {

    /// Fails fast on non-finite angles or any magnitude above `MAX_ANGLE`.
    pub fn new(angle_x: f64, angle_y: f64, angle_z: f64) -> Result<Self, PlateError> {
        for (axis, angle) in [("x", angle_x), ("y", angle_y), ("z", angle_z)].iter() {
            if !angle.is_finite() || angle.abs() > MAX_ANGLE {
                return Err(PlateError::degenerate(format!(
                    "angle_{} = {} outside [-{}, {}]", axis, angle, MAX_ANGLE, MAX_ANGLE
                )));
            }
        }
        Ok(Self { angle_x, angle_y, angle_z })
    }

    pub fn identity() -> Self {
        Self { angle_x: 0.0, angle_y: 0.0, angle_z: 0.0 }
    }

    /// distance at which a w x h frame exactly fills the field of view
    pub fn camera_distance(width: u32, height: u32) -> f64 {
        let (w, h) = (width as f64, height as f64);
        (h * h + w * w).sqrt() / 2.0 / (FOV / 2.0).to_radians().tan()
    }

    /// R = Rx * Ry * Rz
    pub fn rotation(&self) -> Matrix4<f64> {
        let (sx, cx) = self.angle_x.to_radians().sin_cos();
        let (sy, cy) = self.angle_y.to_radians().sin_cos();
        let (sz, cz) = self.angle_z.to_radians().sin_cos();
        let rx = Matrix4::new(
            1.0, 0.0, 0.0, 0.0,
            0.0, cx, sx, 0.0,
            0.0, -sx, cx, 0.0,
            0.0, 0.0, 0.0, 1.0,
        );
        let ry = Matrix4::new(
            cy, 0.0, -sy, 0.0,
            0.0, 1.0, 0.0, 0.0,
            sy, 0.0, cy, 0.0,
            0.0, 0.0, 0.0, 1.0,
        );
        let rz = Matrix4::new(
            cz, sz, 0.0, 0.0,
            -sz, cz, 0.0, 0.0,
            0.0, 0.0, 1.0, 0.0,
            0.0, 0.0, 0.0, 1.0,
        );
        rx * ry * rz
    }

    /// Corners of a w x h frame, top-left, top-right, bottom-right,
    /// bottom-left, after rotation and projection onto the image plane.
    pub fn project_corners(&self, width: u32, height: u32) -> Result<[(f32, f32); 4], PlateError> {
        let z = Self::camera_distance(width, height);
        let r = self.rotation();
        let (cx, cy) = (width as f64 / 2.0, height as f64 / 2.0);
        let mut dst = [(0.0f32, 0.0f32); 4];
        for (i, (x, y)) in frame_corners(width, height).iter().enumerate() {
            let d = r * Vector4::new(*x as f64 - cx, *y as f64 - cy, 0.0, 0.0);
            let depth = z - d[2];
            if !(depth > MIN_DEPTH) {
                return Err(PlateError::degenerate(format!("corner {} lands behind the camera", i)));
            }
            let px = d[0] * z / depth + cx;
            let py = d[1] * z / depth + cy;
            if !px.is_finite() || !py.is_finite() {
                return Err(PlateError::degenerate(format!("corner {} is not finite", i)));
            }
            dst[i] = (px as f32, py as f32);
        }
        Ok(dst)
    }

    /// homography taking the source frame onto the projected frame
    pub fn projection(&self, width: u32, height: u32) -> Result<Projection, PlateError> {
        let dst = self.project_corners(width, height)?;
        Projection::from_control_points(frame_corners(width, height), dst)
            .ok_or_else(|| PlateError::degenerate("projected corners are collinear"))
    }
}

pub fn frame_corners(width: u32, height: u32) -> [(f32, f32); 4] {
    let (w, h) = (width as f32, height as f32);
    [(0.0, 0.0), (w, 0.0), (w, h), (0.0, h)]
}

/// Resample `img` through `projection` (source -> destination) into a
/// `width` x `height` frame. Destination pixels with no source are black.
pub fn warp_perspective(img: &RgbImage, projection: &Projection, width: u32, height: u32) -> RgbImage {
    let inverse = projection.invert();
    let mut out = RgbImage::new(width, height);
    for (x, y, pixel) in out.enumerate_pixels_mut() {
        let (sx, sy) = inverse * (x as f32, y as f32);
        if let Some(p) = sample_bilinear(img, sx, sy) {
            *pixel = p;
        }
    }
    out
}

fn sample_bilinear(img: &RgbImage, x: f32, y: f32) -> Option<Rgb<u8>> {
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 || !x.is_finite() || !y.is_finite() {
        return None;
    }
    let (max_x, max_y) = ((width - 1) as f32, (height - 1) as f32);
    if x < -0.5 || y < -0.5 || x > max_x + 0.5 || y > max_y + 0.5 {
        return None;
    }
    let x = x.max(0.0).min(max_x);
    let y = y.max(0.0).min(max_y);
    let (x0, y0) = (x.floor() as u32, y.floor() as u32);
    let (x1, y1) = ((x0 + 1).min(width - 1), (y0 + 1).min(height - 1));
    let (fx, fy) = (x - x0 as f32, y - y0 as f32);

    let tl = img.get_pixel(x0, y0);
    let tr = img.get_pixel(x1, y0);
    let bl = img.get_pixel(x0, y1);
    let br = img.get_pixel(x1, y1);
    let mut out = [0u8; 3];
    for c in 0..3 {
        let top = tl[c] as f32 * (1.0 - fx) + tr[c] as f32 * fx;
        let bottom = bl[c] as f32 * (1.0 - fx) + br[c] as f32 * fx;
        out[c] = (top * (1.0 - fy) + bottom * fy).round().max(0.0).min(255.0) as u8;
    }
    Some(Rgb(out))
}

/// View `img` from the camera angle given by `transform`; same output size.
pub fn change_angle(img: &RgbImage, transform: &Transform3D) -> Result<RgbImage, PlateError> {
    let (width, height) = img.dimensions();
    let projection = transform.projection(width, height)?;
    Ok(warp_perspective(img, &projection, width, height))
}

/// First column, scanning the middle row rightwards from the centre, whose
/// luminance is exactly zero. Returns the width when there is none.
pub fn find_border(img: &RgbImage) -> u32 {
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return width;
    }
    let gray = imageops::grayscale(img);
    let row = height / 2;
    (width / 2..width).find(|x| gray.get_pixel(*x, row)[0] == 0).unwrap_or(width)
}

/// Crop `img` to the columns left of `find_border`.
pub fn crop_black_border(img: &RgbImage) -> RgbImage {
    let boundary = find_border(img);
    if boundary == img.width() {
        return img.clone();
    }
    imageops::crop_imm(img, 0, 0, boundary, img.height()).to_image()
}

/// Tilt around the y axis by one of `BORDER_ANGLES` and cut off the black
/// wedge the projection leaves on the right.
pub fn remove_border<R: Rng>(img: &RgbImage, rng: &mut R) -> Result<RgbImage, PlateError> {
    let angle = *BORDER_ANGLES.choose(rng).unwrap_or(&BORDER_ANGLES[0]);
    let tilted = change_angle(img, &Transform3D::new(0.0, -angle, 0.0)?)?;
    let cropped = crop_black_border(&tilted);
    debug!("border removal at {} degrees keeps {} of {} columns", angle, cropped.width(), img.width());
    Ok(cropped)
}

use image::{ imageops::{ self, FilterType }, Rgb, RgbImage };
use rusttype::{ point, Font, Scale };

use std::fs;
use std::path::Path;

use crate::error::PlateError;

/// Renders one plate symbol as black ink on a white cell.
///
/// Everything outside the ink strokes must be non-black, the compositor
/// keys on pure black.
pub trait GlyphRasterizer {
    fn rasterize(&self, symbol: char, width: u32, height: u32) -> RgbImage;
}

// coverage above this counts as solid ink
const INK_COVERAGE: f32 = 0.5;

/// One TrueType face drawn into a fixed cell.
pub struct FontGlyphs {
    font: Font<'static>,
    scale: Scale,
    cell_width: u32,
    top: f32,
}

impl FontGlyphs {

    pub fn from_file(path: impl AsRef<Path>, size: f32, cell_width: u32, top: f32) -> Result<Self, PlateError> {
        let path = path.as_ref();
        let data = fs::read(path)
            .map_err(|e| PlateError::asset_load(format!("font {}: {}", path.display(), e)))?;
        let font = Font::try_from_vec(data)
            .ok_or_else(|| PlateError::asset_load(format!("font {}: not a TrueType font", path.display())))?;
        Ok(Self { font, scale: Scale::uniform(size), cell_width, top })
    }

    /// draw `symbol` into a `cell_width` x `height` cell, then fit it to `width`
    pub fn render(&self, symbol: char, width: u32, height: u32) -> RgbImage {
        let mut cell = RgbImage::from_pixel(self.cell_width, height, Rgb([255, 255, 255]));
        let ascent = self.font.v_metrics(self.scale).ascent;
        let mut text = [0u8; 4];
        let text = symbol.encode_utf8(&mut text);
        for glyph in self.font.layout(text, self.scale, point(0.0, self.top + ascent)) {
            if let Some(bb) = glyph.pixel_bounding_box() {
                glyph.draw(|gx, gy, v| {
                    let x = gx as i32 + bb.min.x;
                    let y = gy as i32 + bb.min.y;
                    if x < 0 || y < 0 || x >= self.cell_width as i32 || y >= height as i32 {
                        return;
                    }
                    let pixel = cell.get_pixel_mut(x as u32, y as u32);
                    let shade = if v >= INK_COVERAGE { 0 } else { (255.0 * (1.0 - v)).round() as u8 };
                    if shade < pixel[0] {
                        *pixel = Rgb([shade, shade, shade]);
                    }
                });
            }
        }
        if width == self.cell_width {
            cell
        } else {
            imageops::resize(&cell, width, height, FilterType::Nearest)
        }
    }
}

/// Chinese face for province abbreviations, Latin face for the rest.
pub struct PlateFonts {
    province: FontGlyphs,
    latin: FontGlyphs,
}

impl PlateFonts {

    pub fn load(font_ch: impl AsRef<Path>, font_en: impl AsRef<Path>) -> Result<Self, PlateError> {
        let province = FontGlyphs::from_file(font_ch, 43.0, 45, 3.0)?;
        let latin = FontGlyphs::from_file(font_en, 60.0, 23, 2.0)?;
        Ok(Self { province, latin })
    }
}

impl GlyphRasterizer for PlateFonts {
    fn rasterize(&self, symbol: char, width: u32, height: u32) -> RgbImage {
        if symbol.is_ascii() {
            self.latin.render(symbol, width, height)
        } else {
            self.province.render(symbol, width, height)
        }
    }
}

/// Draws every symbol as a solid block. Used where no font files exist.
#[cfg(test)]
pub(crate) struct BlockGlyphs;

#[cfg(test)]
impl GlyphRasterizer for BlockGlyphs {
    fn rasterize(&self, _symbol: char, width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            if x >= width / 4 && x < width * 3 / 4 && y >= height / 4 && y < height * 3 / 4 {
                Rgb([0, 0, 0])
            } else {
                Rgb([255, 255, 255])
            }
        })
    }
}

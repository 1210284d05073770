use image::{ imageops::{ self, FilterType }, GrayImage, Luma, Rgb, RgbImage };

use crate::error::PlateError;
use crate::glyph::GlyphRasterizer;
use crate::plate_string::{ PlateFormat, PlateString };

pub const PLATE_HEIGHT: u32 = 70;
pub const SLOT_WIDTH: u32 = 23;

// left margin before the province glyph
const LEFT_MARGIN: u32 = 10;
const PROVINCE_GAP: u32 = 6;
const LETTER_GAP: u32 = 17;
const GLYPH_GAP: u32 = 6;

/// The sentinel colour marking glyph strokes.
pub const INK: Rgb<u8> = Rgb([0, 0, 0]);

pub fn is_ink(pixel: &Rgb<u8>) -> bool {
    *pixel == INK
}

/// Horizontal cell a glyph is blitted into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub x: u32,
    pub width: u32,
}

/// Canvas size plus ordered glyph slots of one plate format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlateLayout {
    width: u32,
    height: u32,
    slots: Vec<Slot>,
}

impl PlateLayout {

    pub fn new(width: u32, height: u32, slots: Vec<Slot>) -> Self {
        Self { width, height, slots }
    }

    /// province, gap 6, letter, gap 17, then 6 between the remaining glyphs
    pub fn standard(glyphs: usize, width: u32) -> Self {
        let mut slots = Vec::with_capacity(glyphs);
        let mut x = LEFT_MARGIN;
        for i in 0..glyphs {
            slots.push(Slot { x, width: SLOT_WIDTH });
            x += SLOT_WIDTH + match i {
                0 => PROVINCE_GAP,
                1 => LETTER_GAP,
                _ => GLYPH_GAP,
            };
        }
        Self::new(width, PLATE_HEIGHT, slots)
    }

    pub fn for_format(format: PlateFormat) -> Self {
        match format {
            PlateFormat::Common => Self::standard(7, 226),
            PlateFormat::NewEnergy => Self::standard(8, 226 + SLOT_WIDTH),
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    pub fn glyph_count(&self) -> usize {
        self.slots.len()
    }
}

/// What an ink pixel turns into on the template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InkMode {
    /// white characters, blue or common plates
    Light,
    /// black characters, green plates
    Dark,
}

impl InkMode {
    pub fn color(self) -> Rgb<u8> {
        match self {
            InkMode::Light => Rgb([255, 255, 255]),
            InkMode::Dark => Rgb([0, 0, 0]),
        }
    }
}

/// Binary stencil: every ink pixel of `foreground` paints `mode`'s colour
/// onto a copy of `template`, everything else keeps the template pixel.
pub fn merge(foreground: &RgbImage, template: &RgbImage, mode: InkMode) -> RgbImage {
    let mut com = template.clone();
    let width = foreground.width().min(template.width());
    let height = foreground.height().min(template.height());
    let color = mode.color();
    for y in 0..height {
        for x in 0..width {
            if is_ink(foreground.get_pixel(x, y)) {
                com.put_pixel(x, y, color);
            }
        }
    }
    com
}

/// Copy every non-ink pixel of `top` onto `base` at (`x`, `y`).
/// Ink pixels are transparent; anything past `base`'s edge is dropped.
pub fn overlay_keyed(top: &RgbImage, base: &mut RgbImage, x: u32, y: u32) {
    let (base_w, base_h) = base.dimensions();
    for (tx, ty, pixel) in top.enumerate_pixels() {
        let (bx, by) = (x + tx, y + ty);
        if bx >= base_w || by >= base_h || is_ink(pixel) {
            continue;
        }
        base.put_pixel(bx, by, *pixel);
    }
}

/// Resize a keyed image without bleeding the key into its edges.
///
/// Key pixels have zero coverage. Colour is filtered premultiplied by
/// coverage and divided back out; pixels under half coverage become key.
pub fn resize_keyed(img: &RgbImage, width: u32, height: u32) -> RgbImage {
    let coverage = GrayImage::from_fn(img.width(), img.height(), |x, y| {
        if is_ink(img.get_pixel(x, y)) { Luma([0]) } else { Luma([255]) }
    });
    let coverage = imageops::resize(&coverage, width, height, FilterType::Triangle);
    let color = imageops::resize(img, width, height, FilterType::Triangle);
    RgbImage::from_fn(width, height, |x, y| {
        let alpha = coverage.get_pixel(x, y)[0];
        if alpha < 128 {
            return INK;
        }
        let p = color.get_pixel(x, y);
        let mut out = [0u8; 3];
        for c in 0..3 {
            out[c] = (p[c] as f32 * 255.0 / alpha as f32).round().min(255.0) as u8;
        }
        Rgb(out)
    })
}

/// Draws plate strings onto a fresh canvas and merges them into a template.
#[derive(Debug, Clone)]
pub struct GlyphCompositor {
    layout: PlateLayout,
    template: RgbImage,
    mode: InkMode,
}

impl GlyphCompositor {

    pub fn new(layout: PlateLayout, template: RgbImage, mode: InkMode) -> Self {
        Self { layout, template, mode }
    }

    /// black on white glyphs laid out in their slots, on a new canvas per call
    pub fn draw<G: GlyphRasterizer + ?Sized>(&self, glyphs: &G, plate: &PlateString) -> Result<RgbImage, PlateError> {
        if plate.len() != self.layout.glyph_count() {
            return Err(PlateError::invalid_layout(self.layout.glyph_count(), plate.len()));
        }
        let (width, height) = self.layout.dimensions();
        let mut canvas = RgbImage::from_pixel(width, height, Rgb([255, 255, 255]));
        for (slot, symbol) in self.layout.slots().iter().zip(plate.symbols()) {
            let mut glyph = glyphs.rasterize(*symbol, slot.width, height);
            if glyph.dimensions() != (slot.width, height) {
                glyph = imageops::resize(&glyph, slot.width, height, FilterType::Nearest);
            }
            imageops::replace(&mut canvas, &glyph, slot.x as i64, 0);
        }
        Ok(canvas)
    }

    pub fn merge(&self, foreground: &RgbImage) -> RgbImage {
        merge(foreground, &self.template, self.mode)
    }

    pub fn compose<G: GlyphRasterizer + ?Sized>(&self, glyphs: &G, plate: &PlateString) -> Result<RgbImage, PlateError> {
        let fg = self.draw(glyphs, plate)?;
        Ok(self.merge(&fg))
    }
}


#[cfg(test)]
mod test {

    use image::{ Rgb, RgbImage };

    use super::{ merge, overlay_keyed, resize_keyed, GlyphCompositor, InkMode, PlateLayout, Slot, INK };
    use crate::error::{ PlateError, PlateErrorKind };
    use crate::glyph::BlockGlyphs;
    use crate::plate_string::{ PlateFormat, PlateString };

    fn template(width: u32) -> RgbImage {
        RgbImage::from_fn(width, 70, |x, y| Rgb([20, (x % 200) as u8 + 30, (y % 50) as u8 + 100]))
    }

    #[test]
    fn common_slots_match_reference_offsets() {
        let layout = PlateLayout::for_format(PlateFormat::Common);
        let xs: Vec<u32> = layout.slots().iter().map(|s| s.x).collect();
        assert_eq!(xs, vec![10, 39, 79, 108, 137, 166, 195]);
        assert!(layout.slots().iter().all(|s| s.width == 23));
        assert_eq!(layout.dimensions(), (226, 70));
    }

    #[test]
    fn slots_fit_and_never_overlap() {
        for format in [PlateFormat::Common, PlateFormat::NewEnergy].iter() {
            let layout = PlateLayout::for_format(*format);
            let (width, _) = layout.dimensions();
            assert_eq!(layout.glyph_count(), format.len());
            for pair in layout.slots().windows(2) {
                assert!(pair[0].x + pair[0].width <= pair[1].x);
            }
            let last = layout.slots().last().unwrap();
            assert!(last.x + last.width <= width);
        }
    }

    #[test]
    fn length_mismatch_is_rejected() {
        let compositor = GlyphCompositor::new(PlateLayout::for_format(PlateFormat::Common), template(226), InkMode::Light);
        let res = compositor.draw(&BlockGlyphs, &PlateString::from("京AD12345"));
        match res {
            Err(e) => match e.kind() {
                PlateErrorKind::InvalidLayout { expected, found } => {
                    assert_eq!((*expected, *found), (7, 8));
                },
                other => panic!("unexpected kind {:?}", other),
            },
            Ok(_) => panic!("8 glyphs should not fit a common layout"),
        }
    }

    #[test]
    fn draw_puts_ink_only_inside_slots() -> Result<(), PlateError> {
        let layout = PlateLayout::for_format(PlateFormat::Common);
        let compositor = GlyphCompositor::new(layout.clone(), template(226), InkMode::Light);
        let canvas = compositor.draw(&BlockGlyphs, &PlateString::from("京A12345"))?;
        assert_eq!(canvas.dimensions(), (226, 70));
        for (x, _, pixel) in canvas.enumerate_pixels() {
            if *pixel == INK {
                assert!(layout.slots().iter().any(|s| x >= s.x && x < s.x + s.width));
            }
        }
        // centre of each slot is inked by the block glyph
        for slot in layout.slots() {
            assert_eq!(*canvas.get_pixel(slot.x + slot.width / 2, 35), INK);
        }
        Ok(())
    }

    #[test]
    fn canvas_is_fresh_per_call() -> Result<(), PlateError> {
        let layout = PlateLayout::new(60, 70, vec![Slot { x: 0, width: 23 }]);
        let compositor = GlyphCompositor::new(layout, template(60), InkMode::Dark);
        let first = compositor.draw(&BlockGlyphs, &PlateString::from("A"))?;
        let second = compositor.draw(&BlockGlyphs, &PlateString::from("B"))?;
        assert_eq!(first, second);
        assert!(first.enumerate_pixels().filter(|(x, _, _)| *x >= 23).all(|(_, _, p)| *p != INK));
        Ok(())
    }

    #[test]
    fn merge_is_a_pure_stencil() {
        let bg = template(226);
        let fg = RgbImage::from_fn(226, 70, |x, y| {
            if (x + y) % 3 == 0 { INK } else { Rgb([(x % 255) as u8, 1, 2]) }
        });
        for mode in [InkMode::Light, InkMode::Dark].iter() {
            let com = merge(&fg, &bg, *mode);
            for (x, y, pixel) in fg.enumerate_pixels() {
                if *pixel == INK {
                    assert_eq!(*com.get_pixel(x, y), mode.color());
                } else {
                    assert_eq!(com.get_pixel(x, y), bg.get_pixel(x, y));
                }
            }
        }
    }

    #[test]
    fn merge_keeps_template_beyond_canvas() {
        let bg = template(255);
        let fg = RgbImage::from_pixel(249, 70, INK);
        let com = merge(&fg, &bg, InkMode::Dark);
        assert_eq!(com.dimensions(), (255, 70));
        assert_eq!(*com.get_pixel(248, 10), INK);
        assert_eq!(com.get_pixel(252, 10), bg.get_pixel(252, 10));
    }

    #[test]
    fn overlay_skips_ink_and_clips() {
        let mut base = RgbImage::from_pixel(10, 10, Rgb([9, 9, 9]));
        let mut top = RgbImage::from_pixel(4, 4, Rgb([200, 0, 0]));
        top.put_pixel(0, 0, INK);
        overlay_keyed(&top, &mut base, 8, 8);
        assert_eq!(base.get_pixel(8, 8).0, [9, 9, 9]);
        assert_eq!(base.get_pixel(9, 9).0, [200, 0, 0]);
        assert_eq!(base.get_pixel(7, 7).0, [9, 9, 9]);
    }

    #[test]
    fn keyed_resize_keeps_edges_clean() {
        // plate on the left, key on the right
        let img = RgbImage::from_fn(40, 20, |x, _| if x < 25 { Rgb([255, 0, 255]) } else { INK });
        for (w, h) in [(17, 9), (93, 41), (40, 20)].iter() {
            let out = resize_keyed(&img, *w, *h);
            assert_eq!(out.dimensions(), (*w, *h));
            for pixel in out.pixels() {
                if *pixel != INK {
                    assert!(pixel[0] >= 253 && pixel[1] <= 2 && pixel[2] >= 253, "{:?}", pixel);
                }
            }
            assert_ne!(*out.get_pixel(0, h / 2), INK);
            assert_eq!(*out.get_pixel(w - 1, h / 2), INK);
        }
    }
}

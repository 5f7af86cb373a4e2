//! Word-cloud layout and rasterisation.
//!
//! Layout follows the classic word-cloud recipe: entries are placed from the
//! heaviest down, font sizes shrink with relative weight, and each entry lands
//! on a random free spot of the canvas (found through a summed-area table of
//! occupied pixels). When nothing fits, the other orientation is tried, then
//! the font shrinks until it drops below the configured minimum. The RNG is
//! seeded from the configuration, so a given term set always yields the same
//! picture.

use std::fs;
use std::path::{Path, PathBuf};

use ab_glyph::{point, Font, FontVec, Glyph, PxScale, ScaleFont};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::codecs::png::PngEncoder;
use image::{ColorType, ImageEncoder};
use log::{debug, info, warn};
use plotters::prelude::*;
use plotters::style::{Palette, Palette99};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::CloudConfig;
use crate::error::RenderError;
use crate::normalize::WeightedTermSet;

/// Turns a weighted term set into PNG bytes.
pub trait Renderer {
    fn render(&self, terms: &WeightedTermSet) -> Result<Vec<u8>, RenderError>;
}

/// Pixel extent of a horizontal line of text at a given font size.
pub trait TextMeasure {
    fn measure(&self, text: &str, font_size: u32) -> (u32, u32);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Horizontal,
    /// Rotated 90° counter-clockwise, reading bottom to top.
    Vertical,
}

impl Orientation {
    fn flipped(self) -> Self {
        match self {
            Orientation::Horizontal => Orientation::Vertical,
            Orientation::Vertical => Orientation::Horizontal,
        }
    }
}

/// Where and how one entry is drawn. `width`/`height` are the on-canvas box.
#[derive(Debug, Clone, PartialEq)]
pub struct Placement {
    pub text: String,
    pub variant_index: usize,
    pub font_size: u32,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub orientation: Orientation,
    pub color: (u8, u8, u8),
}

/// Occupied pixels plus their summed-area table.
struct OccupancyMap {
    width: u32,
    height: u32,
    occupied: Vec<bool>,
    integral: Vec<u32>,
}

impl OccupancyMap {
    fn new(width: u32, height: u32) -> Self {
        let cells = (width as usize + 1) * (height as usize + 1);
        Self {
            width,
            height,
            occupied: vec![false; width as usize * height as usize],
            integral: vec![0; cells],
        }
    }

    fn stride(&self) -> usize {
        self.width as usize + 1
    }

    fn region_sum(&self, x: usize, y: usize, w: usize, h: usize) -> u32 {
        let s = self.stride();
        let a = self.integral[(y + h) * s + x + w];
        let b = self.integral[y * s + x + w];
        let c = self.integral[(y + h) * s + x];
        let d = self.integral[y * s + x];
        (a + d) - (b + c)
    }

    /// Uniformly random top-left corner of a free `w`×`h` box.
    fn sample_free(&self, w: u32, h: u32, rng: &mut StdRng) -> Option<(u32, u32)> {
        if w == 0 || h == 0 || w > self.width || h > self.height {
            return None;
        }
        let (w, h) = (w as usize, h as usize);
        let xs = self.width as usize - w + 1;
        let ys = self.height as usize - h + 1;

        let free = |x: usize, y: usize| self.region_sum(x, y, w, h) == 0;
        let hits = (0..ys)
            .flat_map(|y| (0..xs).map(move |x| (x, y)))
            .filter(|&(x, y)| free(x, y))
            .count();
        if hits == 0 {
            return None;
        }
        let pick = rng.random_range(0..hits);
        (0..ys)
            .flat_map(|y| (0..xs).map(move |x| (x, y)))
            .filter(|&(x, y)| free(x, y))
            .nth(pick)
            .map(|(x, y)| (x as u32, y as u32))
    }

    fn fill(&mut self, x: u32, y: u32, w: u32, h: u32) {
        let x_end = (x + w).min(self.width) as usize;
        let y_end = (y + h).min(self.height) as usize;
        for row in y as usize..y_end {
            let start = row * self.width as usize;
            self.occupied[start + x as usize..start + x_end].fill(true);
        }
        self.rebuild();
    }

    fn rebuild(&mut self) {
        let s = self.stride();
        let width = self.width as usize;
        for row in 0..self.height as usize {
            let mut run = 0u32;
            for col in 0..width {
                run += u32::from(self.occupied[row * width + col]);
                self.integral[(row + 1) * s + col + 1] = self.integral[row * s + col + 1] + run;
            }
        }
    }
}

fn box_size<M: TextMeasure + ?Sized>(
    measure: &M,
    text: &str,
    font_size: u32,
    orientation: Orientation,
) -> (u32, u32) {
    let (w, h) = measure.measure(text, font_size);
    match orientation {
        Orientation::Horizontal => (w, h),
        Orientation::Vertical => (h, w),
    }
}

/// Places the entries of `terms` on the canvas described by `config`.
///
/// Every variant of a term displays the plain source term; duplicates only
/// differ in size and position.
pub fn layout<M: TextMeasure + ?Sized>(
    terms: &WeightedTermSet,
    config: &CloudConfig,
    measure: &M,
) -> Vec<Placement> {
    let mut rng = StdRng::seed_from_u64(config.random_seed);
    let mut entries: Vec<_> = terms.iter().filter(|e| e.weight > 0.0).collect();
    entries.sort_by(|a, b| b.weight.total_cmp(&a.weight));
    entries.truncate(config.max_words);
    let Some(max_weight) = entries.first().map(|e| e.weight) else {
        return Vec::new();
    };

    let mut occupancy = OccupancyMap::new(config.width, config.height);
    let mut placements = Vec::with_capacity(entries.len());
    let mut font_size = config.max_font_size;
    let mut last_freq = 1.0;
    let rs = config.relative_scaling;
    let step = config.font_step.max(1);

    for entry in entries {
        let freq = entry.weight / max_weight;
        if rs != 0.0 {
            font_size = ((rs * (freq / last_freq) + (1.0 - rs)) * f64::from(font_size)).round() as u32;
        }
        let preferred = if rng.random::<f64>() < config.prefer_horizontal {
            Orientation::Horizontal
        } else {
            Orientation::Vertical
        };

        let mut orientation = preferred;
        let mut tried_other = false;
        let spot = loop {
            if font_size < config.min_font_size {
                break None;
            }
            let (w, h) = box_size(measure, &entry.source_term, font_size, orientation);
            let (bw, bh) = (w + config.margin, h + config.margin);
            if let Some(pos) = occupancy.sample_free(bw, bh, &mut rng) {
                break Some((pos, w, h));
            }
            if !tried_other && config.prefer_horizontal < 1.0 {
                orientation = orientation.flipped();
                tried_other = true;
            } else {
                font_size = font_size.saturating_sub(step);
                orientation = preferred;
            }
        };
        let Some(((x, y), w, h)) = spot else {
            debug!("Canvas full after {} entries", placements.len());
            break;
        };

        occupancy.fill(x, y, w + config.margin, h + config.margin);
        let color = Palette99::COLORS[rng.random_range(0..Palette99::COLORS.len())];
        placements.push(Placement {
            text: entry.source_term.clone(),
            variant_index: entry.variant_index,
            font_size,
            x: x + config.margin / 2,
            y: y + config.margin / 2,
            width: w,
            height: h,
            orientation,
            color,
        });
        last_freq = freq;
    }
    placements
}

/// A loaded font face used for measuring and rasterising.
pub struct GlyphFont {
    font: FontVec,
}

impl GlyphFont {
    pub fn load(path: &Path) -> Result<Self, RenderError> {
        let invalid = |e: &dyn std::fmt::Display| {
            RenderError::InvalidFont(format!("{}: {e}", path.display()))
        };
        let bytes = fs::read(path).map_err(|e| invalid(&e))?;
        let font = FontVec::try_from_vec_and_index(bytes, 0).map_err(|e| invalid(&e))?;
        Ok(Self { font })
    }

    /// First candidate that exists and parses.
    pub fn resolve(candidates: &[PathBuf]) -> Result<Self, RenderError> {
        for path in candidates.iter().filter(|p| p.exists()) {
            match Self::load(path) {
                Ok(font) => {
                    info!("Using font {}", path.display());
                    return Ok(font);
                }
                Err(e) => warn!("Skipping font: {e}"),
            }
        }
        let tried: Vec<String> = candidates.iter().map(|p| p.display().to_string()).collect();
        Err(RenderError::FontUnavailable(tried.join(", ")))
    }

    /// Positioned glyphs of a horizontal line with its top-left at the origin.
    fn line(&self, text: &str, font_size: u32) -> (Vec<Glyph>, f32, f32) {
        let scale = PxScale::from(font_size as f32);
        let scaled = self.font.as_scaled(scale);
        let ascent = scaled.ascent();
        let mut caret = 0.0f32;
        let mut prev = None;
        let mut glyphs = Vec::with_capacity(text.len());
        for c in text.chars() {
            let id = scaled.glyph_id(c);
            if let Some(p) = prev {
                caret += scaled.kern(p, id);
            }
            glyphs.push(id.with_scale_and_position(scale, point(caret, ascent)));
            caret += scaled.h_advance(id);
            prev = Some(id);
        }
        (glyphs, caret, scaled.height())
    }

    /// Canvas pixels covered by a placement, with coverage in (0, 1].
    fn rasterize(&self, p: &Placement) -> Vec<(i32, i32, f32)> {
        let (glyphs, _, _) = self.line(&p.text, p.font_size);
        let text_width = match p.orientation {
            Orientation::Horizontal => p.width,
            Orientation::Vertical => p.height,
        } as i32;
        let (ox, oy) = (p.x as i32, p.y as i32);

        let mut pixels = Vec::new();
        for glyph in glyphs {
            let Some(outlined) = self.font.outline_glyph(glyph) else {
                continue;
            };
            let bounds = outlined.px_bounds();
            outlined.draw(|gx, gy, coverage| {
                if coverage <= 0.0 {
                    return;
                }
                let hx = bounds.min.x as i32 + gx as i32;
                let hy = bounds.min.y as i32 + gy as i32;
                let (cx, cy) = match p.orientation {
                    Orientation::Horizontal => (ox + hx, oy + hy),
                    Orientation::Vertical => (ox + hy, oy + text_width - 1 - hx),
                };
                pixels.push((cx, cy, coverage.min(1.0)));
            });
        }
        pixels
    }
}

impl TextMeasure for GlyphFont {
    fn measure(&self, text: &str, font_size: u32) -> (u32, u32) {
        let (_, width, height) = self.line(text, font_size);
        (width.ceil().max(0.0) as u32, height.ceil().max(0.0) as u32)
    }
}

/// Lays out and draws word clouds onto a bitmap canvas.
pub struct CloudRenderer {
    config: CloudConfig,
    font: Option<GlyphFont>,
}

impl CloudRenderer {
    /// Resolves the configured font; a missing font only fails at render time.
    pub fn new(config: CloudConfig) -> Self {
        let font = match GlyphFont::resolve(&config.font_candidates()) {
            Ok(font) => Some(font),
            Err(e) => {
                warn!("{e}");
                None
            }
        };
        Self { config, font }
    }

    pub fn with_font(config: CloudConfig, font: GlyphFont) -> Self {
        Self {
            config,
            font: Some(font),
        }
    }

    pub fn config(&self) -> &CloudConfig {
        &self.config
    }

    fn draw(&self, font: &GlyphFont, placements: &[Placement]) -> Result<Vec<u8>, RenderError> {
        let (width, height) = (self.config.width, self.config.height);
        let mut buffer = vec![0u8; width as usize * height as usize * 3];
        {
            let root = BitMapBackend::with_buffer(&mut buffer, (width, height)).into_drawing_area();
            let (r, g, b) = self.config.background;
            root.fill(&RGBColor(r, g, b)).map_err(backend_error)?;
            for p in placements {
                let color = RGBColor(p.color.0, p.color.1, p.color.2);
                for (x, y, coverage) in font.rasterize(p) {
                    if x < 0 || y < 0 || x >= width as i32 || y >= height as i32 {
                        continue;
                    }
                    root.draw_pixel((x, y), &color.mix(f64::from(coverage)))
                        .map_err(backend_error)?;
                }
            }
            root.present().map_err(backend_error)?;
        }
        encode_png(&buffer, width, height)
    }
}

impl Renderer for CloudRenderer {
    fn render(&self, terms: &WeightedTermSet) -> Result<Vec<u8>, RenderError> {
        let Some(font) = &self.font else {
            let tried: Vec<String> = self
                .config
                .font_candidates()
                .iter()
                .map(|p| p.display().to_string())
                .collect();
            return Err(RenderError::FontUnavailable(tried.join(", ")));
        };
        let placements = layout(terms, &self.config, font);
        debug!("Placed {} of {} entries", placements.len(), terms.len());
        self.draw(font, &placements)
    }
}

fn backend_error<E: std::fmt::Display>(e: E) -> RenderError {
    RenderError::Backend(e.to_string())
}

/// PNG-encodes a packed RGB buffer.
pub fn encode_png(rgb: &[u8], width: u32, height: u32) -> Result<Vec<u8>, RenderError> {
    let mut png = Vec::new();
    PngEncoder::new(&mut png)
        .write_image(rgb, width, height, ColorType::Rgb8)
        .map_err(|e| RenderError::Encode(e.to_string()))?;
    Ok(png)
}

/// Transport encoding for embedding images in JSON.
pub fn encode_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

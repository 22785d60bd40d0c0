//! Backend-agnostic drawing operations.
//!
//! Coordinates are millimetres from the top-left corner of the page. Text is
//! anchored on its baseline.

use super::flow::PageGeometry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const WHITE: Rgb = Rgb(255, 255, 255);

    /// Flattens `self` at `alpha` over `background`.
    pub fn over(self, background: Rgb, alpha: f32) -> Rgb {
        let mix = |fg: u8, bg: u8| (fg as f32 * alpha + bg as f32 * (1.0 - alpha)).round() as u8;
        Rgb(mix(self.0, background.0), mix(self.1, background.1), mix(self.2, background.2))
    }

    pub fn components(self) -> [f32; 3] {
        [self.0 as f32 / 255.0, self.1 as f32 / 255.0, self.2 as f32 / 255.0]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Font {
    Regular,
    Bold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextAlign {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextStyle {
    pub font: Font,
    pub size: f32, // points
    pub color: Rgb,
}

impl TextStyle {
    pub fn regular(size: f32, color: Rgb) -> Self {
        Self { font: Font::Regular, size, color }
    }

    pub fn bold(size: f32, color: Rgb) -> Self {
        Self { font: Font::Bold, size, color }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    Rect { x: f32, y: f32, width: f32, height: f32, fill: Rgb },
    Line { x1: f32, y1: f32, x2: f32, y2: f32, width: f32, color: Rgb },
    Text { x: f32, y: f32, text: String, style: TextStyle, align: TextAlign },
    Logo { x: f32, y: f32, width: f32, height: f32 },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub ops: Vec<DrawOp>,
}

impl Page {
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.ops.iter().filter_map(|op| match op {
            DrawOp::Text { text, .. } => Some(text.as_str()),
            _ => None,
        })
    }

    pub fn contains_text(&self, needle: &str) -> bool {
        self.texts().any(|t| t == needle)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LaidOutQuote {
    pub geometry: PageGeometry,
    pub pages: Vec<Page>,
}

impl LaidOutQuote {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

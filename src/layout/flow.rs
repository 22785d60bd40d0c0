//! The vertical cursor and the pages it fills.

use super::ops::{DrawOp, Page, Rgb};

/// Fixed page geometry in millimetres. Defaults to A4 with 20 mm margins.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    pub width: f32,
    pub height: f32,
    pub margin: f32,
}

impl Default for PageGeometry {
    fn default() -> Self {
        Self { width: 210.0, height: 297.0, margin: 20.0 }
    }
}

impl PageGeometry {
    pub fn content_width(&self) -> f32 {
        self.width - 2.0 * self.margin
    }

    pub fn right(&self) -> f32 {
        self.width - self.margin
    }

    /// Lowest y a unit may reach before it has to move to the next page.
    pub fn bottom_limit(&self) -> f32 {
        self.height - self.margin
    }

    pub fn is_usable(&self) -> bool {
        self.width.is_finite()
            && self.height.is_finite()
            && self.margin >= 0.0
            && self.content_width() > 0.0
            && self.bottom_limit() > self.margin
    }
}

/// Cursor `(page, y)` over a growing list of pages.
///
/// Every unit with a known height is placed with [`Flow::advance`] (or
/// checked first with [`Flow::ensure`]); a page break only happens when the
/// unit does not fit and the cursor is not already at the top of a page, so
/// an oversized unit cannot break forever.
#[derive(Debug)]
pub struct Flow {
    geometry: PageGeometry,
    background: Option<Rgb>,
    pages: Vec<Page>,
    y: f32,
}

impl Flow {
    pub fn new(geometry: PageGeometry, background: Option<Rgb>) -> Self {
        let mut flow = Self { geometry, background, pages: Vec::new(), y: geometry.margin };
        flow.new_page();
        flow
    }

    pub fn geometry(&self) -> &PageGeometry {
        &self.geometry
    }

    pub fn y(&self) -> f32 {
        self.y
    }

    pub fn set_y(&mut self, y: f32) {
        self.y = y;
    }

    pub fn page_index(&self) -> usize {
        self.pages.len() - 1
    }

    pub fn at_page_top(&self) -> bool {
        self.y <= self.geometry.margin + f32::EPSILON
    }

    pub fn fits(&self, height: f32) -> bool {
        self.y + height <= self.geometry.bottom_limit()
    }

    pub fn new_page(&mut self) {
        let mut page = Page::default();
        if let Some(fill) = self.background {
            page.ops.push(DrawOp::Rect {
                x: 0.0,
                y: 0.0,
                width: self.geometry.width,
                height: self.geometry.height,
                fill,
            });
        }
        self.pages.push(page);
        self.y = self.geometry.margin;
        if self.pages.len() > 1 {
            log::debug!("page break, now on page {}", self.pages.len());
        }
    }

    /// Breaks to a new page when `height` does not fit. Returns whether it broke.
    pub fn ensure(&mut self, height: f32) -> bool {
        if !self.fits(height) && !self.at_page_top() {
            self.new_page();
            return true;
        }
        false
    }

    /// Check-then-draw: breaks if needed, returns the y to draw at and moves
    /// the cursor past the unit.
    pub fn advance(&mut self, height: f32) -> f32 {
        self.ensure(height);
        let top = self.y;
        self.y += height;
        top
    }

    /// Moves the cursor without a fit check, for spacing after a unit.
    pub fn skip(&mut self, height: f32) {
        self.y += height;
    }

    pub fn push(&mut self, op: DrawOp) {
        if let Some(page) = self.pages.last_mut() {
            page.ops.push(op);
        }
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn finish(self) -> Vec<Page> {
        self.pages
    }
}

//! Output backends for laid-out quotes.

mod pdf;

use std::io;
use thiserror::Error;

use crate::layout::{DrawOp, LaidOutQuote, PageGeometry};
use crate::logo::Logo;

pub use pdf::{LopdfCanvas, to_win_ansi};

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("PDF generation error: {0}")]
    Pdf(String),
    #[error("canvas used out of order: {0}")]
    State(&'static str),
}

impl From<lopdf::Error> for RenderError {
    fn from(err: lopdf::Error) -> Self {
        RenderError::Pdf(err.to_string())
    }
}

/// A drawing surface that receives pages one after the other.
pub trait Canvas {
    fn begin_document(&mut self, geometry: &PageGeometry, logo: Option<&Logo>) -> Result<(), RenderError>;
    fn begin_page(&mut self) -> Result<(), RenderError>;
    fn draw(&mut self, op: &DrawOp) -> Result<(), RenderError>;
    fn end_page(&mut self) -> Result<(), RenderError>;
    /// Returns the encoded document.
    fn finish(&mut self) -> Result<Vec<u8>, RenderError>;
}

/// Replays every page on `canvas`. The first failure aborts the whole document.
pub fn render_quote<C: Canvas + ?Sized>(
    quote: &LaidOutQuote,
    logo: Option<&Logo>,
    canvas: &mut C,
) -> Result<Vec<u8>, RenderError> {
    canvas.begin_document(&quote.geometry, logo)?;
    for page in &quote.pages {
        canvas.begin_page()?;
        for op in &page.ops {
            canvas.draw(op)?;
        }
        canvas.end_page()?;
    }
    canvas.finish()
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Records calls instead of drawing.
    #[derive(Debug, Default)]
    pub struct RecordingCanvas {
        pub pages: usize,
        pub ops: Vec<DrawOp>,
        pub had_logo: bool,
        pub fail_on_page: Option<usize>,
    }

    impl Canvas for RecordingCanvas {
        fn begin_document(&mut self, _: &PageGeometry, logo: Option<&Logo>) -> Result<(), RenderError> {
            self.had_logo = logo.is_some();
            Ok(())
        }

        fn begin_page(&mut self) -> Result<(), RenderError> {
            self.pages += 1;
            if self.fail_on_page == Some(self.pages) {
                return Err(RenderError::Pdf(format!("page {} rejected", self.pages)));
            }
            Ok(())
        }

        fn draw(&mut self, op: &DrawOp) -> Result<(), RenderError> {
            self.ops.push(op.clone());
            Ok(())
        }

        fn end_page(&mut self) -> Result<(), RenderError> {
            Ok(())
        }

        fn finish(&mut self) -> Result<Vec<u8>, RenderError> {
            Ok(format!("{} pages", self.pages).into_bytes())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::RecordingCanvas;
    use super::*;
    use crate::layout::{Page, Rgb};

    fn two_pages() -> LaidOutQuote {
        let rect = DrawOp::Rect { x: 0.0, y: 0.0, width: 1.0, height: 1.0, fill: Rgb::WHITE };
        LaidOutQuote {
            geometry: PageGeometry::default(),
            pages: vec![Page { ops: vec![rect.clone()] }, Page { ops: vec![rect.clone(), rect] }],
        }
    }

    #[test]
    fn replays_every_page_in_order() {
        let mut canvas = RecordingCanvas::default();
        let bytes = render_quote(&two_pages(), None, &mut canvas).unwrap();
        assert_eq!(bytes, b"2 pages");
        assert_eq!(canvas.ops.len(), 3);
        assert!(!canvas.had_logo);
    }

    #[test]
    fn first_failure_aborts() {
        let mut canvas = RecordingCanvas { fail_on_page: Some(2), ..Default::default() };
        let err = render_quote(&two_pages(), None, &mut canvas).unwrap_err();
        assert!(matches!(err, RenderError::Pdf(_)));
        assert_eq!(canvas.ops.len(), 1);
    }
}

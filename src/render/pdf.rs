use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, StringFormat, dictionary};

use super::{Canvas, RenderError};
use crate::layout::text::text_width;
use crate::layout::{DrawOp, Font, PageGeometry, Rgb, TextAlign, TextStyle};
use crate::logo::Logo;

const MM_TO_PT: f32 = 72.0 / 25.4;
const LOGO_NAME: &[u8] = b"Im1";

fn font_resource(font: Font) -> &'static [u8] {
    match font {
        Font::Regular => b"F1",
        Font::Bold => b"F2",
    }
}

/// Encodes text for the standard fonts' WinAnsi encoding. Characters outside
/// the code page become `?`.
pub fn to_win_ansi(s: &str) -> Vec<u8> {
    s.chars()
        .map(|c| match c {
            '€' => 0x80,
            '‚' => 0x82,
            '„' => 0x84,
            '…' => 0x85,
            'Œ' => 0x8C,
            '‘' => 0x91,
            '’' => 0x92,
            '“' => 0x93,
            '”' => 0x94,
            '•' => 0x95,
            '–' => 0x96,
            '—' => 0x97,
            'œ' => 0x9C,
            'Ÿ' => 0x9F,
            '\u{202f}' => 0xA0,
            c if (c as u32) < 0x80 || (0xA0..=0xFF).contains(&(c as u32)) => c as u8,
            _ => b'?',
        })
        .collect()
}

fn color_operands(color: Rgb) -> Vec<Object> {
    color.components().into_iter().map(Object::from).collect()
}

/// Writes pages through `lopdf` with the built-in Helvetica faces.
pub struct LopdfCanvas {
    document: Document,
    pages_id: ObjectId,
    resources_id: ObjectId,
    page_ids: Vec<ObjectId>,
    page_width: f32,  // points
    page_height: f32, // points
    current: Option<Content>,
    has_logo: bool,
}

impl Default for LopdfCanvas {
    fn default() -> Self {
        Self::new()
    }
}

impl LopdfCanvas {
    pub fn new() -> Self {
        let mut document = Document::with_version("1.5");
        let pages_id = document.new_object_id();
        let resources_id = document.new_object_id();
        Self {
            document,
            pages_id,
            resources_id,
            page_ids: Vec::new(),
            page_width: 0.0,
            page_height: 0.0,
            current: None,
            has_logo: false,
        }
    }

    fn content(&mut self) -> Result<&mut Content, RenderError> {
        self.current.as_mut().ok_or(RenderError::State("draw outside of a page"))
    }

    fn add_font(&mut self, base_font: &str) -> ObjectId {
        self.document.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => base_font,
            "Encoding" => "WinAnsiEncoding",
        })
    }

    fn push_text(&mut self, x: f32, y: f32, text: &str, style: &TextStyle, align: TextAlign) -> Result<(), RenderError> {
        if text.trim().is_empty() {
            return Ok(());
        }
        let width = text_width(text, style.font, style.size);
        let left = match align {
            TextAlign::Left => x,
            TextAlign::Center => x - width / 2.0,
            TextAlign::Right => x - width,
        };
        let pdf_x = left * MM_TO_PT;
        let pdf_y = self.page_height - y * MM_TO_PT;

        let ops = &mut self.content()?.operations;
        ops.push(Operation::new("BT", vec![]));
        ops.push(Operation::new("Tf", vec![Object::Name(font_resource(style.font).to_vec()), style.size.into()]));
        ops.push(Operation::new("rg", color_operands(style.color)));
        ops.push(Operation::new("Td", vec![pdf_x.into(), pdf_y.into()]));
        ops.push(Operation::new("Tj", vec![Object::String(to_win_ansi(text), StringFormat::Literal)]));
        ops.push(Operation::new("ET", vec![]));
        Ok(())
    }
}

impl Canvas for LopdfCanvas {
    fn begin_document(&mut self, geometry: &PageGeometry, logo: Option<&Logo>) -> Result<(), RenderError> {
        self.page_width = geometry.width * MM_TO_PT;
        self.page_height = geometry.height * MM_TO_PT;

        let regular = self.add_font("Helvetica");
        let bold = self.add_font("Helvetica-Bold");
        let mut resources = dictionary! {
            "Font" => dictionary! { "F1" => regular, "F2" => bold },
        };

        if let Some(logo) = logo {
            let image = Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => logo.width() as i64,
                    "Height" => logo.height() as i64,
                    "ColorSpace" => "DeviceRGB",
                    "BitsPerComponent" => 8,
                },
                logo.rgb().to_vec(),
            );
            let image_id = self.document.add_object(image);
            resources.set("XObject", dictionary! { "Im1" => image_id });
            self.has_logo = true;
        }

        self.document.objects.insert(self.resources_id, Object::Dictionary(resources));
        self.document.objects.insert(
            self.pages_id,
            Object::Dictionary(dictionary! { "Type" => "Pages", "Kids" => vec![], "Count" => 0 }),
        );
        let catalog_id = self.document.add_object(dictionary! { "Type" => "Catalog", "Pages" => self.pages_id });
        self.document.trailer.set("Root", catalog_id);

        let info_id = self.document.add_object(dictionary! {
            "Producer" => Object::string_literal(concat!("devis-maker ", env!("CARGO_PKG_VERSION"))),
        });
        self.document.trailer.set("Info", info_id);
        Ok(())
    }

    fn begin_page(&mut self) -> Result<(), RenderError> {
        if self.current.is_some() {
            return Err(RenderError::State("previous page was not ended"));
        }
        self.current = Some(Content { operations: vec![] });
        Ok(())
    }

    fn draw(&mut self, op: &DrawOp) -> Result<(), RenderError> {
        let page_height = self.page_height;
        match op {
            DrawOp::Rect { x, y, width, height, fill } => {
                let ops = &mut self.content()?.operations;
                ops.push(Operation::new("rg", color_operands(*fill)));
                ops.push(Operation::new(
                    "re",
                    vec![
                        (x * MM_TO_PT).into(),
                        (page_height - (y + height) * MM_TO_PT).into(),
                        (width * MM_TO_PT).into(),
                        (height * MM_TO_PT).into(),
                    ],
                ));
                ops.push(Operation::new("f", vec![]));
            }
            DrawOp::Line { x1, y1, x2, y2, width, color } => {
                let ops = &mut self.content()?.operations;
                ops.push(Operation::new("w", vec![(width * MM_TO_PT).into()]));
                ops.push(Operation::new("RG", color_operands(*color)));
                ops.push(Operation::new("m", vec![(x1 * MM_TO_PT).into(), (page_height - y1 * MM_TO_PT).into()]));
                ops.push(Operation::new("l", vec![(x2 * MM_TO_PT).into(), (page_height - y2 * MM_TO_PT).into()]));
                ops.push(Operation::new("S", vec![]));
            }
            DrawOp::Text { x, y, text, style, align } => self.push_text(*x, *y, text, style, *align)?,
            DrawOp::Logo { x, y, width, height } => {
                if !self.has_logo {
                    return Err(RenderError::State("logo drawn but none was embedded"));
                }
                let (w, h) = (width * MM_TO_PT, height * MM_TO_PT);
                let ops = &mut self.content()?.operations;
                ops.push(Operation::new("q", vec![]));
                ops.push(Operation::new(
                    "cm",
                    vec![w.into(), 0.into(), 0.into(), h.into(), (x * MM_TO_PT).into(), (page_height - y * MM_TO_PT - h).into()],
                ));
                ops.push(Operation::new("Do", vec![Object::Name(LOGO_NAME.to_vec())]));
                ops.push(Operation::new("Q", vec![]));
            }
        }
        Ok(())
    }

    fn end_page(&mut self) -> Result<(), RenderError> {
        let content = self.current.take().ok_or(RenderError::State("no page to end"))?;
        let content_id = self.document.add_object(Stream::new(Dictionary::new(), content.encode()?));
        let page_id = self.document.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "MediaBox" => vec![0.into(), 0.into(), self.page_width.into(), self.page_height.into()],
            "Contents" => content_id,
            "Resources" => self.resources_id,
        });
        self.page_ids.push(page_id);
        Ok(())
    }

    fn finish(&mut self) -> Result<Vec<u8>, RenderError> {
        if self.current.is_some() {
            return Err(RenderError::State("last page was not ended"));
        }
        if self.page_ids.is_empty() {
            return Err(RenderError::Pdf("document has no pages".to_string()));
        }
        if let Some(Object::Dictionary(pages)) = self.document.objects.get_mut(&self.pages_id) {
            let kids: Vec<Object> = self.page_ids.iter().map(|id| Object::from(*id)).collect();
            pages.set("Kids", kids);
            pages.set("Count", self.page_ids.len() as i64);
        }

        let mut bytes = Vec::new();
        self.document.save_to(&mut bytes)?;
        log::debug!("pdf encoded: {} pages, {} bytes", self.page_ids.len(), bytes.len());
        Ok(bytes)
    }
}

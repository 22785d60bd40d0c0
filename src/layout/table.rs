//! Line-items table with row-level pagination.

use crate::calc;
use crate::format::CurrencyFormat;
use crate::model::{LineItem, LineKind, Priced};

use super::flow::Flow;
use super::ops::{DrawOp, TextAlign, TextStyle};
use super::text::{line_height, wrap_text};
use super::theme::Palette;

const FONT_SIZE: f32 = 9.0;
const PAD_X: f32 = 2.0;
const PAD_Y: f32 = 1.6;
const BORDER_WIDTH: f32 = 0.2;

struct Column {
    title: &'static str,
    width: Option<f32>, // None takes the remaining width
    align: TextAlign,
}

const COLUMNS: [Column; 5] = [
    Column { title: "Désignation", width: None, align: TextAlign::Left },
    Column { title: "Qté", width: Some(20.0), align: TextAlign::Center },
    Column { title: "PU HT", width: Some(35.0), align: TextAlign::Right },
    Column { title: "TVA", width: Some(25.0), align: TextAlign::Center },
    Column { title: "Total HT", width: Some(35.0), align: TextAlign::Right },
];

/// Column left edges and widths for a table spanning `x..x + width`.
fn column_boxes(x: f32, width: f32) -> [(f32, f32); 5] {
    let fixed: f32 = COLUMNS.iter().filter_map(|c| c.width).sum();
    let auto = (width - fixed).max(0.0);
    let mut boxes = [(0.0, 0.0); 5];
    let mut left = x;
    for (i, col) in COLUMNS.iter().enumerate() {
        let w = col.width.unwrap_or(auto);
        boxes[i] = (left, w);
        left += w;
    }
    boxes
}

fn anchor(left: f32, width: f32, align: TextAlign) -> f32 {
    match align {
        TextAlign::Left => left + PAD_X,
        TextAlign::Center => left + width / 2.0,
        TextAlign::Right => left + width - PAD_X,
    }
}

fn row_line_height() -> f32 {
    line_height(FONT_SIZE)
}

fn baseline(top: f32, index: usize) -> f32 {
    top + PAD_Y + (index as f32 + 0.75) * row_line_height()
}

struct Row {
    description: Vec<(String, TextStyle)>,
    quantity: String,
    unit_price: String,
    vat: String,
    total: String,
}

impl Row {
    fn height(&self) -> f32 {
        part_height(self.description.len())
    }
}

fn quantity_label(money: &CurrencyFormat, quantity: f64) -> String {
    if quantity.is_finite() && quantity != 0.0 {
        money.compact(quantity)
    } else {
        "-".to_string()
    }
}

fn priced_detail(money: &CurrencyFormat, label: &str, rate: &Priced) -> String {
    format!(
        "• {} : {} × {}",
        label,
        money.compact(rate.quantity.unwrap_or(0.0)),
        money.format(rate.unit_price.unwrap_or(0.0))
    )
}

fn build_row(
    index: usize,
    line: &LineItem,
    palette: &Palette,
    money: &CurrencyFormat,
    description_width: f32,
) -> Row {
    let main = TextStyle::regular(FONT_SIZE, palette.text);
    let detail = TextStyle::regular(FONT_SIZE, palette.text_secondary);
    let wrap = |text: &str, style: TextStyle, out: &mut Vec<(String, TextStyle)>| {
        for l in wrap_text(text, style.font, style.size, description_width) {
            out.push((l, style));
        }
    };

    let mut description = Vec::new();
    let title = if line.description.trim().is_empty() {
        format!("Ligne {}", index + 1)
    } else {
        line.description.clone()
    };
    wrap(&title, main, &mut description);

    let (quantity, unit_price) = match &line.kind {
        LineKind::Normal(p) | LineKind::Table(p) => {
            let unit = match p.unit_price {
                Some(v) if v.is_finite() && v != 0.0 => money.format(v),
                _ => "-".to_string(),
            };
            (quantity_label(money, p.quantity.unwrap_or(0.0)), unit)
        }
        LineKind::Choice(choices) => {
            for c in choices {
                let label = if c.description.trim().is_empty() { "Option" } else { c.description.trim() };
                let rate = Priced { quantity: c.quantity.or(Some(1.0)), unit_price: c.unit_price };
                wrap(&priced_detail(money, label, &rate), detail, &mut description);
            }
            (quantity_label(money, calc::line_total_quantity(choices)), "-".to_string())
        }
        LineKind::Personnel(roles) => {
            for (role, rate) in roles {
                wrap(&priced_detail(money, role.label(), rate), detail, &mut description);
            }
            let headcount: f64 = roles.values().filter_map(|r| r.quantity).filter(|q| q.is_finite()).sum();
            (quantity_label(money, headcount), "-".to_string())
        }
    };

    if let Some(long) = &line.long_description {
        wrap(long, detail, &mut description);
    }

    let vat = if line.vat_rate != 0.0 && line.vat_rate.is_finite() {
        format!("{} %", money.compact(line.vat_rate))
    } else {
        "-".to_string()
    };

    Row {
        description,
        quantity,
        unit_price,
        vat,
        total: money.format(calc::line_total_ht(line)),
    }
}

fn header_height() -> f32 {
    row_line_height() + 2.0 * PAD_Y
}

fn draw_header(flow: &mut Flow, palette: &Palette) {
    let g = *flow.geometry();
    let boxes = column_boxes(g.margin, g.content_width());
    let top = flow.y();
    let height = header_height();

    flow.push(DrawOp::Rect { x: g.margin, y: top, width: g.content_width(), height, fill: palette.primary });
    let style = TextStyle::bold(FONT_SIZE, palette.header_text);
    for (col, (left, width)) in COLUMNS.iter().zip(boxes) {
        flow.push(DrawOp::Text {
            x: anchor(left, width, col.align),
            y: baseline(top, 0),
            text: col.title.to_string(),
            style,
            align: col.align,
        });
    }
    flow.skip(height);
}

fn part_height(lines: usize) -> f32 {
    lines.max(1) as f32 * row_line_height() + 2.0 * PAD_Y
}

/// Draws `lines` of a row's description as one band. The quantity, price,
/// VAT and total cells only go on the first band of a row.
fn draw_row_part(
    flow: &mut Flow,
    row: &Row,
    lines: &[(String, TextStyle)],
    with_cells: bool,
    striped: bool,
    palette: &Palette,
) {
    let g = *flow.geometry();
    let boxes = column_boxes(g.margin, g.content_width());
    let top = flow.y();
    let height = part_height(lines.len());

    let fill = if striped { palette.stripe } else { palette.cell };
    flow.push(DrawOp::Rect { x: g.margin, y: top, width: g.content_width(), height, fill });

    let (desc_left, desc_width) = boxes[0];
    for (i, (text, style)) in lines.iter().enumerate() {
        flow.push(DrawOp::Text {
            x: anchor(desc_left, desc_width, TextAlign::Left),
            y: baseline(top, i),
            text: text.clone(),
            style: *style,
            align: TextAlign::Left,
        });
    }

    if with_cells {
        let plain = TextStyle::regular(FONT_SIZE, palette.text);
        let cells = [
            (&row.quantity, plain),
            (&row.unit_price, plain),
            (&row.vat, plain),
            (&row.total, TextStyle::bold(FONT_SIZE, palette.primary)),
        ];
        for ((text, style), (col, (left, width))) in cells.into_iter().zip(COLUMNS.iter().zip(boxes).skip(1)) {
            flow.push(DrawOp::Text {
                x: anchor(left, width, col.align),
                y: baseline(top, 0),
                text: text.clone(),
                style,
                align: col.align,
            });
        }
    }

    let bottom = top + height;
    flow.push(DrawOp::Line {
        x1: g.margin,
        y1: bottom,
        x2: g.right(),
        y2: bottom,
        width: BORDER_WIDTH,
        color: palette.border,
    });
    flow.skip(height);
}

fn continue_on_new_page(flow: &mut Flow, palette: &Palette) {
    flow.new_page();
    draw_header(flow, palette);
}

/// A row taller than a page: its description is cut into bands, each filling
/// what is left of the current page, with the header repeated in between.
fn draw_split_row(flow: &mut Flow, row: &Row, striped: bool, palette: &Palette) {
    let mut rest: &[(String, TextStyle)] = &row.description;
    let mut first = true;
    let mut fresh_page = false;

    loop {
        let room = flow.geometry().bottom_limit() - flow.y() - 2.0 * PAD_Y;
        let mut fit = (room / row_line_height()).floor().max(0.0) as usize;
        if fit == 0 {
            if !fresh_page {
                continue_on_new_page(flow, palette);
                fresh_page = true;
                continue;
            }
            // the page cannot hold a single line; place one and move on
            fit = 1;
        }

        let take = fit.min(rest.len());
        draw_row_part(flow, row, &rest[..take], first, striped, palette);
        rest = &rest[take..];
        first = false;
        if rest.is_empty() {
            break;
        }
        log::debug!("row split, {} line(s) continue on page {}", rest.len(), flow.page_index() + 2);
        continue_on_new_page(flow, palette);
        fresh_page = true;
    }
}

/// Draws the header and one row per line. A row that does not fit moves to
/// a new page, which starts with a repeated header; a row that would not fit
/// on any page is split.
pub(super) fn draw_line_table(flow: &mut Flow, lines: &[LineItem], palette: &Palette, money: &CurrencyFormat) {
    if lines.is_empty() {
        return;
    }

    let g = *flow.geometry();
    let (_, description_width) = column_boxes(g.margin, g.content_width())[0];
    let rows: Vec<Row> = lines
        .iter()
        .enumerate()
        .map(|(i, line)| build_row(i, line, palette, money, description_width - 2.0 * PAD_X))
        .collect();
    let page_room = g.bottom_limit() - g.margin - header_height();

    flow.ensure(header_height() + rows[0].height().min(page_room));
    draw_header(flow, palette);

    for (i, row) in rows.iter().enumerate() {
        let striped = i % 2 == 1;
        if row.height() > page_room {
            draw_split_row(flow, row, striped, palette);
            continue;
        }
        if flow.ensure(row.height()) {
            log::debug!("line table continues on page {} at row {}", flow.page_index() + 1, i + 1);
            draw_header(flow, palette);
        }
        draw_row_part(flow, row, &row.description, true, striped, palette);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::flow::PageGeometry;
    use crate::layout::theme::Theme;
    use crate::model::{Choice, PersonnelRole};
    use std::collections::BTreeMap;

    fn money() -> CurrencyFormat {
        CurrencyFormat::french().plain()
    }

    #[test]
    fn columns_fill_the_content_width() {
        let boxes = column_boxes(20.0, 170.0);
        assert_eq!(boxes[0], (20.0, 55.0));
        assert_eq!(boxes[4], (155.0, 35.0));
    }

    #[test]
    fn normal_row_cells() {
        let line = LineItem {
            description: "Cocktail dînatoire".into(),
            kind: LineKind::Normal(Priced::new(40.0, 12.5)),
            ..Default::default()
        };
        let row = build_row(0, &line, &Theme::Light.palette(), &money(), 51.0);
        assert_eq!(row.quantity, "40");
        assert_eq!(row.unit_price, "12,50 €");
        assert_eq!(row.vat, "20 %");
        assert_eq!(row.total, "500,00 €");
    }

    #[test]
    fn untitled_unpriced_row_uses_placeholders() {
        let line = LineItem { vat_rate: 0.0, kind: LineKind::Normal(Priced::default()), ..Default::default() };
        let row = build_row(2, &line, &Theme::Light.palette(), &money(), 51.0);
        assert_eq!(row.description[0].0, "Ligne 3");
        assert_eq!((row.quantity.as_str(), row.unit_price.as_str(), row.vat.as_str()), ("-", "-", "-"));
    }

    #[test]
    fn choice_and_personnel_details_are_listed() {
        let palette = Theme::Light.palette();
        let choices = vec![
            Choice { description: "Velouté".into(), quantity: None, unit_price: Some(5.0), ..Default::default() },
            Choice { description: "Tartare".into(), quantity: Some(2.0), unit_price: Some(9.0), ..Default::default() },
        ];
        let line = LineItem { description: "Entrées".into(), kind: LineKind::Choice(choices), ..Default::default() };
        let row = build_row(0, &line, &palette, &money(), 51.0);
        let texts: Vec<&str> = row.description.iter().map(|(t, _)| t.as_str()).collect();
        assert_eq!(texts, ["Entrées", "• Velouté : 1 × 5,00 €", "• Tartare : 2 × 9,00 €"]);
        assert_eq!(row.total, "23,00 €");

        let mut roles = BTreeMap::new();
        roles.insert(PersonnelRole::Cook, Priced::new(2.0, 180.0));
        let line = LineItem { description: "Équipe".into(), kind: LineKind::Personnel(roles), ..Default::default() };
        let row = build_row(0, &line, &palette, &money(), 51.0);
        assert_eq!(row.description[1].0, "• Cuisiniers : 2 × 180,00 €");
        assert_eq!(row.quantity, "2");
    }

    #[test]
    fn header_repeats_on_continuation_pages() {
        let lines: Vec<LineItem> = (0..80)
            .map(|i| LineItem {
                description: format!("Prestation {}", i + 1),
                kind: LineKind::Normal(Priced::new(1.0, 10.0)),
                ..Default::default()
            })
            .collect();
        let mut flow = Flow::new(PageGeometry::default(), None);
        draw_line_table(&mut flow, &lines, &Theme::Light.palette(), &money());

        let pages = flow.finish();
        assert!(pages.len() >= 2);
        for page in &pages {
            assert_eq!(page.texts().filter(|t| *t == "Désignation").count(), 1);
        }
        let rows: usize = pages.iter().map(|p| p.texts().filter(|t| t.starts_with("Prestation ")).count()).sum();
        assert_eq!(rows, 80);
    }

    #[test]
    fn rows_stay_inside_the_bottom_margin() {
        let lines: Vec<LineItem> = (0..60).map(|_| LineItem { description: "x".into(), ..Default::default() }).collect();
        let mut flow = Flow::new(PageGeometry::default(), None);
        draw_line_table(&mut flow, &lines, &Theme::Dark.palette(), &money());
        let limit = PageGeometry::default().bottom_limit();
        for page in flow.finish() {
            for op in &page.ops {
                if let DrawOp::Rect { y, height, width, .. } = op {
                    if *width < 200.0 {
                        assert!(y + height <= limit + 1e-3);
                    }
                }
            }
        }
    }

    #[test]
    fn oversized_choice_row_is_split_across_pages() {
        let choices: Vec<Choice> = (0..80)
            .map(|i| Choice { description: format!("Option {}", i + 1), unit_price: Some(4.0), ..Default::default() })
            .collect();
        let line = LineItem { description: "Buffet".into(), kind: LineKind::Choice(choices), ..Default::default() };
        let mut flow = Flow::new(PageGeometry::default(), None);
        draw_line_table(&mut flow, &[line], &Theme::Light.palette(), &money());

        let limit = PageGeometry::default().bottom_limit();
        let pages = flow.finish();
        assert!(pages.len() >= 2);
        for page in &pages {
            assert!(page.contains_text("Désignation"));
            for op in &page.ops {
                match op {
                    DrawOp::Text { y, .. } => assert!(*y <= limit, "text at {} below {}", y, limit),
                    DrawOp::Rect { y, height, .. } => assert!(y + height <= limit + 1e-3),
                    _ => {}
                }
            }
        }

        let options: usize = pages.iter().map(|p| p.texts().filter(|t| t.starts_with("• Option ")).count()).sum();
        assert_eq!(options, 80);
        let totals: usize = pages.iter().map(|p| p.texts().filter(|t| *t == "320,00 €").count()).sum();
        assert_eq!(totals, 1);
        assert!(pages[0].contains_text("320,00 €"));
    }
}

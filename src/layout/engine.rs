use crate::calc::{Totals, round2};
use crate::format::{CurrencyFormat, Locale, format_date_long};
use crate::logo::{Logo, MAX_HEIGHT_MM, MAX_WIDTH_MM};
use crate::model::{QuoteDocument, postal_line};

use super::LayoutOptions;
use super::flow::Flow;
use super::ops::{DrawOp, Page, TextAlign, TextStyle};
use super::table;
use super::text::{line_height, wrap_text};
use super::theme::Palette;

const BODY: f32 = 9.0;
const SECTION_TITLE_STEP: f32 = 8.0;
const BODY_STEP: f32 = 5.0;
const PARTY_MIN_HEIGHT: f32 = 40.0;
const PARTY_GAP: f32 = 20.0;
const TOTALS_WIDTH: f32 = 80.0;
const FOOTER_OFFSET: f32 = 15.0;

const DEFAULT_DEPOSIT_DUE: &str = "à la signature du devis";

/// Walks the document top to bottom, one section at a time.
pub(super) struct Composer<'a> {
    flow: Flow,
    palette: Palette,
    money: CurrencyFormat,
    locale: Locale,
    doc: &'a QuoteDocument,
    totals: &'a Totals,
}

impl<'a> Composer<'a> {
    pub(super) fn new(doc: &'a QuoteDocument, totals: &'a Totals, options: &LayoutOptions) -> Self {
        let palette = options.theme.palette();
        Self {
            flow: Flow::new(options.geometry, palette.page_background),
            palette,
            money: options.locale.currency_format().plain(),
            locale: options.locale,
            doc,
            totals,
        }
    }

    pub(super) fn compose(mut self, logo: Option<&Logo>) -> Vec<Page> {
        self.header(logo);
        self.prestation();
        self.parties();
        self.metadata();
        self.line_items();
        self.totals_block();
        self.payment_conditions();
        self.guarantees();
        self.complaints_contact();
        self.prestation_details();
        self.legal_conditions();
        self.footer();
        self.flow.finish()
    }

    // --- primitives ---

    fn text(&mut self, x: f32, y: f32, text: impl Into<String>, style: TextStyle, align: TextAlign) {
        self.flow.push(DrawOp::Text { x, y, text: text.into(), style, align });
    }

    /// Wraps `text` to `width` and places it line by line. A paragraph that
    /// fits on one page is kept together.
    fn paragraph(&mut self, text: &str, style: TextStyle, step: f32) {
        let g = *self.flow.geometry();
        let lines = wrap_text(text, style.font, style.size, g.content_width());
        let height = lines.len() as f32 * step;
        if height <= g.bottom_limit() - g.margin {
            self.flow.ensure(height);
        }
        for line in lines {
            let y = self.flow.advance(step);
            if !line.is_empty() {
                self.text(g.margin, y, line, style, TextAlign::Left);
            }
        }
    }

    fn section_title(&mut self, title: &str) {
        self.flow.ensure(SECTION_TITLE_STEP + BODY_STEP);
        let y = self.flow.advance(SECTION_TITLE_STEP);
        let margin = self.flow.geometry().margin;
        self.text(margin, y, title, TextStyle::bold(11.0, self.palette.primary), TextAlign::Left);
    }

    fn subtitle(&mut self, title: &str) {
        self.flow.ensure(2.0 * BODY_STEP);
        let y = self.flow.advance(BODY_STEP);
        let margin = self.flow.geometry().margin;
        self.text(margin, y, title, TextStyle::bold(BODY, self.palette.primary), TextAlign::Left);
    }

    fn body(&self) -> TextStyle {
        TextStyle::regular(BODY, self.palette.text)
    }

    fn secondary(&self) -> TextStyle {
        TextStyle::regular(BODY, self.palette.text_secondary)
    }

    // --- sections ---

    fn header(&mut self, logo: Option<&Logo>) {
        let g = *self.flow.geometry();
        let top = self.flow.advance(10.0);
        self.flow.push(DrawOp::Rect {
            x: g.margin,
            y: top,
            width: g.content_width(),
            height: 2.0,
            fill: self.palette.primary,
        });

        if let Some(logo) = logo {
            let (width, height) = logo.fit_within(MAX_WIDTH_MM, MAX_HEIGHT_MM);
            let y = self.flow.advance(height + 5.0);
            self.flow.push(DrawOp::Logo { x: g.margin, y, width, height });
        }

        let y = self.flow.advance(8.0);
        self.text(g.right(), y, "DEVIS", TextStyle::bold(32.0, self.palette.primary), TextAlign::Right);

        let doc = self.doc;
        let number = doc.quote_details.quote_number.trim();
        let y = self.flow.advance(15.0);
        if !number.is_empty() {
            let style = TextStyle::regular(10.0, self.palette.text_secondary);
            self.text(g.right(), y, format!("N° {}", number), style, TextAlign::Right);
        }
    }

    fn prestation(&mut self) {
        let doc = self.doc;
        let prestation = &doc.prestation;
        if prestation.is_empty() {
            return;
        }
        self.flow.ensure(20.0);

        if !prestation.title.trim().is_empty() {
            self.paragraph(&prestation.title, TextStyle::bold(16.0, self.palette.primary), 8.0);
        }
        let body = TextStyle::regular(10.0, self.palette.text);
        if !prestation.object.trim().is_empty() {
            self.paragraph(&format!("Objet : {}", prestation.object.trim()), body, 6.0);
        }
        if !prestation.participants.trim().is_empty() {
            self.paragraph(&format!("Participants : {}", prestation.participants.trim()), body, 6.0);
        }
        self.flow.skip(5.0);
    }

    /// Sender and client side by side, each with its own cursor; the shared
    /// cursor resumes below the taller one, never less than the minimum block.
    fn parties(&mut self) {
        let g = *self.flow.geometry();
        let column_width = (g.content_width() - PARTY_GAP) / 2.0;
        let doc = self.doc;
        let sender = &doc.sender;
        let client = &doc.client;

        let mut sender_lines = vec![(sender.name.clone(), true)];
        sender_lines.push((postal_line(&sender.address, &sender.postal_code, &sender.city), false));
        sender_lines.push((sender.phone.clone(), false));
        sender_lines.push((sender.email.clone(), false));
        if !sender.siret.trim().is_empty() {
            sender_lines.push((format!("SIRET : {}", sender.siret.trim()), false));
        }

        let client_lines = vec![
            (client.name.clone(), true),
            (postal_line(&client.address, &client.postal_code, &client.city), false),
            (client.phone.clone(), false),
            (client.email.clone(), false),
        ];

        let sender_column = self.column_lines(&sender_lines, column_width);
        let client_column = self.column_lines(&client_lines, column_width);
        let height = |lines: &[String]| BODY_STEP * (1 + lines.len().max(1)) as f32;
        let needed = height(&sender_column).max(height(&client_column)).max(PARTY_MIN_HEIGHT);
        if needed > g.bottom_limit() - g.margin {
            self.stacked_column("ÉMETTEUR", &sender_column);
            self.stacked_column("CLIENT", &client_column);
            self.flow.skip(10.0);
            return;
        }
        self.flow.ensure(needed);

        let start = self.flow.y();
        let sender_bottom = self.draw_column(g.margin, start, "ÉMETTEUR", &sender_column);
        let client_bottom = self.draw_column(g.margin + column_width + PARTY_GAP, start, "CLIENT", &client_column);

        self.flow.set_y(sender_bottom.max(client_bottom).max(start + PARTY_MIN_HEIGHT));
        self.flow.skip(10.0);
    }

    /// Wrapped lines for one party column. The name line keeps its slot even
    /// when blank; other blank fields are dropped.
    fn column_lines(&self, fields: &[(String, bool)], width: f32) -> Vec<String> {
        let mut out = Vec::new();
        for (value, keep_slot) in fields {
            let wrapped = wrap_text(value, self.body().font, BODY, width);
            if wrapped.is_empty() && *keep_slot {
                out.push(String::new());
            }
            out.extend(wrapped);
        }
        out
    }

    fn draw_column(&mut self, x: f32, start: f32, label: &str, lines: &[String]) -> f32 {
        let mut y = start;
        self.text(x, y, label, TextStyle::bold(BODY, self.palette.primary), TextAlign::Left);
        y += BODY_STEP;
        let style = self.body();
        for line in lines {
            if !line.is_empty() {
                self.text(x, y, line.clone(), style, TextAlign::Left);
            }
            y += BODY_STEP;
        }
        y
    }

    /// Fallback for a party too long for one page: one column after the
    /// other, each line placed through the cursor.
    fn stacked_column(&mut self, label: &str, lines: &[String]) {
        let margin = self.flow.geometry().margin;
        let y = self.flow.advance(BODY_STEP);
        self.text(margin, y, label, TextStyle::bold(BODY, self.palette.primary), TextAlign::Left);
        let style = self.body();
        for line in lines {
            let y = self.flow.advance(BODY_STEP);
            if !line.is_empty() {
                self.text(margin, y, line.clone(), style, TextAlign::Left);
            }
        }
        self.flow.skip(BODY_STEP);
    }

    fn metadata(&mut self) {
        let details = &self.doc.quote_details;
        let mut entries = Vec::new();
        if let Some(date) = details.issue_date {
            entries.push(format!("Date d'émission : {}", format_date_long(date, self.locale)));
        }
        if let Some(date) = details.validity_date {
            entries.push(format!("Date de validité : {}", format_date_long(date, self.locale)));
        }
        let pricing = if details.is_free { "Devis gratuit" } else { "Devis payant" };
        entries.push(pricing.to_string());

        self.flow.ensure(15.0);
        let margin = self.flow.geometry().margin;
        let style = self.secondary();
        for entry in entries {
            let y = self.flow.advance(6.0);
            self.text(margin, y, entry, style, TextAlign::Left);
        }
        self.flow.skip(5.0);
    }

    fn line_items(&mut self) {
        let doc = self.doc;
        if doc.lines.is_empty() {
            return;
        }
        table::draw_line_table(&mut self.flow, &doc.lines, &self.palette, &self.money);
        self.flow.skip(10.0);
    }

    fn totals_block(&mut self) {
        let g = *self.flow.geometry();
        let label_x = g.right() - TOTALS_WIDTH;
        let right = g.right();
        let totals = self.totals;
        let buckets: Vec<(f64, f64)> = totals.breakdown_descending().map(|(rate, b)| (rate, b.vat)).collect();

        let breakdown_height = if buckets.is_empty() { 0.0 } else { buckets.len() as f32 * 6.0 + 2.0 };
        self.flow.ensure(7.0 + breakdown_height + 7.0 + 7.0 + line_height(12.0));

        let secondary = self.secondary();
        let y = self.flow.advance(7.0);
        self.text(label_x, y, "Total HT", secondary, TextAlign::Left);
        self.text(right, y, self.money.format(totals.total_ht), secondary, TextAlign::Right);

        let small = TextStyle::regular(8.0, self.palette.text_secondary);
        for (rate, vat) in &buckets {
            let y = self.flow.advance(6.0);
            self.text(label_x, y, format!("TVA {} %", self.money.compact(*rate)), small, TextAlign::Left);
            self.text(right, y, self.money.format(*vat), small, TextAlign::Right);
        }
        if !buckets.is_empty() {
            self.flow.skip(2.0);
        }

        let y = self.flow.advance(7.0);
        self.text(label_x, y, "Total TVA", secondary, TextAlign::Left);
        self.text(right, y, self.money.format(totals.total_vat), secondary, TextAlign::Right);

        let y = self.flow.advance(7.0);
        self.flow.push(DrawOp::Line { x1: label_x, y1: y, x2: right, y2: y, width: 0.5, color: self.palette.primary });

        let y = self.flow.advance(15.0);
        let emphasis = TextStyle::bold(12.0, self.palette.primary);
        self.text(label_x, y, "Total TTC", emphasis, TextAlign::Left);
        self.text(right, y, self.money.format(totals.total_ttc), emphasis, TextAlign::Right);
    }

    fn payment_conditions(&mut self) {
        let doc = self.doc;
        let conditions = doc.quote_details.payment_conditions.trim();
        if conditions.is_empty() {
            return;
        }
        self.section_title("CONDITIONS DE PAIEMENT");
        self.paragraph(conditions, self.body(), BODY_STEP);
        self.flow.skip(5.0);
    }

    fn guarantees(&mut self) {
        let doc = self.doc;
        let g = &doc.guarantees;
        let mut entries = Vec::new();
        if g.legal_warranty {
            entries.push("• Garantie légale de conformité (obligatoire pour les ventes aux consommateurs)".to_string());
        }
        if g.hidden_defects_warranty {
            entries.push("• Garantie des vices cachés".to_string());
        }
        if !g.warranty_duration.trim().is_empty() {
            entries.push(format!("Durée de garantie : {}", g.warranty_duration.trim()));
        }
        if !g.after_sales_service.trim().is_empty() {
            entries.push(format!("Service après-vente : {}", g.after_sales_service.trim()));
        }
        if entries.is_empty() {
            return;
        }

        self.section_title("GARANTIES");
        for entry in entries {
            self.paragraph(&entry, self.body(), BODY_STEP);
        }
        self.flow.skip(5.0);
    }

    fn complaints_contact(&mut self) {
        let doc = self.doc;
        let contact = doc.guarantees.complaints_contact.trim();
        if contact.is_empty() {
            return;
        }
        self.section_title("RÉCLAMATIONS");
        self.paragraph(contact, self.body(), BODY_STEP);
        self.flow.skip(5.0);
    }

    fn prestation_details(&mut self) {
        let doc = self.doc;
        let sections: Vec<_> = doc
            .prestation_details
            .iter()
            .filter(|s| !s.title.trim().is_empty() || !s.content.trim().is_empty())
            .collect();
        if sections.is_empty() {
            return;
        }

        self.section_title("DÉROULÉ DE LA PRESTATION");
        for section in sections {
            if !section.title.trim().is_empty() {
                self.subtitle(section.title.trim());
            }
            self.paragraph(&section.content, self.secondary(), BODY_STEP);
            self.flow.skip(5.0);
        }
        self.flow.skip(5.0);
    }

    fn legal_conditions(&mut self) {
        let doc = self.doc;
        let legal = &doc.legal_conditions;
        if legal.is_empty() {
            return;
        }
        self.section_title("CONDITIONS LÉGALES");

        let deposit = &legal.deposit;
        if !deposit.is_empty() {
            self.subtitle("Acompte");
            if let Some(percentage) = deposit.percentage() {
                let sentence = deposit_sentence(&self.money, percentage, self.totals.total_ttc, &deposit.due);
                self.paragraph(&sentence, self.body(), BODY_STEP);
            }
            self.paragraph(&deposit.details, self.secondary(), BODY_STEP);
            self.flow.skip(5.0);
        }

        let discharge = &legal.discharge;
        if !discharge.is_empty() {
            self.subtitle("Décharge de responsabilité après livraison");
            if let Some(hours) = discharge.delay_hours {
                self.paragraph(&discharge_sentence(hours), self.body(), BODY_STEP);
            }
            self.paragraph(&discharge.details, self.secondary(), BODY_STEP);
            self.flow.skip(5.0);
        }

        for mention in &legal.mentions {
            if mention.title.trim().is_empty() && mention.content.trim().is_empty() {
                continue;
            }
            let title = if mention.title.trim().is_empty() { "Mentions légales" } else { mention.title.trim() };
            self.subtitle(title);
            self.paragraph(&mention.content, self.secondary(), BODY_STEP);
            self.flow.skip(5.0);
        }
    }

    /// Rule and contact line near the bottom edge of the last page.
    fn footer(&mut self) {
        let g = *self.flow.geometry();
        let y = g.height - FOOTER_OFFSET;
        self.flow.push(DrawOp::Line { x1: g.margin, y1: y, x2: g.right(), y2: y, width: 0.3, color: self.palette.primary });

        let contact = footer_text(self.doc);
        if !contact.is_empty() {
            let style = TextStyle::regular(7.0, self.palette.text_secondary);
            self.text(g.width / 2.0, y + 5.0, contact, style, TextAlign::Center);
        }
    }
}

pub(super) fn footer_text(doc: &QuoteDocument) -> String {
    let s = &doc.sender;
    [s.name.trim(), s.email.trim(), s.phone.trim()]
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" - ")
}

pub(super) fn deposit_sentence(money: &CurrencyFormat, percentage: f64, total_ttc: f64, due: &str) -> String {
    let amount = round2(total_ttc * percentage / 100.0);
    let due = if due.trim().is_empty() { DEFAULT_DEPOSIT_DUE } else { due.trim() };
    format!(
        "Un acompte de {} % du montant TTC, soit {}, est demandé {}.",
        money.compact(percentage),
        money.format(amount),
        due.trim_end_matches('.')
    )
}

pub(super) fn discharge_sentence(hours: u32) -> String {
    format!("La responsabilité du prestataire est dégagée {} heures après la livraison.", hours)
}

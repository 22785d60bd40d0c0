//! Quote document to positioned drawing operations.
//!
//! The engine never talks to a PDF library: it fills [`Page`]s with
//! [`DrawOp`]s that a [`crate::render::Canvas`] turns into bytes.

mod engine;
pub mod flow;
pub mod ops;
mod table;
pub mod text;
pub mod theme;

use thiserror::Error;

use crate::calc::Totals;
use crate::format::Locale;
use crate::logo::Logo;
use crate::model::QuoteDocument;

pub use flow::PageGeometry;
pub use ops::{DrawOp, Font, LaidOutQuote, Page, Rgb, TextAlign, TextStyle};
pub use theme::{Palette, Theme};

/// Upper bound on the pages a single quote may produce.
pub const MAX_PAGES: usize = 500;

#[derive(Debug, Error, PartialEq)]
pub enum LayoutError {
    #[error("page {width}x{height} mm with a {margin} mm margin leaves no room for content")]
    Geometry { width: f32, height: f32, margin: f32 },
    #[error("quote needs {0} pages, more than the {max} allowed", max = MAX_PAGES)]
    TooManyPages(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LayoutOptions {
    pub theme: Theme,
    pub locale: Locale,
    pub geometry: PageGeometry,
}

/// Lays out the whole quote. `totals` must come from the same document; the
/// logo, when present, has already been decoded.
pub fn layout_quote(
    doc: &QuoteDocument,
    totals: &Totals,
    logo: Option<&Logo>,
    options: &LayoutOptions,
) -> Result<LaidOutQuote, LayoutError> {
    let geometry = options.geometry;
    if !geometry.is_usable() {
        return Err(LayoutError::Geometry {
            width: geometry.width,
            height: geometry.height,
            margin: geometry.margin,
        });
    }

    let pages = engine::Composer::new(doc, totals, options).compose(logo);
    if pages.len() > MAX_PAGES {
        return Err(LayoutError::TooManyPages(pages.len()));
    }
    log::debug!("quote laid out on {} page(s)", pages.len());
    Ok(LaidOutQuote { geometry, pages })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calc;
    use crate::format::CurrencyFormat;
    use crate::model::{LegalMention, LineItem, LineKind, PrestationSection, Priced};
    use chrono::NaiveDate;

    fn sample() -> QuoteDocument {
        let mut doc = QuoteDocument::default();
        doc.sender.name = "Traiteur Martin".into();
        doc.sender.email = "contact@martin.fr".into();
        doc.sender.phone = "01 02 03 04 05".into();
        doc.client.name = "Mairie de Lyon".into();
        doc.quote_details.quote_number = "DEV-20261018-042".into();
        doc.quote_details.issue_date = NaiveDate::from_ymd_opt(2026, 10, 18);
        doc.lines.push(LineItem {
            description: "Cocktail".into(),
            kind: LineKind::Normal(Priced::new(2.0, 50.0)),
            ..Default::default()
        });
        doc
    }

    fn lay_out(doc: &QuoteDocument, theme: Theme) -> LaidOutQuote {
        let totals = calc::aggregate(&doc.lines);
        let options = LayoutOptions { theme, ..Default::default() };
        layout_quote(doc, &totals, None, &options).unwrap()
    }

    fn all_texts(quote: &LaidOutQuote) -> Vec<String> {
        quote.pages.iter().flat_map(|p| p.texts().map(str::to_string)).collect()
    }

    fn position(texts: &[String], needle: &str) -> usize {
        texts.iter().position(|t| t == needle).unwrap_or_else(|| panic!("{:?} not laid out", needle))
    }

    #[test]
    fn short_quote_fits_on_one_page() {
        let quote = lay_out(&sample(), Theme::Light);
        assert_eq!(quote.page_count(), 1);
        let page = &quote.pages[0];
        assert!(page.contains_text("DEVIS"));
        assert!(page.contains_text("N° DEV-20261018-042"));
        assert!(page.contains_text("Date d'émission : 18 octobre 2026"));
        assert!(page.contains_text("Total TTC"));
        assert!(page.contains_text("120,00 €"));
    }

    #[test]
    fn sections_follow_document_order() {
        let mut doc = sample();
        doc.prestation.title = "Séminaire annuel".into();
        doc.quote_details.payment_conditions = "Paiement à 30 jours".into();
        doc.guarantees.complaints_contact = "reclamations@martin.fr".into();
        doc.prestation_details.push(PrestationSection {
            title: "Boissons".into(),
            content: "Softs et café".into(),
            ..Default::default()
        });
        doc.legal_conditions.mentions.push(LegalMention {
            title: "Assurance".into(),
            content: "RC Pro".into(),
            ..Default::default()
        });

        let texts = all_texts(&lay_out(&doc, Theme::Light));
        let order = [
            "DEVIS",
            "Séminaire annuel",
            "ÉMETTEUR",
            "Date d'émission : 18 octobre 2026",
            "Désignation",
            "Total HT",
            "CONDITIONS DE PAIEMENT",
            "GARANTIES",
            "RÉCLAMATIONS",
            "DÉROULÉ DE LA PRESTATION",
            "CONDITIONS LÉGALES",
            "Traiteur Martin - contact@martin.fr - 01 02 03 04 05",
        ];
        let positions: Vec<usize> = order.iter().map(|t| position(&texts, t)).collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]), "{:?}", positions);
    }

    #[test]
    fn empty_sections_are_skipped() {
        let mut doc = sample();
        doc.guarantees.legal_warranty = false;
        doc.guarantees.hidden_defects_warranty = false;
        let texts = all_texts(&lay_out(&doc, Theme::Light));
        for absent in ["GARANTIES", "CONDITIONS LÉGALES", "DÉROULÉ DE LA PRESTATION", "RÉCLAMATIONS"] {
            assert!(!texts.iter().any(|t| t == absent), "{} should be skipped", absent);
        }
    }

    #[test]
    fn long_table_breaks_and_footer_lands_on_last_page_only() {
        let mut doc = sample();
        for i in 0..90 {
            doc.lines.push(LineItem {
                description: format!("Pièce {}", i),
                kind: LineKind::Normal(Priced::new(1.0, 3.0)),
                ..Default::default()
            });
        }
        let quote = lay_out(&doc, Theme::Light);
        assert!(quote.page_count() >= 3);

        let footer = "Traiteur Martin - contact@martin.fr - 01 02 03 04 05";
        let footer_pages: Vec<usize> = quote
            .pages
            .iter()
            .enumerate()
            .filter(|(_, p)| p.contains_text(footer))
            .map(|(i, _)| i)
            .collect();
        assert_eq!(footer_pages, vec![quote.page_count() - 1]);

        for page in quote.pages.iter().filter(|p| p.texts().any(|t| t.starts_with("Pièce "))) {
            assert!(page.contains_text("Désignation"));
        }
    }

    #[test]
    fn oversized_party_block_flows_onto_the_next_page() {
        let mut doc = sample();
        doc.sender.address = "Bâtiment ".repeat(1000);
        let quote = lay_out(&doc, Theme::Light);
        assert!(quote.page_count() >= 2);

        let footer = engine::footer_text(&doc);
        let limit = quote.geometry.bottom_limit();
        for page in &quote.pages {
            for op in &page.ops {
                if let DrawOp::Text { y, text, .. } = op {
                    if *text != footer {
                        assert!(*y <= limit, "{:?} at {} below {}", text, y, limit);
                    }
                }
            }
        }
        let texts = all_texts(&quote);
        assert!(position(&texts, "ÉMETTEUR") < position(&texts, "CLIENT"));
        assert!(position(&texts, "CLIENT") < position(&texts, "Total TTC"));
    }

    #[test]
    fn vat_breakdown_is_sorted_by_descending_rate() {
        let mut doc = sample();
        doc.lines.push(LineItem {
            description: "Pain".into(),
            vat_rate: 5.5,
            kind: LineKind::Normal(Priced::new(1.0, 10.0)),
            ..Default::default()
        });
        doc.lines.push(LineItem {
            description: "Vin".into(),
            vat_rate: 10.0,
            kind: LineKind::Normal(Priced::new(1.0, 10.0)),
            ..Default::default()
        });
        let texts = all_texts(&lay_out(&doc, Theme::Light));
        let rates: Vec<&String> = texts.iter().filter(|t| t.starts_with("TVA ")).collect();
        assert_eq!(rates, ["TVA 20 %", "TVA 10 %", "TVA 5,5 %"]);
    }

    #[test]
    fn two_columns_reserve_the_minimum_height() {
        let quote = lay_out(&sample(), Theme::Light);
        let y_of = |needle: &str| {
            quote.pages[0]
                .ops
                .iter()
                .find_map(|op| match op {
                    DrawOp::Text { text, y, .. } if text == needle => Some(*y),
                    _ => None,
                })
                .unwrap()
        };
        let columns_top = y_of("ÉMETTEUR");
        assert_eq!(columns_top, y_of("CLIENT"));
        assert!(y_of("Date d'émission : 18 octobre 2026") >= columns_top + 40.0 + 10.0);
    }

    #[test]
    fn dark_theme_paints_each_page() {
        let mut doc = sample();
        for _ in 0..70 {
            doc.lines.push(LineItem { description: "Plat".into(), ..Default::default() });
        }
        let quote = lay_out(&doc, Theme::Dark);
        assert!(quote.page_count() > 1);
        for page in &quote.pages {
            assert!(matches!(page.ops[0], DrawOp::Rect { width, height, .. } if width == 210.0 && height == 297.0));
        }
    }

    #[test]
    fn deposit_and_discharge_sentences() {
        let money = CurrencyFormat::french().plain();
        assert_eq!(
            engine::deposit_sentence(&money, 30.0, 1200.0, ""),
            "Un acompte de 30 % du montant TTC, soit 360,00 €, est demandé à la signature du devis."
        );
        assert_eq!(
            engine::discharge_sentence(48),
            "La responsabilité du prestataire est dégagée 48 heures après la livraison."
        );

        let mut doc = sample();
        doc.legal_conditions.deposit.percentage = Some(50.0);
        doc.legal_conditions.deposit.due = "à la commande".into();
        let texts = all_texts(&lay_out(&doc, Theme::Light));
        assert!(texts.iter().any(|t| t.starts_with("Un acompte de 50 %")));
    }

    #[test]
    fn footer_joins_available_contact_parts() {
        let mut doc = sample();
        doc.sender.email.clear();
        assert_eq!(engine::footer_text(&doc), "Traiteur Martin - 01 02 03 04 05");
    }

    #[test]
    fn unusable_geometry_is_an_error() {
        let doc = sample();
        let options = LayoutOptions {
            geometry: PageGeometry { width: 30.0, height: 297.0, margin: 20.0 },
            ..Default::default()
        };
        let err = layout_quote(&doc, &calc::aggregate(&doc.lines), None, &options).unwrap_err();
        assert!(matches!(err, LayoutError::Geometry { .. }));
    }
}

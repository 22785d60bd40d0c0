//! The single owner of the quote being edited.
//!
//! Every change to the document goes through one command method here; the
//! calculator and the layout engine only ever see a borrowed snapshot.

use chrono::{Local, NaiveDate};
use rand::Rng;
use std::path::PathBuf;

use crate::calc::{self, Totals};
use crate::lenient::parse_number;
use crate::model::{
    Choice, LegalMention, LineItem, LineKind, LineType, PersonnelRole, PrestationSection, Priced,
    QuoteDocument,
};
use crate::profiles::SenderProfile;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SenderField {
    Name,
    Address,
    PostalCode,
    City,
    Phone,
    Email,
    Siret,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientField {
    Name,
    Address,
    PostalCode,
    City,
    Phone,
    Email,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrestationField {
    Title,
    Object,
    Participants,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteDetailsField {
    QuoteNumber,
    IssueDate,
    ValidityDate,
    PaymentConditions,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuaranteeField {
    WarrantyDuration,
    AfterSalesService,
    ComplaintsContact,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarrantyFlag {
    Legal,
    HiddenDefects,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineField {
    Description,
    LongDescription,
    Quantity,
    UnitPrice,
    VatRate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChoiceField {
    Description,
    Quantity,
    UnitPrice,
}

/// Shared by prestation-detail sections and legal mentions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionField {
    Title,
    Content,
}

/// Dates come from text inputs: `2026-10-18` or `18/10/2026`; anything else clears the date.
fn parse_date(value: &str) -> Option<NaiveDate> {
    let v = value.trim();
    NaiveDate::parse_from_str(v, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(v, "%d/%m/%Y"))
        .ok()
}

/// An empty quote dated today.
fn blank_document() -> QuoteDocument {
    let mut doc = QuoteDocument::default();
    doc.quote_details.issue_date = Some(Local::now().date_naive());
    doc
}

#[derive(Debug, Clone)]
pub struct QuoteEditor {
    doc: QuoteDocument,
}

impl Default for QuoteEditor {
    fn default() -> Self {
        Self::new()
    }
}

impl QuoteEditor {
    pub fn new() -> Self {
        Self { doc: blank_document() }
    }

    pub fn from_document(doc: QuoteDocument) -> Self {
        Self { doc }
    }

    pub fn document(&self) -> &QuoteDocument {
        &self.doc
    }

    pub fn snapshot(&self) -> QuoteDocument {
        self.doc.clone()
    }

    pub fn into_document(self) -> QuoteDocument {
        self.doc
    }

    /// Recomputed on every call; nothing is cached.
    pub fn totals(&self) -> Totals {
        calc::aggregate(&self.doc.lines)
    }

    pub fn reset(&mut self) {
        self.doc = blank_document();
    }

    // --- sub-object setters ---

    pub fn set_sender(&mut self, field: SenderField, value: &str) {
        let s = &mut self.doc.sender;
        let slot = match field {
            SenderField::Name => &mut s.name,
            SenderField::Address => &mut s.address,
            SenderField::PostalCode => &mut s.postal_code,
            SenderField::City => &mut s.city,
            SenderField::Phone => &mut s.phone,
            SenderField::Email => &mut s.email,
            SenderField::Siret => &mut s.siret,
        };
        *slot = value.to_string();
    }

    pub fn set_logo(&mut self, path: Option<PathBuf>) {
        self.doc.sender.logo = path;
    }

    pub fn load_profile(&mut self, profile: &SenderProfile) {
        self.doc.sender = profile.sender.clone();
    }

    pub fn set_client(&mut self, field: ClientField, value: &str) {
        let c = &mut self.doc.client;
        let slot = match field {
            ClientField::Name => &mut c.name,
            ClientField::Address => &mut c.address,
            ClientField::PostalCode => &mut c.postal_code,
            ClientField::City => &mut c.city,
            ClientField::Phone => &mut c.phone,
            ClientField::Email => &mut c.email,
        };
        *slot = value.to_string();
    }

    pub fn set_prestation(&mut self, field: PrestationField, value: &str) {
        let p = &mut self.doc.prestation;
        let slot = match field {
            PrestationField::Title => &mut p.title,
            PrestationField::Object => &mut p.object,
            PrestationField::Participants => &mut p.participants,
        };
        *slot = value.to_string();
    }

    pub fn set_quote_details(&mut self, field: QuoteDetailsField, value: &str) {
        let d = &mut self.doc.quote_details;
        match field {
            QuoteDetailsField::QuoteNumber => d.quote_number = value.trim().to_string(),
            QuoteDetailsField::IssueDate => d.issue_date = parse_date(value),
            QuoteDetailsField::ValidityDate => d.validity_date = parse_date(value),
            QuoteDetailsField::PaymentConditions => d.payment_conditions = value.to_string(),
        }
    }

    pub fn set_free(&mut self, is_free: bool) {
        self.doc.quote_details.is_free = is_free;
    }

    pub fn set_guarantees(&mut self, field: GuaranteeField, value: &str) {
        let g = &mut self.doc.guarantees;
        let slot = match field {
            GuaranteeField::WarrantyDuration => &mut g.warranty_duration,
            GuaranteeField::AfterSalesService => &mut g.after_sales_service,
            GuaranteeField::ComplaintsContact => &mut g.complaints_contact,
        };
        *slot = value.to_string();
    }

    pub fn set_warranty(&mut self, flag: WarrantyFlag, enabled: bool) {
        match flag {
            WarrantyFlag::Legal => self.doc.guarantees.legal_warranty = enabled,
            WarrantyFlag::HiddenDefects => self.doc.guarantees.hidden_defects_warranty = enabled,
        }
    }

    pub fn set_deposit(&mut self, percentage: &str, due: &str, details: &str) {
        let deposit = &mut self.doc.legal_conditions.deposit;
        deposit.percentage = parse_number(percentage);
        deposit.due = due.to_string();
        deposit.details = details.to_string();
    }

    pub fn set_discharge(&mut self, delay_hours: Option<u32>, details: &str) {
        let discharge = &mut self.doc.legal_conditions.discharge;
        discharge.delay_hours = delay_hours;
        discharge.details = details.to_string();
    }

    // --- line items ---

    /// Appends a normal line (quantity 1, price 0, VAT 20 %) and returns its id.
    pub fn add_line(&mut self) -> String {
        let line = LineItem::default();
        let id = line.id.clone();
        self.doc.lines.push(line);
        id
    }

    /// Removes a line. The last remaining line is kept.
    pub fn remove_line(&mut self, line_id: &str) -> bool {
        if self.doc.lines.len() <= 1 {
            return false;
        }
        let before = self.doc.lines.len();
        self.doc.lines.retain(|l| l.id != line_id);
        self.doc.lines.len() != before
    }

    fn line_mut(&mut self, line_id: &str) -> Option<&mut LineItem> {
        self.doc.lines.iter_mut().find(|l| l.id == line_id)
    }

    /// Applies a form value to a line. Quantity and price only apply to
    /// normal and table lines; on other kinds the value is dropped.
    pub fn update_line(&mut self, line_id: &str, field: LineField, value: &str) -> bool {
        let Some(line) = self.line_mut(line_id) else {
            return false;
        };
        match field {
            LineField::Description => line.description = value.to_string(),
            LineField::LongDescription => {
                line.long_description = Some(value.to_string()).filter(|v| !v.trim().is_empty())
            }
            LineField::VatRate => line.vat_rate = parse_number(value).unwrap_or(0.0),
            LineField::Quantity | LineField::UnitPrice => {
                let line_type = line.kind.line_type();
                match &mut line.kind {
                    LineKind::Normal(p) | LineKind::Table(p) => {
                        let parsed = parse_number(value);
                        if field == LineField::Quantity {
                            p.quantity = parsed;
                        } else {
                            p.unit_price = parsed;
                        }
                    }
                    _ => log::debug!("{:?} ignored on {} line {}", field, line_type, line_id),
                }
            }
        }
        true
    }

    /// Switches the price source of a line. Normal and table lines keep
    /// their quantity and price between each other.
    pub fn set_line_type(&mut self, line_id: &str, line_type: LineType) -> bool {
        let Some(line) = self.line_mut(line_id) else {
            return false;
        };
        if line.kind.line_type() == line_type {
            return true;
        }
        line.kind = match (&line.kind, line_type) {
            (LineKind::Normal(p) | LineKind::Table(p), LineType::Table) => LineKind::Table(*p),
            (LineKind::Normal(p) | LineKind::Table(p), LineType::Normal) => LineKind::Normal(*p),
            (_, other) => LineKind::empty(other),
        };
        true
    }

    /// Sets one personnel role; a zero quantity removes the role.
    pub fn set_personnel(&mut self, line_id: &str, role: PersonnelRole, quantity: &str, unit_price: &str) -> bool {
        let Some(line) = self.line_mut(line_id) else {
            return false;
        };
        let LineKind::Personnel(roles) = &mut line.kind else {
            return false;
        };
        let rate = Priced { quantity: parse_number(quantity), unit_price: parse_number(unit_price) };
        if rate.quantity.unwrap_or(0.0) == 0.0 {
            roles.remove(&role);
        } else {
            roles.insert(role, rate);
        }
        true
    }

    // --- choices ---

    fn choices_mut(&mut self, line_id: &str) -> Option<&mut Vec<Choice>> {
        match &mut self.line_mut(line_id)?.kind {
            LineKind::Choice(choices) => Some(choices),
            _ => None,
        }
    }

    pub fn add_choice(&mut self, line_id: &str) -> Option<String> {
        let choices = self.choices_mut(line_id)?;
        let choice = Choice::default();
        let id = choice.id.clone();
        choices.push(choice);
        Some(id)
    }

    pub fn remove_choice(&mut self, line_id: &str, choice_id: &str) -> bool {
        let Some(choices) = self.choices_mut(line_id) else {
            return false;
        };
        let before = choices.len();
        choices.retain(|c| c.id != choice_id);
        choices.len() != before
    }

    pub fn update_choice(&mut self, line_id: &str, choice_id: &str, field: ChoiceField, value: &str) -> bool {
        let Some(choice) = self
            .choices_mut(line_id)
            .and_then(|choices| choices.iter_mut().find(|c| c.id == choice_id))
        else {
            return false;
        };
        match field {
            ChoiceField::Description => choice.description = value.to_string(),
            ChoiceField::Quantity => choice.quantity = parse_number(value),
            ChoiceField::UnitPrice => choice.unit_price = parse_number(value),
        }
        true
    }

    // --- prestation-detail sections ---

    pub fn add_section(&mut self) -> String {
        let section = PrestationSection::default();
        let id = section.id.clone();
        self.doc.prestation_details.push(section);
        id
    }

    pub fn remove_section(&mut self, section_id: &str) -> bool {
        let before = self.doc.prestation_details.len();
        self.doc.prestation_details.retain(|s| s.id != section_id);
        self.doc.prestation_details.len() != before
    }

    pub fn update_section(&mut self, section_id: &str, field: SectionField, value: &str) -> bool {
        let Some(section) = self.doc.prestation_details.iter_mut().find(|s| s.id == section_id) else {
            return false;
        };
        match field {
            SectionField::Title => section.title = value.to_string(),
            SectionField::Content => section.content = value.to_string(),
        }
        true
    }

    // --- legal mentions ---

    pub fn add_legal_mention(&mut self) -> String {
        let mention = LegalMention::default();
        let id = mention.id.clone();
        self.doc.legal_conditions.mentions.push(mention);
        id
    }

    pub fn remove_legal_mention(&mut self, mention_id: &str) -> bool {
        let mentions = &mut self.doc.legal_conditions.mentions;
        let before = mentions.len();
        mentions.retain(|m| m.id != mention_id);
        mentions.len() != before
    }

    pub fn update_legal_mention(&mut self, mention_id: &str, field: SectionField, value: &str) -> bool {
        let Some(mention) = self.doc.legal_conditions.mentions.iter_mut().find(|m| m.id == mention_id) else {
            return false;
        };
        match field {
            SectionField::Title => mention.title = value.to_string(),
            SectionField::Content => mention.content = value.to_string(),
        }
        true
    }

    // --- quote number ---

    /// `DEV-YYYYMMDD-NNN`
    pub fn generate_quote_number(date: NaiveDate) -> String {
        let suffix: u32 = rand::rng().random_range(0..1000);
        format!("DEV-{}-{:03}", date.format("%Y%m%d"), suffix)
    }

    /// Fills the quote number when it is still empty.
    pub fn initialize_quote_number(&mut self) {
        if self.doc.quote_details.quote_number.is_empty() {
            self.doc.quote_details.quote_number = Self::generate_quote_number(Local::now().date_naive());
        }
    }
}

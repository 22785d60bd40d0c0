use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::lenient;

pub(crate) fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct Sender {
    pub name: String,
    pub address: String,
    pub postal_code: String,
    pub city: String,
    pub phone: String,
    pub email: String,
    pub siret: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logo: Option<PathBuf>, // image file, decoded at export time
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct Client {
    pub name: String,
    pub address: String,
    pub postal_code: String,
    pub city: String,
    pub phone: String,
    pub email: String,
}

/// Joins "address, postal code city" the way both parties print it.
pub fn postal_line(address: &str, postal_code: &str, city: &str) -> String {
    let locality = [postal_code.trim(), city.trim()]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    [address.trim(), locality.as_str()]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Prestation {
    pub title: String,
    pub object: String,
    pub participants: String,
}

impl Prestation {
    pub fn is_empty(&self) -> bool {
        self.title.trim().is_empty()
            && self.object.trim().is_empty()
            && self.participants.trim().is_empty()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct QuoteDetails {
    pub quote_number: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issue_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validity_date: Option<NaiveDate>,
    pub is_free: bool,
    pub payment_conditions: String,
}

impl Default for QuoteDetails {
    fn default() -> Self {
        Self {
            quote_number: String::new(),
            issue_date: None,
            validity_date: None,
            is_free: true,
            payment_conditions: String::new(),
        }
    }
}

// ==========================================
// Line items
// ==========================================

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LineType {
    #[default]
    Normal,
    Choice,
    Table,
    Personnel,
}

impl fmt::Display for LineType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LineType::Normal => "normal",
            LineType::Choice => "choice",
            LineType::Table => "table",
            LineType::Personnel => "personnel",
        };
        f.write_str(s)
    }
}

impl FromStr for LineType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "normal" | "" => Ok(LineType::Normal),
            "choice" => Ok(LineType::Choice),
            "table" => Ok(LineType::Table),
            "personnel" => Ok(LineType::Personnel),
            other => Err(format!("unknown line type '{}'", other)),
        }
    }
}

/// A quantity and unit price pair, both possibly missing or unparseable.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct Priced {
    #[serde(deserialize_with = "lenient::option_number", skip_serializing_if = "Option::is_none")]
    pub quantity: Option<f64>,
    #[serde(deserialize_with = "lenient::option_number", skip_serializing_if = "Option::is_none")]
    pub unit_price: Option<f64>,
}

impl Priced {
    pub fn new(quantity: f64, unit_price: f64) -> Self {
        Self { quantity: Some(quantity), unit_price: Some(unit_price) }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Choice {
    #[serde(default = "new_id")]
    pub id: String,
    #[serde(default)]
    pub description: String,
    // Choices saved before quantities existed have none; they count as 1.
    #[serde(default, deserialize_with = "lenient::option_number", skip_serializing_if = "Option::is_none")]
    pub quantity: Option<f64>,
    #[serde(default, deserialize_with = "lenient::option_number", skip_serializing_if = "Option::is_none")]
    pub unit_price: Option<f64>,
}

impl Default for Choice {
    fn default() -> Self {
        Self { id: new_id(), description: String::new(), quantity: Some(1.0), unit_price: Some(0.0) }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PersonnelRole {
    Server,
    Cook,
    Bartender,
    HeadWaiter,
}

impl PersonnelRole {
    pub const ALL: [PersonnelRole; 4] = [
        PersonnelRole::Server,
        PersonnelRole::Cook,
        PersonnelRole::Bartender,
        PersonnelRole::HeadWaiter,
    ];

    pub fn key(self) -> &'static str {
        match self {
            PersonnelRole::Server => "server",
            PersonnelRole::Cook => "cook",
            PersonnelRole::Bartender => "bartender",
            PersonnelRole::HeadWaiter => "head_waiter",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PersonnelRole::Server => "Serveurs",
            PersonnelRole::Cook => "Cuisiniers",
            PersonnelRole::Bartender => "Barmans",
            PersonnelRole::HeadWaiter => "Maîtres d'hôtel",
        }
    }
}

impl FromStr for PersonnelRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "server" | "servers" => Ok(PersonnelRole::Server),
            "cook" | "cooks" => Ok(PersonnelRole::Cook),
            "bartender" | "bartenders" => Ok(PersonnelRole::Bartender),
            "head_waiter" | "headwaiter" | "head_waiters" => Ok(PersonnelRole::HeadWaiter),
            other => Err(format!("unknown personnel role '{}'", other)),
        }
    }
}

/// The price source of a line; each variant carries only its own fields.
#[derive(Debug, Clone, PartialEq)]
pub enum LineKind {
    Normal(Priced),
    Table(Priced),
    Choice(Vec<Choice>),
    Personnel(BTreeMap<PersonnelRole, Priced>),
}

impl LineKind {
    pub fn empty(line_type: LineType) -> Self {
        match line_type {
            LineType::Normal => LineKind::Normal(Priced::new(1.0, 0.0)),
            LineType::Table => LineKind::Table(Priced::new(1.0, 0.0)),
            LineType::Choice => LineKind::Choice(Vec::new()),
            LineType::Personnel => LineKind::Personnel(BTreeMap::new()),
        }
    }

    pub fn line_type(&self) -> LineType {
        match self {
            LineKind::Normal(_) => LineType::Normal,
            LineKind::Table(_) => LineType::Table,
            LineKind::Choice(_) => LineType::Choice,
            LineKind::Personnel(_) => LineType::Personnel,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(from = "RawLineItem", into = "RawLineItem")]
pub struct LineItem {
    pub id: String,
    pub description: String,
    pub long_description: Option<String>,
    pub vat_rate: f64, // percent
    pub kind: LineKind,
}

impl Default for LineItem {
    fn default() -> Self {
        Self {
            id: new_id(),
            description: String::new(),
            long_description: None,
            vat_rate: 20.0,
            kind: LineKind::empty(LineType::Normal),
        }
    }
}

impl LineItem {
    pub fn line_type(&self) -> LineType {
        self.kind.line_type()
    }
}

/// Loose on-disk shape: every mode's fields side by side, as older quotes
/// were saved. Only the fields of the active `type` survive conversion.
#[derive(Debug, Serialize, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
struct RawLineItem {
    id: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    line_type: Option<String>,
    description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    long_description: Option<String>,
    #[serde(deserialize_with = "lenient::option_number", skip_serializing_if = "Option::is_none")]
    quantity: Option<f64>,
    #[serde(deserialize_with = "lenient::option_number", skip_serializing_if = "Option::is_none")]
    unit_price: Option<f64>,
    #[serde(alias = "vat", deserialize_with = "lenient::option_number", skip_serializing_if = "Option::is_none")]
    vat_rate: Option<f64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    choices: Vec<Choice>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    personnel: BTreeMap<String, Priced>,
}

impl From<RawLineItem> for LineItem {
    fn from(raw: RawLineItem) -> Self {
        let line_type = raw
            .line_type
            .as_deref()
            .map(|t| {
                t.parse::<LineType>().unwrap_or_else(|e| {
                    log::warn!("{}, treating line '{}' as normal", e, raw.id);
                    LineType::Normal
                })
            })
            .unwrap_or_default();

        let priced = Priced { quantity: raw.quantity, unit_price: raw.unit_price };
        let kind = match line_type {
            LineType::Normal => LineKind::Normal(priced),
            LineType::Table => LineKind::Table(priced),
            LineType::Choice => LineKind::Choice(raw.choices),
            LineType::Personnel => {
                let mut roles = BTreeMap::new();
                for (key, rate) in raw.personnel {
                    match key.parse::<PersonnelRole>() {
                        Ok(role) => {
                            roles.insert(role, rate);
                        }
                        Err(e) => log::warn!("{}, ignored", e),
                    }
                }
                LineKind::Personnel(roles)
            }
        };

        LineItem {
            id: if raw.id.is_empty() { new_id() } else { raw.id },
            description: raw.description,
            long_description: raw.long_description.filter(|s| !s.trim().is_empty()),
            vat_rate: raw.vat_rate.unwrap_or(0.0),
            kind,
        }
    }
}

impl From<LineItem> for RawLineItem {
    fn from(line: LineItem) -> Self {
        let mut raw = RawLineItem {
            id: line.id,
            line_type: Some(line.kind.line_type().to_string()),
            description: line.description,
            long_description: line.long_description,
            vat_rate: Some(line.vat_rate),
            ..Default::default()
        };
        match line.kind {
            LineKind::Normal(p) | LineKind::Table(p) => {
                raw.quantity = p.quantity;
                raw.unit_price = p.unit_price;
            }
            LineKind::Choice(choices) => raw.choices = choices,
            LineKind::Personnel(roles) => {
                raw.personnel = roles.into_iter().map(|(role, rate)| (role.key().to_string(), rate)).collect();
            }
        }
        raw
    }
}

// ==========================================
// Free-form sections
// ==========================================

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct PrestationSection {
    pub id: String,
    pub title: String,
    pub content: String,
}

impl Default for PrestationSection {
    fn default() -> Self {
        Self { id: new_id(), title: String::new(), content: String::new() }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct LegalMention {
    pub id: String,
    pub title: String,
    pub content: String,
}

impl Default for LegalMention {
    fn default() -> Self {
        Self { id: new_id(), title: String::new(), content: String::new() }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct DepositTerms {
    #[serde(deserialize_with = "lenient::option_number", skip_serializing_if = "Option::is_none")]
    pub percentage: Option<f64>,
    pub due: String, // e.g. "à la signature du devis"
    pub details: String,
}

impl DepositTerms {
    pub fn percentage(&self) -> Option<f64> {
        self.percentage.filter(|p| p.is_finite() && *p > 0.0)
    }

    pub fn is_empty(&self) -> bool {
        self.percentage().is_none() && self.details.trim().is_empty()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct DischargeTerms {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delay_hours: Option<u32>,
    pub details: String,
}

impl DischargeTerms {
    pub fn is_empty(&self) -> bool {
        self.delay_hours.is_none() && self.details.trim().is_empty()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct LegalConditions {
    pub deposit: DepositTerms,
    pub discharge: DischargeTerms,
    pub mentions: Vec<LegalMention>,
}

impl LegalConditions {
    pub fn is_empty(&self) -> bool {
        self.deposit.is_empty()
            && self.discharge.is_empty()
            && self.mentions.iter().all(|m| m.title.trim().is_empty() && m.content.trim().is_empty())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct Guarantees {
    pub legal_warranty: bool,
    pub hidden_defects_warranty: bool,
    pub warranty_duration: String,
    pub after_sales_service: String,
    pub complaints_contact: String,
}

impl Default for Guarantees {
    fn default() -> Self {
        Self {
            legal_warranty: true,
            hidden_defects_warranty: true,
            warranty_duration: String::new(),
            after_sales_service: String::new(),
            complaints_contact: String::new(),
        }
    }
}

// ==========================================
// Aggregate root
// ==========================================

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct QuoteDocument {
    pub sender: Sender,
    pub client: Client,
    pub prestation: Prestation,
    pub quote_details: QuoteDetails,
    pub lines: Vec<LineItem>,
    pub prestation_details: Vec<PrestationSection>,
    pub legal_conditions: LegalConditions,
    pub guarantees: Guarantees,
}

impl QuoteDocument {
    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    pub fn line(&self, id: &str) -> Option<&LineItem> {
        self.lines.iter().find(|l| l.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cleared_dates_stay_cleared_after_a_save() {
        let mut doc = QuoteDocument::default();
        doc.quote_details.quote_number = "DEV-1".into();
        doc.quote_details.issue_date = None;
        let reloaded = QuoteDocument::from_toml_str(&doc.to_toml_string().unwrap()).unwrap();
        assert_eq!(reloaded.quote_details.issue_date, None);
        assert_eq!(reloaded.quote_details.validity_date, None);

        doc.quote_details.issue_date = NaiveDate::from_ymd_opt(2026, 10, 18);
        let reloaded = QuoteDocument::from_toml_str(&doc.to_toml_string().unwrap()).unwrap();
        assert_eq!(reloaded.quote_details, doc.quote_details);
    }

    #[test]
    fn missing_type_reads_as_normal_line() {
        let doc = QuoteDocument::from_toml_str(
            r#"
            [[lines]]
            id = "a"
            description = "Cocktail"
            quantity = 2
            unitPrice = "12,5"
            vat = 10
            choices = [{ description = "ignored", unitPrice = 99 }]
            "#,
        )
        .unwrap();

        let line = &doc.lines[0];
        assert_eq!(line.vat_rate, 10.0);
        assert_eq!(line.kind, LineKind::Normal(Priced::new(2.0, 12.5)));
    }

    #[test]
    fn inactive_mode_fields_are_dropped() {
        let doc = QuoteDocument::from_toml_str(
            r#"
            [[lines]]
            type = "choice"
            description = "Entrée"
            quantity = 40
            unitPrice = 3
            vatRate = 10
            choices = [{ id = "c1", description = "Velouté", unitPrice = 5 }]
            "#,
        )
        .unwrap();

        match &doc.lines[0].kind {
            LineKind::Choice(choices) => {
                assert_eq!(choices.len(), 1);
                assert_eq!(choices[0].quantity, None);
                assert_eq!(choices[0].unit_price, Some(5.0));
            }
            other => panic!("expected a choice line, got {:?}", other),
        }
        assert!(!doc.lines[0].id.is_empty());
    }

    #[test]
    fn personnel_roles_survive_a_toml_round_trip() {
        let mut roles = BTreeMap::new();
        roles.insert(PersonnelRole::Server, Priced::new(3.0, 150.0));
        roles.insert(PersonnelRole::HeadWaiter, Priced::new(1.0, 220.0));
        let mut doc = QuoteDocument::default();
        doc.lines.push(LineItem {
            description: "Service".into(),
            kind: LineKind::Personnel(roles.clone()),
            ..Default::default()
        });

        let text = doc.to_toml_string().unwrap();
        let back = QuoteDocument::from_toml_str(&text).unwrap();
        assert_eq!(back.lines[0].kind, LineKind::Personnel(roles));
    }

    #[test]
    fn unknown_roles_are_ignored() {
        let doc = QuoteDocument::from_toml_str(
            r#"
            [[lines]]
            type = "personnel"
            [lines.personnel.servers]
            quantity = 2
            unitPrice = 100
            [lines.personnel.jugglers]
            quantity = 1
            unitPrice = 500
            "#,
        )
        .unwrap();

        match &doc.lines[0].kind {
            LineKind::Personnel(roles) => {
                assert_eq!(roles.len(), 1);
                assert_eq!(roles[&PersonnelRole::Server], Priced::new(2.0, 100.0));
            }
            other => panic!("expected personnel, got {:?}", other),
        }
    }

    #[test]
    fn postal_line_skips_blank_parts() {
        assert_eq!(postal_line("1 rue Haute", "75001", "Paris"), "1 rue Haute, 75001 Paris");
        assert_eq!(postal_line("", "", "Lyon"), "Lyon");
        assert_eq!(postal_line("", "", ""), "");
    }
}

//! Locale policy for amounts, rates and dates.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::calc::round2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Locale {
    #[default]
    #[serde(rename = "fr-FR")]
    FrFr,
    #[serde(rename = "en-US")]
    EnUs,
}

impl Locale {
    pub fn currency_format(self) -> CurrencyFormat {
        match self {
            Locale::FrFr => CurrencyFormat::french(),
            Locale::EnUs => CurrencyFormat::english(),
        }
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Locale::FrFr => "fr-FR",
            Locale::EnUs => "en-US",
        })
    }
}

impl FromStr for Locale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "fr" | "fr-fr" => Ok(Locale::FrFr),
            "en" | "en-us" => Ok(Locale::EnUs),
            other => Err(format!("unsupported locale '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolPosition {
    Prefix,
    Suffix,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CurrencyFormat {
    pub decimal_separator: char,
    pub group_separator: char,
    pub symbol: &'static str,
    pub position: SymbolPosition,
    pub symbol_spacing: Option<char>,
}

impl Default for CurrencyFormat {
    fn default() -> Self {
        Self::french()
    }
}

impl CurrencyFormat {
    /// `1 234,56 €` with a narrow no-break space between thousands.
    pub fn french() -> Self {
        Self {
            decimal_separator: ',',
            group_separator: '\u{202f}',
            symbol: "€",
            position: SymbolPosition::Suffix,
            symbol_spacing: Some('\u{a0}'),
        }
    }

    /// `€1,234.56`
    pub fn english() -> Self {
        Self {
            decimal_separator: '.',
            group_separator: ',',
            symbol: "€",
            position: SymbolPosition::Prefix,
            symbol_spacing: None,
        }
    }

    /// Same policy with ordinary spaces, for fonts lacking the no-break glyphs.
    pub fn plain(&self) -> Self {
        let plain_space = |c: char| if c.is_whitespace() || c == '\u{a0}' || c == '\u{202f}' { ' ' } else { c };
        Self {
            group_separator: plain_space(self.group_separator),
            symbol_spacing: self.symbol_spacing.map(plain_space),
            ..self.clone()
        }
    }

    /// Two decimals with grouping, no symbol.
    pub fn number(&self, amount: f64) -> String {
        let rounded = round2(amount);
        let fixed = format!("{:.2}", rounded.abs());
        let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

        let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
        for (i, digit) in int_part.chars().enumerate() {
            if i > 0 && (int_part.len() - i) % 3 == 0 {
                grouped.push(self.group_separator);
            }
            grouped.push(digit);
        }

        let sign = if rounded < 0.0 { "-" } else { "" };
        format!("{}{}{}{}", sign, grouped, self.decimal_separator, frac_part)
    }

    pub fn format(&self, amount: f64) -> String {
        let number = self.number(amount);
        let spacing = self.symbol_spacing.map(String::from).unwrap_or_default();
        match self.position {
            SymbolPosition::Suffix => format!("{}{}{}", number, spacing, self.symbol),
            SymbolPosition::Prefix => match number.strip_prefix('-') {
                Some(abs) => format!("-{}{}{}", self.symbol, spacing, abs),
                None => format!("{}{}{}", self.symbol, spacing, number),
            },
        }
    }

    /// `20,00 %`
    pub fn percentage(&self, rate: f64) -> String {
        let fixed = format!("{:.2}", rate);
        format!("{} %", fixed.replace('.', &self.decimal_separator.to_string()))
    }

    /// Up to two decimals, trailing zeros dropped: `20`, `5,5`, `1,25`.
    pub fn compact(&self, value: f64) -> String {
        let fixed = format!("{:.2}", round2(value));
        let trimmed = if fixed.contains('.') {
            fixed.trim_end_matches('0').trim_end_matches('.')
        } else {
            fixed.as_str()
        };
        trimmed.replace('.', &self.decimal_separator.to_string())
    }
}

pub fn format_currency(amount: f64) -> String {
    CurrencyFormat::default().format(amount)
}

pub fn format_percentage(rate: f64) -> String {
    CurrencyFormat::default().percentage(rate)
}

const FRENCH_MONTHS: [&str; 12] = [
    "janvier", "février", "mars", "avril", "mai", "juin",
    "juillet", "août", "septembre", "octobre", "novembre", "décembre",
];

/// `18 octobre 2026` / `October 18, 2026`
pub fn format_date_long(date: NaiveDate, locale: Locale) -> String {
    match locale {
        Locale::FrFr => format!("{} {} {}", date.day(), FRENCH_MONTHS[date.month0() as usize], date.year()),
        Locale::EnUs => date.format("%B %-d, %Y").to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn french_currency() {
        assert_eq!(format_currency(1234.56), "1\u{202f}234,56\u{a0}€");
        assert_eq!(format_currency(0.5), "0,50\u{a0}€");
        assert_eq!(format_currency(-1234567.891), "-1\u{202f}234\u{202f}567,89\u{a0}€");
    }

    #[test]
    fn english_currency() {
        let en = CurrencyFormat::english();
        assert_eq!(en.format(1234.5), "€1,234.50");
        assert_eq!(en.format(-12.0), "-€12.00");
        assert_eq!(en.format(999.999), "€1,000.00");
    }

    #[test]
    fn plain_policy_uses_ascii_spaces() {
        let plain = CurrencyFormat::french().plain();
        assert_eq!(plain.format(98765.4), "98 765,40 €");
    }

    #[test]
    fn percentages_and_compact_rates() {
        assert_eq!(format_percentage(20.0), "20,00 %");
        assert_eq!(CurrencyFormat::english().percentage(5.5), "5.50 %");

        let fr = CurrencyFormat::french();
        assert_eq!(fr.compact(20.0), "20");
        assert_eq!(fr.compact(5.5), "5,5");
        assert_eq!(fr.compact(2.10), "2,1");
        assert_eq!(fr.compact(100.0), "100");
    }

    #[test]
    fn long_dates() {
        let d = NaiveDate::from_ymd_opt(2026, 8, 1).unwrap();
        assert_eq!(format_date_long(d, Locale::FrFr), "1 août 2026");
        assert_eq!(format_date_long(d, Locale::EnUs), "August 1, 2026");
    }

    #[test]
    fn locale_parsing() {
        assert_eq!("fr_FR".parse::<Locale>(), Ok(Locale::FrFr));
        assert_eq!("en-us".parse::<Locale>(), Ok(Locale::EnUs));
        assert!("de-DE".parse::<Locale>().is_err());
    }
}

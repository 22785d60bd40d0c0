//! Money and VAT arithmetic.
//!
//! Every function here is pure: same lines in, same totals out. Amounts are
//! rounded half away from zero to the cent at each named boundary, and
//! unusable numbers never raise an error: a missing or non-numeric quantity
//! or price counts as 0, except a choice quantity which counts as 1.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::model::{Choice, LineItem, LineKind, Priced};

/// Rounds to the cent, half away from zero.
pub fn round2(value: f64) -> f64 {
    let rounded = (value * 100.0).round() / 100.0;
    if rounded == 0.0 { 0.0 } else { rounded }
}

fn finite_or(value: Option<f64>, fallback: f64) -> f64 {
    match value {
        Some(v) if v.is_finite() => v,
        _ => fallback,
    }
}

fn priced_total(p: &Priced) -> f64 {
    finite_or(p.quantity, 0.0) * finite_or(p.unit_price, 0.0)
}

/// Pre-tax total of one line, rounded once on the final sum.
pub fn line_total_ht(line: &LineItem) -> f64 {
    let raw = match &line.kind {
        LineKind::Normal(p) | LineKind::Table(p) => priced_total(p),
        LineKind::Choice(choices) => choices
            .iter()
            .map(|c| finite_or(c.quantity, 1.0) * finite_or(c.unit_price, 0.0))
            .sum(),
        LineKind::Personnel(roles) => roles.values().map(priced_total).sum(),
    };
    round2(raw)
}

/// Sum of choice quantities, for display only.
pub fn line_total_quantity(choices: &[Choice]) -> f64 {
    choices.iter().map(|c| finite_or(c.quantity, 0.0)).sum()
}

pub fn vat_amount(total_ht: f64, vat_rate: f64) -> f64 {
    round2(total_ht * (finite_or(Some(vat_rate), 0.0) / 100.0))
}

pub fn line_total_ttc(total_ht: f64, vat_rate: f64) -> f64 {
    round2(total_ht + vat_amount(total_ht, vat_rate))
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineAmounts {
    pub ht: f64,
    pub vat: f64,
    pub ttc: f64,
}

pub fn line_amounts(line: &LineItem) -> LineAmounts {
    let ht = line_total_ht(line);
    LineAmounts {
        ht,
        vat: vat_amount(ht, line.vat_rate),
        ttc: line_total_ttc(ht, line.vat_rate),
    }
}

/// A VAT rate used as a map key. Two rates are the same bucket only when
/// their values are identical; `5.5` and `5.50000001` stay apart.
#[derive(Debug, Clone, Copy)]
pub struct VatRate(pub f64);

impl PartialEq for VatRate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for VatRate {}

impl PartialOrd for VatRate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for VatRate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct VatBucket {
    pub ht: f64,
    pub vat: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Totals {
    pub total_ht: f64,
    pub total_vat: f64,
    pub total_ttc: f64,
    pub vat_breakdown: BTreeMap<VatRate, VatBucket>,
}

impl Totals {
    /// Breakdown buckets, highest rate first.
    pub fn breakdown_descending(&self) -> impl Iterator<Item = (f64, &VatBucket)> {
        self.vat_breakdown.iter().rev().map(|(rate, bucket)| (rate.0, bucket))
    }

    pub fn bucket(&self, rate: f64) -> Option<&VatBucket> {
        self.vat_breakdown.get(&VatRate(rate))
    }
}

/// Sums each line's independently rounded amounts, bucketing by the line's
/// own rate. Zero-rate lines count towards the totals but get no bucket.
pub fn aggregate(lines: &[LineItem]) -> Totals {
    let mut totals = Totals::default();

    for line in lines {
        let amounts = line_amounts(line);
        totals.total_ht += amounts.ht;
        totals.total_vat += amounts.vat;
        totals.total_ttc += amounts.ttc;

        if line.vat_rate > 0.0 {
            let bucket = totals.vat_breakdown.entry(VatRate(line.vat_rate)).or_default();
            bucket.ht += amounts.ht;
            bucket.vat += amounts.vat;
        }
    }

    for bucket in totals.vat_breakdown.values_mut() {
        bucket.ht = round2(bucket.ht);
        bucket.vat = round2(bucket.vat);
    }
    totals.total_ht = round2(totals.total_ht);
    totals.total_vat = round2(totals.total_vat);
    totals.total_ttc = round2(totals.total_ttc);
    totals
}

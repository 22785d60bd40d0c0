//! Blocking checks run before any layout work.

use thiserror::Error;

use crate::calc;
use crate::model::{LineItem, LineKind, QuoteDocument};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Veuillez remplir au moins le nom et l'email de l'émetteur.")]
    MissingSender,
    #[error("Veuillez remplir au moins le nom du client.")]
    MissingClient,
    #[error("Veuillez ajouter au moins une ligne de devis avec description, quantité et prix.")]
    NoBillableLine,
}

fn positive(value: Option<f64>) -> bool {
    value.is_some_and(|v| v.is_finite() && v > 0.0)
}

/// A line counts when it is described and actually priced. Normal and table
/// lines need both a positive quantity and price; the other kinds need a
/// positive total.
pub fn is_billable(line: &LineItem) -> bool {
    if line.description.trim().is_empty() {
        return false;
    }
    match &line.kind {
        LineKind::Normal(p) | LineKind::Table(p) => positive(p.quantity) && positive(p.unit_price),
        LineKind::Choice(_) | LineKind::Personnel(_) => calc::line_total_ht(line) > 0.0,
    }
}

pub fn validate(doc: &QuoteDocument) -> Result<(), ValidationError> {
    if doc.sender.name.trim().is_empty() || doc.sender.email.trim().is_empty() {
        return Err(ValidationError::MissingSender);
    }
    if doc.client.name.trim().is_empty() {
        return Err(ValidationError::MissingClient);
    }
    if !doc.lines.iter().any(is_billable) {
        return Err(ValidationError::NoBillableLine);
    }
    Ok(())
}

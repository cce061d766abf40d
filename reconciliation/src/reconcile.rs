//! Matching by reference

use crate::metrics::RECONCILED_ITEMS_TOTAL;
use crate::types::*;
use crate::{Error, Result, AMOUNT_OR_CURRENCY_MISMATCH, MISSING_IN_LEDGER};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};
use validator::Validate;

fn validate_all(side: &'static str, entries: &[ReconciliationEntry]) -> Result<()> {
    for (index, entry) in entries.iter().enumerate() {
        entry.validate().map_err(|e| Error::InvalidEntry {
            side,
            index,
            message: e.to_string(),
        })?;
    }
    Ok(())
}

/// Reconcile `statement` lines against `ledger` records.
///
/// When the ledger holds several records with one reference, the last one
/// is used.
pub fn reconcile(
    statement: &[ReconciliationEntry],
    ledger: &[ReconciliationEntry],
) -> Result<ReconciliationReport> {
    validate_all("statement", statement)?;
    validate_all("ledger", ledger)?;

    let by_reference: HashMap<&str, &ReconciliationEntry> =
        ledger.iter().map(|e| (e.reference.as_str(), e)).collect();
    let mut referenced: HashSet<&str> = HashSet::new();

    let mut summary = ReconciliationSummary {
        total: statement.len(),
        ..Default::default()
    };

    let items: Vec<ReconciliationItem> = statement
        .iter()
        .map(|line| {
            let record = by_reference.get(line.reference.as_str()).copied();
            if record.is_some() {
                referenced.insert(line.reference.as_str());
            }

            let reason = match record {
                None => Some(MISSING_IN_LEDGER),
                Some(record) if !line.agrees_with(record) => Some(AMOUNT_OR_CURRENCY_MISMATCH),
                Some(_) => None,
            };

            let status = if reason.is_none() {
                summary.matched += 1;
                MatchStatus::Matched
            } else {
                summary.mismatched += 1;
                debug!("{} mismatched: {}", line.reference, reason.unwrap_or_default());
                MatchStatus::Mismatched
            };

            ReconciliationItem {
                reference: line.reference.clone(),
                status,
                reason: reason.map(str::to_string),
                statement: line.clone(),
                ledger: record.cloned(),
            }
        })
        .collect();

    let unmatched_ledger: Vec<ReconciliationEntry> = ledger
        .iter()
        .filter(|e| !referenced.contains(e.reference.as_str()))
        .cloned()
        .collect();

    RECONCILED_ITEMS_TOTAL
        .with_label_values(&["matched"])
        .inc_by(summary.matched as u64);
    RECONCILED_ITEMS_TOTAL
        .with_label_values(&["mismatched"])
        .inc_by(summary.mismatched as u64);

    info!(
        "Reconciled {} statement lines: {} matched, {} mismatched, {} ledger records unreferenced",
        summary.total,
        summary.matched,
        summary.mismatched,
        unmatched_ledger.len()
    );

    Ok(ReconciliationReport {
        items,
        summary,
        unmatched_ledger,
    })
}

use crate::domain::loan::LoanSummary;
use crate::error::Result;
use serde::Serialize;
use std::io::Write;

/// One loan keyed by its script reference (`email#n`).
#[derive(Debug, Serialize)]
pub struct LoanRow {
    pub loan: String,
    pub name: String,
    pub status: String,
    pub amount: String,
    pub months: u32,
    pub rate: String,
    pub emi: String,
    pub total: String,
    pub remaining: u32,
}

impl LoanRow {
    pub fn new(reference: String, summary: &LoanSummary) -> Self {
        Self {
            loan: reference,
            name: summary.name.clone(),
            status: summary.status.to_string(),
            amount: format!("{:.2}", summary.amount),
            months: summary.duration_months,
            rate: summary
                .interest_rate
                .map(|rate| rate.normalize().to_string())
                .unwrap_or_default(),
            emi: format!("{:.2}", summary.emi_amount),
            total: format!("{:.2}", summary.total_amount),
            remaining: summary.remaining_months,
        }
    }
}

pub struct LoanWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> LoanWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_loans(&mut self, rows: &[LoanRow]) -> Result<()> {
        if rows.is_empty() {
            self.writer.write_record([
                "loan", "name", "status", "amount", "months", "rate", "emi", "total", "remaining",
            ])?;
        }
        for row in rows {
            self.writer.serialize(row)?;
        }
        self.writer.flush()?;
        Ok(())
    }
}

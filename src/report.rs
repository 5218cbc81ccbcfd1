// src/report.rs
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};

use crate::domain::alert::AlertRule;
use crate::domain::price::PriceHistory;
use crate::shared::errors::AppError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportPoint {
    pub timestamp: String, // ISO-8601, UTC
    pub price: f64,
    pub confidence: f64,
}

/// Tracked history and alert rules, as written by `track --export`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportDocument {
    // Symbol -> points in arrival order
    #[serde(flatten)]
    pub series: BTreeMap<String, Vec<ExportPoint>>,

    #[serde(rename = "_alerts")]
    pub alerts: Vec<AlertRule>,
}

impl ExportDocument {
    pub fn new(history: &PriceHistory, alerts: &[AlertRule]) -> Self {
        let series = history
            .iter()
            .map(|(symbol, points)| {
                let points = points
                    .iter()
                    .map(|quote| ExportPoint {
                        timestamp: quote.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
                        price: quote.price_f64(),
                        confidence: quote.confidence_f64(),
                    })
                    .collect();
                (symbol.to_string(), points)
            })
            .collect();

        Self {
            series,
            alerts: alerts.to_vec(),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn write_to(&self, path: &Path) -> Result<(), AppError> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

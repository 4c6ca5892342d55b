use regex::Regex;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use std::str::FromStr;

use crate::utils::error::{AppError, Result};

/// Parses marketplace price labels such as `1 234,56 zł`, `1.234,56 PLN` or `€12.50`.
#[derive(Debug, Clone)]
pub struct PriceParser {
    number: Regex,
}

impl PriceParser {
    pub fn new() -> Result<Self> {
        let number = Regex::new(r"\d[\d\s\u{a0}.,]*").map_err(|e| AppError::Internal(e.to_string()))?;
        Ok(Self { number })
    }

    pub fn parse(&self, text: &str) -> Option<Decimal> {
        let raw = self.number.find(text)?.as_str();
        let compact: String = raw
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '\u{a0}')
            .collect();
        let compact = compact.trim_end_matches(['.', ',']);

        let normalized = match (compact.rfind(','), compact.rfind('.')) {
            // Whichever separator comes last is the decimal one.
            (Some(comma), Some(dot)) if comma > dot => compact.replace('.', "").replace(',', "."),
            (Some(_), Some(_)) => compact.replace(',', ""),
            (Some(comma), None) => {
                if is_thousands_group(compact, comma) && compact.matches(',').count() > 1 {
                    compact.replace(',', "")
                } else {
                    compact.replace(',', ".")
                }
            }
            (None, Some(dot)) => {
                if compact.matches('.').count() > 1 || is_thousands_group(compact, dot) {
                    compact.replace('.', "")
                } else {
                    compact.to_string()
                }
            }
            (None, None) => compact.to_string(),
        };

        Decimal::from_str(&normalized).ok()
    }

    /// Positive prices only; labels like "Za darmo" or "0 zł" yield `None`.
    pub fn parse_positive(&self, text: &str) -> Option<f64> {
        self.parse(text)
            .filter(|d| d.is_sign_positive() && !d.is_zero())
            .and_then(|d| d.to_f64())
    }
}

fn is_thousands_group(number: &str, separator_at: usize) -> bool {
    let tail = &number[separator_at + 1..];
    tail.len() == 3 && tail.chars().all(|c| c.is_ascii_digit())
}

pub fn detect_currency(text: &str) -> Option<&'static str> {
    let lower = text.to_lowercase();
    if lower.contains("zł") || lower.contains("pln") {
        Some("PLN")
    } else if lower.contains('€') || lower.contains("eur") {
        Some("EUR")
    } else if lower.contains('$') || lower.contains("usd") {
        Some("USD")
    } else {
        None
    }
}

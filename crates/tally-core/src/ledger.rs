//! Double-entry validation
//!
//! Checks a candidate journal entry before it is committed. All problems are
//! reported together so a form can show them at once; the candidate is never
//! modified.

use serde::{Serialize, Serializer};

use crate::import::parse_date;
use crate::models::{JournalEntryCandidate, JournalLineCandidate};

/// Debits and credits closer than this are considered equal
pub const BALANCE_EPSILON: f64 = 0.01;

/// Minimum number of counting lines in an entry
pub const MIN_LINES: usize = 2;

/// A rule a journal entry candidate breaks
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    MissingDescription,
    MissingEntryDate,
    InvalidEntryDate(String),
    TooFewLines { found: usize },
    /// Zero-based index into the candidate's `lines`
    LineHasDebitAndCredit { line: usize },
    NegativeAmount { line: usize },
    Unbalanced { debits: f64, credits: f64 },
}

impl ValidationError {
    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingDescription => "missing_description",
            Self::MissingEntryDate => "missing_entry_date",
            Self::InvalidEntryDate(_) => "invalid_entry_date",
            Self::TooFewLines { .. } => "too_few_lines",
            Self::LineHasDebitAndCredit { .. } => "line_has_debit_and_credit",
            Self::NegativeAmount { .. } => "negative_amount",
            Self::Unbalanced { .. } => "unbalanced",
        }
    }

    /// Absolute difference for `Unbalanced`, rounded to cents
    pub fn difference(&self) -> Option<f64> {
        match self {
            Self::Unbalanced { debits, credits } => {
                Some(((debits - credits).abs() * 100.0).round() / 100.0)
            }
            _ => None,
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingDescription => write!(f, "Description is required"),
            Self::MissingEntryDate => write!(f, "Entry date is required"),
            Self::InvalidEntryDate(date) => write!(f, "Entry date '{}' is not a valid date", date),
            Self::TooFewLines { found } => write!(
                f,
                "At least {} lines with an account and an amount are required (found {})",
                MIN_LINES, found
            ),
            Self::LineHasDebitAndCredit { line } => write!(
                f,
                "Line {} has both a debit and a credit amount",
                line + 1
            ),
            Self::NegativeAmount { line } => {
                write!(f, "Line {} has a negative amount", line + 1)
            }
            Self::Unbalanced { debits, credits } => write!(
                f,
                "Entry is out of balance by {:.2} (debits {:.2}, credits {:.2})",
                (debits - credits).abs(),
                debits,
                credits
            ),
        }
    }
}

impl Serialize for ValidationError {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;

        let mut state = serializer.serialize_struct("ValidationError", 3)?;
        state.serialize_field("code", self.code())?;
        state.serialize_field("message", &self.to_string())?;
        state.serialize_field("difference", &self.difference())?;
        state.end()
    }
}

/// A line takes part in validation only with an account and a non-zero amount
pub fn is_counting_line(line: &JournalLineCandidate) -> bool {
    line.account_id.is_some() && (line.debit_amount > 0.0 || line.credit_amount > 0.0)
}

/// Validate a candidate entry, returning every rule it breaks
pub fn validate(entry: &JournalEntryCandidate) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if entry.description.trim().is_empty() {
        errors.push(ValidationError::MissingDescription);
    }

    let entry_date = entry.entry_date.trim();
    if entry_date.is_empty() {
        errors.push(ValidationError::MissingEntryDate);
    } else if parse_date(entry_date).is_err() {
        errors.push(ValidationError::InvalidEntryDate(entry_date.to_string()));
    }

    for (i, line) in entry.lines.iter().enumerate() {
        if line.debit_amount < 0.0 || line.credit_amount < 0.0 {
            errors.push(ValidationError::NegativeAmount { line: i });
        }
    }

    let counting: Vec<(usize, &JournalLineCandidate)> = entry
        .lines
        .iter()
        .enumerate()
        .filter(|(_, line)| is_counting_line(line))
        .collect();

    if counting.len() < MIN_LINES {
        errors.push(ValidationError::TooFewLines {
            found: counting.len(),
        });
    }

    for (i, line) in &counting {
        if line.debit_amount > 0.0 && line.credit_amount > 0.0 {
            errors.push(ValidationError::LineHasDebitAndCredit { line: *i });
        }
    }

    let (debits, credits) = totals(counting.iter().map(|(_, line)| *line));
    if (debits - credits).abs() >= BALANCE_EPSILON {
        errors.push(ValidationError::Unbalanced { debits, credits });
    }

    errors
}

/// True when the entry passes every rule
pub fn is_balanced(entry: &JournalEntryCandidate) -> bool {
    validate(entry).is_empty()
}

/// Sum of positive debit and credit amounts
pub fn totals<'a>(lines: impl Iterator<Item = &'a JournalLineCandidate>) -> (f64, f64) {
    lines.fold((0.0, 0.0), |(d, c), line| {
        (d + line.debit_amount.max(0.0), c + line.credit_amount.max(0.0))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(lines: Vec<JournalLineCandidate>) -> JournalEntryCandidate {
        JournalEntryCandidate {
            description: "Monthly rent".to_string(),
            entry_date: "2024-03-01".to_string(),
            reference_number: None,
            lines,
        }
    }

    #[test]
    fn test_balanced_entry_passes() {
        let e = entry(vec![
            JournalLineCandidate::debit(1, 100.0),
            JournalLineCandidate::credit(2, 100.0),
        ]);
        assert!(validate(&e).is_empty());
        assert!(is_balanced(&e));
    }

    #[test]
    fn test_unbalanced_reports_difference() {
        let e = entry(vec![
            JournalLineCandidate::debit(1, 100.0),
            JournalLineCandidate::credit(2, 90.0),
        ]);
        let errors = validate(&e);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code(), "unbalanced");
        assert_eq!(errors[0].difference(), Some(10.0));
        assert!(errors[0].to_string().contains("10.00"));
    }

    #[test]
    fn test_sub_cent_difference_is_balanced() {
        let e = entry(vec![
            JournalLineCandidate::debit(1, 0.1 + 0.2),
            JournalLineCandidate::credit(2, 0.3),
        ]);
        assert!(is_balanced(&e));
    }

    #[test]
    fn test_reports_all_problems() {
        let e = JournalEntryCandidate {
            description: "  ".to_string(),
            entry_date: String::new(),
            reference_number: None,
            lines: vec![JournalLineCandidate::debit(1, 50.0)],
        };
        let codes: Vec<&str> = validate(&e).iter().map(|e| e.code()).collect();
        assert!(codes.contains(&"missing_description"));
        assert!(codes.contains(&"missing_entry_date"));
        assert!(codes.contains(&"too_few_lines"));
        assert!(codes.contains(&"unbalanced"));
    }

    #[test]
    fn test_non_counting_lines_are_ignored() {
        let e = entry(vec![
            JournalLineCandidate::debit(1, 100.0),
            JournalLineCandidate::credit(2, 100.0),
            // No account
            JournalLineCandidate {
                account_id: None,
                debit_amount: 999.0,
                ..Default::default()
            },
            // No amount
            JournalLineCandidate::debit(3, 0.0),
        ]);
        assert!(validate(&e).is_empty());
    }

    #[test]
    fn test_line_with_debit_and_credit() {
        let e = entry(vec![
            JournalLineCandidate {
                account_id: Some(1),
                debit_amount: 100.0,
                credit_amount: 100.0,
                ..Default::default()
            },
            JournalLineCandidate::debit(2, 50.0),
            JournalLineCandidate::credit(3, 50.0),
        ]);
        let errors = validate(&e);
        assert_eq!(
            errors,
            vec![ValidationError::LineHasDebitAndCredit { line: 0 }]
        );
    }

    #[test]
    fn test_invalid_date_and_negative_amount() {
        let mut e = entry(vec![
            JournalLineCandidate::debit(1, -5.0),
            JournalLineCandidate::credit(2, 10.0),
            JournalLineCandidate::debit(3, 10.0),
        ]);
        e.entry_date = "31st of never".to_string();
        let codes: Vec<&str> = validate(&e).iter().map(|e| e.code()).collect();
        assert_eq!(codes, vec!["invalid_entry_date", "negative_amount"]);
    }

    #[test]
    fn test_validation_does_not_mutate() {
        let e = entry(vec![JournalLineCandidate::debit(1, 100.0)]);
        let before = e.clone();
        let _ = validate(&e);
        assert_eq!(e, before);
    }

    #[test]
    fn test_serializes_code_and_message() {
        let json = serde_json::to_value(ValidationError::Unbalanced {
            debits: 100.0,
            credits: 90.0,
        })
        .unwrap();
        assert_eq!(json["code"], "unbalanced");
        assert_eq!(json["difference"], 10.0);
        assert!(json["message"].as_str().unwrap().contains("10.00"));
    }
}

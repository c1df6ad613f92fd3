use serde::Deserialize;
use serde_json::{json, Value};

/// Raw intake payload. Everything is optional at the serde level so that a
/// missing field produces a validation message instead of a parse error.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubmissionPayload {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub honeypot: Option<String>,

    pub company_name: Option<String>,
    pub contact_person: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company_website: Option<String>,

    // Problem-statement fields
    pub domain: Option<String>,
    pub problem_title: Option<String>,
    pub problem_description: Option<String>,
    pub targeted_audience: Option<String>,
    pub expected_outcome: Option<String>,
    pub resources_provided: Option<String>,
    pub source_of_info: Option<String>,
    pub source_of_info_detail: Option<String>,

    // Sponsorship fields
    pub sponsorship_type: Option<String>,
    pub sponsorship_amount: Option<String>,
    pub additional_notes: Option<String>,

    pub transaction_id: Option<String>,
    pub payment_proof_base64: Option<String>,
    pub payment_proof_filename: Option<String>,
    pub payment_proof_type: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionKind {
    ProblemStatement,
    Sponsorship,
}

impl SubmissionKind {
    /// Anything other than an explicit "sponsorship" tag is a problem statement.
    pub fn from_payload(payload: &SubmissionPayload) -> Self {
        match payload.kind.as_deref() {
            Some("sponsorship") => SubmissionKind::Sponsorship,
            _ => SubmissionKind::ProblemStatement,
        }
    }

    pub fn table(&self) -> &'static str {
        match self {
            SubmissionKind::ProblemStatement => "problem_statements",
            SubmissionKind::Sponsorship => "sponsorships",
        }
    }

    pub fn sheet_range(&self) -> &'static str {
        match self {
            SubmissionKind::ProblemStatement => "Problem Statements!A:M",
            SubmissionKind::Sponsorship => "Sponsorships!A:J",
        }
    }

    pub fn success_message(&self) -> &'static str {
        match self {
            SubmissionKind::ProblemStatement => "Problem statement submitted successfully",
            SubmissionKind::Sponsorship => "Sponsorship inquiry submitted successfully",
        }
    }
}

fn required(field: &Option<String>) -> String {
    field.as_deref().unwrap_or_default().trim().to_string()
}

fn optional(field: &Option<String>) -> Option<String> {
    field
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Row for the `problem_statements` table. `proof_name` is the storage object
/// name, never a public URL (the bucket is private).
pub fn problem_row(p: &SubmissionPayload, proof_name: Option<&str>) -> Value {
    json!({
        "company_name": required(&p.company_name),
        "contact_person": required(&p.contact_person),
        "email": required(&p.email),
        "phone": required(&p.phone),
        "company_website": optional(&p.company_website),
        "problem_title": required(&p.problem_title),
        "problem_description": required(&p.problem_description),
        "domain": required(&p.domain),
        "targeted_audience": required(&p.targeted_audience),
        "expected_outcome": required(&p.expected_outcome),
        "resources_provided": optional(&p.resources_provided),
        "source_of_info": optional(&p.source_of_info),
        "source_of_info_detail": optional(&p.source_of_info_detail),
        "transaction_id": optional(&p.transaction_id),
        "payment_proof_url": proof_name,
        "status": "pending",
    })
}

/// Row for the `sponsorships` table.
pub fn sponsorship_row(p: &SubmissionPayload, proof_name: Option<&str>) -> Value {
    json!({
        "company_name": required(&p.company_name),
        "contact_person": required(&p.contact_person),
        "email": required(&p.email),
        "phone": required(&p.phone),
        "company_website": optional(&p.company_website),
        "sponsorship_type": required(&p.sponsorship_type),
        "sponsorship_amount": optional(&p.sponsorship_amount),
        "additional_notes": optional(&p.additional_notes),
        "transaction_id": optional(&p.transaction_id),
        "payment_proof_url": proof_name,
        "status": "pending",
    })
}

pub fn record_row(kind: SubmissionKind, p: &SubmissionPayload, proof_name: Option<&str>) -> Value {
    match kind {
        SubmissionKind::ProblemStatement => problem_row(p, proof_name),
        SubmissionKind::Sponsorship => sponsorship_row(p, proof_name),
    }
}

/// Spreadsheet column layout, fixed per variant. Missing optionals become
/// empty strings, never a null marker.
pub fn sheet_row(kind: SubmissionKind, p: &SubmissionPayload, timestamp: &str) -> Vec<String> {
    let opt = |f: &Option<String>| optional(f).unwrap_or_default();
    match kind {
        SubmissionKind::ProblemStatement => vec![
            timestamp.to_string(),
            required(&p.company_name),
            required(&p.contact_person),
            required(&p.email),
            required(&p.phone),
            opt(&p.company_website),
            required(&p.problem_title),
            required(&p.problem_description),
            required(&p.domain),
            required(&p.targeted_audience),
            required(&p.expected_outcome),
            opt(&p.resources_provided),
            "pending".to_string(),
        ],
        SubmissionKind::Sponsorship => vec![
            timestamp.to_string(),
            required(&p.company_name),
            required(&p.contact_person),
            required(&p.email),
            required(&p.phone),
            opt(&p.company_website),
            required(&p.sponsorship_type),
            opt(&p.sponsorship_amount),
            opt(&p.additional_notes),
            "pending".to_string(),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sponsorship_tag_selects_variant() {
        let p = SubmissionPayload {
            kind: Some("sponsorship".to_string()),
            ..Default::default()
        };
        assert_eq!(SubmissionKind::from_payload(&p), SubmissionKind::Sponsorship);
    }

    #[test]
    fn missing_or_unknown_tag_is_problem_statement() {
        let p = SubmissionPayload::default();
        assert_eq!(
            SubmissionKind::from_payload(&p),
            SubmissionKind::ProblemStatement
        );
        let p = SubmissionPayload {
            kind: Some("something-else".to_string()),
            ..Default::default()
        };
        assert_eq!(
            SubmissionKind::from_payload(&p),
            SubmissionKind::ProblemStatement
        );
    }

    #[test]
    fn row_renders_missing_optionals_as_null_and_status_pending() {
        let p = SubmissionPayload {
            company_name: Some("Acme".to_string()),
            ..Default::default()
        };
        let row = problem_row(&p, None);
        assert_eq!(row["status"], "pending");
        assert!(row["company_website"].is_null());
        assert!(row["payment_proof_url"].is_null());
        assert_eq!(row["company_name"], "Acme");
    }

    #[test]
    fn sheet_row_uses_empty_string_for_missing_optionals() {
        let p = SubmissionPayload {
            kind: Some("sponsorship".to_string()),
            company_name: Some("Acme".to_string()),
            sponsorship_type: Some("Gold".to_string()),
            ..Default::default()
        };
        let row = sheet_row(SubmissionKind::Sponsorship, &p, "2026-01-01T00:00:00Z");
        assert_eq!(row.len(), 10);
        assert_eq!(row[6], "Gold");
        assert_eq!(row[7], "");
        assert_eq!(row[9], "pending");
    }
}

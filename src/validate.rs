use crate::models::{SubmissionKind, SubmissionPayload};

/// Bots fill hidden fields; a non-blank honeypot means the whole request is
/// automated and must be answered with a fake success upstream.
pub fn is_honeypot(payload: &SubmissionPayload) -> bool {
    payload
        .honeypot
        .as_deref()
        .map(|s| !s.trim().is_empty())
        .unwrap_or(false)
}

/// Fail-fast field validation. Returns the first violated constraint as the
/// client-visible error message; all length checks are on trimmed input.
pub fn validate(payload: &SubmissionPayload, kind: SubmissionKind) -> Result<(), String> {
    check_required(&payload.company_name, 2, 100, "Company name must be 2-100 characters")?;
    check_required(&payload.contact_person, 2, 100, "Contact name must be 2-100 characters")?;
    check_email(&payload.email)?;
    check_required(&payload.phone, 10, 15, "Phone number must be 10-15 characters")?;
    check_optional(&payload.company_website, 255, "Company website URL too long")?;

    match kind {
        SubmissionKind::ProblemStatement => {
            check_required(&payload.domain, 1, usize::MAX, "Domain is required")?;
            check_required(&payload.problem_title, 5, 200, "Problem title must be 5-200 characters")?;
            check_required(
                &payload.problem_description,
                50,
                2000,
                "Problem description must be 50-2000 characters",
            )?;
            check_required(
                &payload.targeted_audience,
                10,
                500,
                "Targeted audience must be 10-500 characters",
            )?;
            check_required(
                &payload.expected_outcome,
                20,
                1000,
                "Expected outcome must be 20-1000 characters",
            )?;
            check_optional(&payload.resources_provided, 1000, "Resources description too long")?;
            check_optional(&payload.source_of_info, 255, "Source of info too long")?;
            check_optional(&payload.source_of_info_detail, 500, "Source of info detail too long")?;
        }
        SubmissionKind::Sponsorship => {
            check_required(&payload.sponsorship_type, 1, usize::MAX, "Sponsorship type is required")?;
            check_optional(&payload.sponsorship_amount, 100, "Sponsorship amount too long")?;
            check_optional(&payload.additional_notes, 1000, "Additional notes too long")?;
        }
    }

    Ok(())
}

fn check_required(field: &Option<String>, min: usize, max: usize, message: &str) -> Result<(), String> {
    let len = field.as_deref().unwrap_or_default().trim().chars().count();
    if len < min || len > max {
        return Err(message.to_string());
    }
    Ok(())
}

fn check_optional(field: &Option<String>, max: usize, message: &str) -> Result<(), String> {
    if let Some(value) = field.as_deref() {
        if value.trim().chars().count() > max {
            return Err(message.to_string());
        }
    }
    Ok(())
}

fn check_email(field: &Option<String>) -> Result<(), String> {
    let email = field.as_deref().unwrap_or_default().trim();
    if email.is_empty() || email.chars().count() > 255 || !has_email_shape(email) {
        return Err("Invalid email address".to_string());
    }
    Ok(())
}

/// `local@domain.tld` with no whitespace and exactly one `@`, the same shape
/// the client-side check enforces.
fn has_email_shape(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    match domain.rsplit_once('.') {
        Some((host, tld)) => !host.is_empty() && !tld.is_empty(),
        None => false,
    }
}

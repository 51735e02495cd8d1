use crate::errors::{ApiError, ApiResult};

pub const MAX_NAME_LEN: usize = 100;
pub const MAX_EMAIL_LEN: usize = 100;
pub const MIN_PASSWORD_LEN: usize = 8;
pub const MAX_TITLE_LEN: usize = 255;
pub const MAX_URL_LEN: usize = 2083;

/// Returns the trimmed value of a required text field.
pub fn required<'a>(field: &str, value: Option<&'a str>) -> ApiResult<&'a str> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ApiError::bad_request(format!("Field '{}' is required", field))),
    }
}

pub fn max_len<'a>(field: &str, value: &'a str, max: usize) -> ApiResult<&'a str> {
    if value.chars().count() > max {
        return Err(ApiError::bad_request(format!(
            "Field '{}' must be at most {} characters",
            field, max
        )));
    }
    Ok(value)
}

/// User names appear in URLs, so they are restricted to a path-safe set.
pub fn validate_name(value: Option<&str>) -> ApiResult<&str> {
    let name = max_len("name", required("name", value)?, MAX_NAME_LEN)?;
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
        return Err(ApiError::bad_request(
            "Field 'name' can only contain letters, numbers, underscores, and hyphens",
        ));
    }
    Ok(name)
}

pub fn validate_email<'a>(field: &str, value: Option<&'a str>) -> ApiResult<&'a str> {
    let email = max_len(field, required(field, value)?, MAX_EMAIL_LEN)?;
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() && !domain.contains('@') => Ok(email),
        _ => Err(ApiError::bad_request(format!("Field '{}' must be a valid email address", field))),
    }
}

/// Passwords are not trimmed; surrounding spaces are part of the secret.
pub fn validate_password<'a>(field: &str, value: Option<&'a str>) -> ApiResult<&'a str> {
    match value {
        Some(p) if p.chars().count() >= MIN_PASSWORD_LEN => Ok(p),
        Some(_) => Err(ApiError::bad_request(format!(
            "Field '{}' must be at least {} characters",
            field, MIN_PASSWORD_LEN
        ))),
        None => Err(ApiError::bad_request(format!("Field '{}' is required", field))),
    }
}

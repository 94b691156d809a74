//! Post-login return target validation.

use crate::error::FlowError;
use url::Url;

/// Check a caller-supplied `return` value against the allow-list.
///
/// `None` and the empty string mean "no return target". Anything else must be
/// an absolute URL whose scheme, host and port match one allow-listed origin.
/// Paths and queries are free.
pub fn validate_return_target(
    raw: Option<&str>,
    allowed: &[Url],
) -> Result<Option<Url>, FlowError> {
    let raw = match raw {
        None => return Ok(None),
        Some("") => return Ok(None),
        Some(r) => r,
    };

    let target = Url::parse(raw)
        .map_err(|_| FlowError::bad_request(format!("return target must be an absolute URL: {raw}")))?;
    if target.host_str().is_none() {
        return Err(FlowError::bad_request(format!(
            "return target has no host: {raw}"
        )));
    }

    if allowed.iter().any(|origin| same_origin(origin, &target)) {
        Ok(Some(target))
    } else {
        Err(FlowError::bad_request(format!(
            "return target is not allowed: {raw}"
        )))
    }
}

fn same_origin(a: &Url, b: &Url) -> bool {
    a.scheme() == b.scheme()
        && a.host_str().map(str::to_ascii_lowercase) == b.host_str().map(str::to_ascii_lowercase)
        && a.port_or_known_default() == b.port_or_known_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn allow_list() -> Vec<Url> {
        vec![
            Url::parse("https://app.example.com").unwrap(),
            Url::parse("http://localhost:3000").unwrap(),
        ]
    }

    #[test]
    fn absent_or_empty_means_no_target() {
        assert_eq!(validate_return_target(None, &allow_list()).unwrap(), None);
        assert_eq!(validate_return_target(Some(""), &allow_list()).unwrap(), None);
    }

    #[test]
    fn accepts_allowed_origin_with_any_path() {
        let target = validate_return_target(
            Some("https://app.example.com/dashboard?tab=1"),
            &allow_list(),
        )
        .unwrap()
        .unwrap();
        assert_eq!(target.path(), "/dashboard");
    }

    #[test]
    fn explicit_default_port_matches() {
        assert!(validate_return_target(Some("https://app.example.com:443/"), &allow_list()).is_ok());
    }

    #[test]
    fn rejects_foreign_host() {
        let err = validate_return_target(Some("https://evil.example/x"), &allow_list()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadRequest);
    }

    #[test]
    fn rejects_scheme_mismatch() {
        assert!(validate_return_target(Some("http://app.example.com/"), &allow_list()).is_err());
    }

    #[test]
    fn rejects_port_mismatch() {
        assert!(validate_return_target(Some("http://localhost:4000/"), &allow_list()).is_err());
        assert!(validate_return_target(Some("http://localhost:3000/cb"), &allow_list()).is_ok());
    }

    #[test]
    fn rejects_relative_and_hostless_targets() {
        assert!(validate_return_target(Some("/dashboard"), &allow_list()).is_err());
        assert!(validate_return_target(Some("//evil.example/x"), &allow_list()).is_err());
        assert!(validate_return_target(Some("mailto:a@app.example.com"), &allow_list()).is_err());
    }

    #[test]
    fn blank_target_is_rejected_not_dropped() {
        let err = validate_return_target(Some("   "), &allow_list()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadRequest);
    }

    #[test]
    fn rejects_suffix_lookalikes() {
        assert!(validate_return_target(Some("https://app.example.com.evil.example/"), &allow_list()).is_err());
        assert!(validate_return_target(Some("https://evilapp.example.com/"), &allow_list()).is_err());
    }

    #[test]
    fn empty_allow_list_rejects_everything() {
        assert!(validate_return_target(Some("https://app.example.com/"), &[]).is_err());
    }
}

use tower::BoxError;

pub(crate) fn parse_bool_value(val: &str) -> Result<bool, BoxError> {
    match val.to_lowercase().as_str() {
        "0" | "false" => Ok(false),
        "1" | "true" => Ok(true),
        _ => Err(format!("Unable to parse bool value: {}", val).into()),
    }
}

/// Parses a Python module name for the handler namespace.
pub(crate) fn parse_namespace(val: &str) -> Result<String, BoxError> {
    let mut parts = val.split('.');
    let valid = parts.all(|part| {
        let mut chars = part.chars();
        match chars.next() {
            Some(c) if c == '_' || c.is_ascii_alphabetic() => {
                chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
            }
            _ => false,
        }
    });
    if !valid {
        return Err(format!("invalid namespace name: {}", val).into());
    }
    Ok(val.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bool_values() {
        assert!(parse_bool_value("TRUE").unwrap());
        assert!(parse_bool_value("1").unwrap());
        assert!(!parse_bool_value("false").unwrap());
        assert!(!parse_bool_value("0").unwrap());
        assert!(parse_bool_value("yes").is_err());
    }

    #[test]
    fn namespace_names() {
        assert_eq!(parse_namespace("access_handler").unwrap(), "access_handler");
        assert_eq!(parse_namespace("site.rules_2").unwrap(), "site.rules_2");
        assert!(parse_namespace("").is_err());
        assert!(parse_namespace("2fast").is_err());
        assert!(parse_namespace("with-dash").is_err());
        assert!(parse_namespace("trailing.").is_err());
    }
}

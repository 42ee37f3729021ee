use crate::error::BreezeError;

/// JSON-style quoting for names echoed back in diagnostics.
pub fn quote(text: &str) -> String {
    serde_json::to_string(text).unwrap_or_else(|_| format!("\"{}\"", text))
}

pub fn syntax_error(msg: &str, line: usize) -> BreezeError {
    BreezeError::Syntax { msg: msg.to_string(), line }
}

/// Upper-cases the first character, leaving the rest untouched.
pub fn first_upper(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        None => String::new(),
        Some(first) => first.to_uppercase().to_string() + chars.as_str(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_escapes() {
        assert_eq!(quote("a\"b"), r#""a\"b""#);
    }

    #[test]
    fn test_first_upper() {
        assert_eq!(first_upper("user"), "User");
        assert_eq!(first_upper("uSER"), "USER");
        assert_eq!(first_upper(""), "");
    }
}

//! Built-in backends.

use breeze_schema::Schema;

pub mod json;
pub mod rust;

pub use json::JsonTemplate;
pub use rust::RustTemplate;

/// Option key; when `true`, output lands in a directory tree mirroring the
/// schema package.
pub const WITH_PACKAGE_DIR: &str = "with_package_dir";

/// `a/b/file` for package `a.b` when [`WITH_PACKAGE_DIR`] is set, else `file`.
pub fn with_package_dir(file_name: &str, schema: &Schema) -> String {
    let enabled = schema.options.get(WITH_PACKAGE_DIR).map(|v| v == "true").unwrap_or(false);
    if enabled && !schema.package.is_empty() {
        format!("{}/{}", schema.package.replace('.', "/"), file_name)
    } else {
        file_name.to_string()
    }
}

/// `user_name`, `userName` and `USER_NAME` all become `UserName`. Words
/// written in capitals are lowered after their first letter; other words
/// keep their inner casing.
pub fn to_pascal_case(s: &str) -> String {
    let mut pascal = String::with_capacity(s.len());
    for word in s.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()) {
        let shouting = !word.chars().any(char::is_lowercase);
        for (i, c) in word.chars().enumerate() {
            if i == 0 {
                pascal.extend(c.to_uppercase());
            } else if shouting {
                pascal.extend(c.to_lowercase());
            } else {
                pascal.push(c);
            }
        }
    }
    pascal
}

/// `sessionID` becomes `session_id`, `HTTPServer` becomes `http_server`.
pub fn to_snake_case(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut snake = String::with_capacity(s.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if !c.is_uppercase() {
            snake.push(c);
            continue;
        }
        let prev = if i > 0 { Some(chars[i - 1]) } else { None };
        let next_is_lower = chars.get(i + 1).map_or(false, |n| n.is_lowercase());
        let word_start = match prev {
            None | Some('_') => false,
            Some(p) => !p.is_uppercase() || next_is_lower,
        };
        if word_start {
            snake.push('_');
        }
        snake.extend(c.to_lowercase());
    }
    snake
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_conversions() {
        assert_eq!(to_pascal_case("user_name"), "UserName");
        assert_eq!(to_pascal_case("RED"), "Red");
        assert_eq!(to_pascal_case("userName"), "UserName");
        assert_eq!(to_snake_case("sessionID"), "session_id");
        assert_eq!(to_snake_case("HTTPServer"), "http_server");
        assert_eq!(to_snake_case("name"), "name");
        assert_eq!(to_snake_case("user_Name"), "user_name");
        assert_eq!(to_pascal_case("DARK_BLUE"), "DarkBlue");
        assert_eq!(to_pascal_case("user-v2"), "UserV2");
    }

    #[test]
    fn test_with_package_dir() {
        let mut schema = Schema { package: "a.b".into(), ..Schema::default() };
        assert_eq!(with_package_dir("x.json", &schema), "x.json");
        schema.options.insert(WITH_PACKAGE_DIR.into(), "true".into());
        assert_eq!(with_package_dir("x.json", &schema), "a/b/x.json");
    }
}

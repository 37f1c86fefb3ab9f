pub(crate) fn is_valid_group_name(s: &str) -> bool {
    !s.is_empty()
        && s.as_bytes()[0].is_ascii_uppercase()
        && s.as_bytes()[1..]
            .iter()
            .all(|&ch| ch.is_ascii_alphanumeric() || ch == b'_')
}

pub(crate) fn to_pascal_case(name: &str) -> String {
    let mut result = String::with_capacity(name.len());
    let mut uppercase_next = true;

    for ch in name.chars() {
        if ch == '_' {
            uppercase_next = true
        } else if uppercase_next {
            result.push(ch.to_ascii_uppercase());
            uppercase_next = false;
        } else {
            result.push(ch);
        }
    }

    result
}

pub(crate) fn to_json_name(name: &str) -> String {
    let mut result = String::with_capacity(name.len());
    let mut uppercase_next = false;

    for ch in name.chars() {
        if ch == '_' {
            uppercase_next = true
        } else if uppercase_next {
            result.push(ch.to_ascii_uppercase());
            uppercase_next = false;
        } else {
            result.push(ch);
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pascal_case() {
        assert_eq!(to_pascal_case("foo_bar"), "FooBar");
        assert_eq!(to_pascal_case("foo"), "Foo");
        assert_eq!(to_pascal_case("_foo"), "Foo");
        assert_eq!(to_pascal_case("foo3_bar"), "Foo3Bar");
    }

    #[test]
    fn json_name() {
        assert_eq!(to_json_name("foo_bar"), "fooBar");
        assert_eq!(to_json_name("foo"), "foo");
        assert_eq!(to_json_name("_foo"), "Foo");
        assert_eq!(to_json_name("foo_bar_baz"), "fooBarBaz");
    }

    #[test]
    fn group_name() {
        assert!(is_valid_group_name("Foo"));
        assert!(is_valid_group_name("Foo_bar3"));
        assert!(!is_valid_group_name("foo"));
        assert!(!is_valid_group_name(""));
        assert!(!is_valid_group_name("3Foo"));
    }
}

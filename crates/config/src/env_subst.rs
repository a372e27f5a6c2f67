/// Replace `${ENV_VAR}` placeholders in config string values.
///
/// Unresolvable variables are left as-is.
pub fn substitute_env(input: &str) -> String {
    substitute_env_with(input, |name| std::env::var(name).ok())
}

/// Same as [`substitute_env`] but resolves names through `lookup`.
pub fn substitute_env_with(input: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && chars.peek() == Some(&'{') {
            chars.next(); // consume '{'
            let mut var_name = String::new();
            let mut closed = false;
            for c in chars.by_ref() {
                if c == '}' {
                    closed = true;
                    break;
                }
                var_name.push(c);
            }
            if closed && !var_name.is_empty() {
                match lookup(&var_name) {
                    Some(val) => result.push_str(&val),
                    None => {
                        result.push_str("${");
                        result.push_str(&var_name);
                        result.push('}');
                    },
                }
            } else {
                // Malformed, emit literal.
                result.push_str("${");
                result.push_str(&var_name);
                if closed {
                    result.push('}');
                }
            }
        } else {
            result.push(ch);
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(name: &str) -> Option<String> {
        match name {
            "SNOWGATE_TEST_SECRET" => Some("s3cr3t".into()),
            "SNOWGATE_TEST_DOMAIN" => Some("dev1234.service-now.com".into()),
            _ => None,
        }
    }

    #[test]
    fn substitutes_known_var() {
        assert_eq!(
            substitute_env_with("client_secret = \"${SNOWGATE_TEST_SECRET}\"", lookup),
            "client_secret = \"s3cr3t\""
        );
    }

    #[test]
    fn substitutes_multiple_vars() {
        assert_eq!(
            substitute_env_with("${SNOWGATE_TEST_DOMAIN}/${SNOWGATE_TEST_SECRET}", lookup),
            "dev1234.service-now.com/s3cr3t"
        );
    }

    #[test]
    fn leaves_unknown_var() {
        assert_eq!(
            substitute_env_with("${SNOWGATE_NONEXISTENT_XYZ}", lookup),
            "${SNOWGATE_NONEXISTENT_XYZ}"
        );
    }

    #[test]
    fn leaves_malformed_placeholders() {
        assert_eq!(substitute_env_with("a ${UNCLOSED", lookup), "a ${UNCLOSED");
        assert_eq!(substitute_env_with("${}", lookup), "${}");
    }

    #[test]
    fn no_placeholders() {
        assert_eq!(substitute_env("plain $text"), "plain $text");
    }
}

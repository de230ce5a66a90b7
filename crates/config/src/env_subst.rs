//! `${ENV_VAR}` expansion applied to raw config text before parsing.

/// Replace `${NAME}` with the value of the environment variable `NAME`.
/// Unset variables and malformed placeholders are left as-is.
pub fn expand_env(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            // Unterminated placeholder; keep the tail verbatim.
            out.push_str(&rest[start..]);
            return out;
        };
        let name = &after[..end];
        match std::env::var(name) {
            Ok(val) if !name.is_empty() => out.push_str(&val),
            _ => {
                out.push_str("${");
                out.push_str(name);
                out.push('}');
            },
        }
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    // Mutating the process environment is unsafe in edition 2024; these tests
    // only touch PHONOTEK_-prefixed names.
    #![allow(unsafe_code)]

    use super::*;

    #[test]
    fn expands_set_variable() {
        unsafe { std::env::set_var("PHONOTEK_TEST_KEY", "s3cret") };
        assert_eq!(
            expand_env("service_key = \"${PHONOTEK_TEST_KEY}\""),
            "service_key = \"s3cret\""
        );
        unsafe { std::env::remove_var("PHONOTEK_TEST_KEY") };
    }

    #[test]
    fn keeps_unset_variable() {
        assert_eq!(
            expand_env("${PHONOTEK_DEFINITELY_UNSET}"),
            "${PHONOTEK_DEFINITELY_UNSET}"
        );
    }

    #[test]
    fn keeps_unterminated_placeholder() {
        assert_eq!(expand_env("prefix ${OOPS"), "prefix ${OOPS");
    }

    #[test]
    fn plain_text_untouched() {
        assert_eq!(expand_env("no placeholders here"), "no placeholders here");
    }

    #[test]
    fn multiple_placeholders() {
        unsafe { std::env::set_var("PHONOTEK_A", "1") };
        unsafe { std::env::set_var("PHONOTEK_B", "2") };
        assert_eq!(expand_env("${PHONOTEK_A}-${PHONOTEK_B}"), "1-2");
        unsafe { std::env::remove_var("PHONOTEK_A") };
        unsafe { std::env::remove_var("PHONOTEK_B") };
    }
}

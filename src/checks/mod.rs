//! Built-in check definitions.
//!
//! These checks are available by default in all configurations.

/// Names of built-in checks.
pub mod names {
    /// Style check (check mode, no fixes applied).
    pub const STYLE: &str = "style";
    /// Formatting check (check mode, no files rewritten).
    pub const FORMAT: &str = "format";
    /// Static type check.
    pub const TYPES: &str = "types";
}

/// Returns true if a check name is a built-in check.
#[must_use]
pub fn is_builtin(name: &str) -> bool {
    matches!(name, names::STYLE | names::FORMAT | names::TYPES)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_builtin() {
        assert!(is_builtin("style"));
        assert!(is_builtin("format"));
        assert!(is_builtin("types"));
        assert!(!is_builtin("custom-check"));
    }
}

use std::fmt;

/// Machine-readable error codes for scripted callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigParseError,
    InputNotFound,
    MalformedInput,
    CycleDetected,
    ConflictingParents,
    UnknownCategory,
    MissingProductCategory,
    UnknownProduct,
    PathTooDeep,
    ReportWriteFailed,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::ConfigParseError => "E1001",
            Self::InputNotFound => "E1002",
            Self::MalformedInput => "E1003",
            Self::CycleDetected => "E2001",
            Self::ConflictingParents => "E2002",
            Self::UnknownCategory => "E2003",
            Self::MissingProductCategory => "E3001",
            Self::UnknownProduct => "E3002",
            Self::PathTooDeep => "E4001",
            Self::ReportWriteFailed => "E5001",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::ConfigParseError => "Config file parse error",
            Self::InputNotFound => "Input file not found",
            Self::MalformedInput => "Malformed input table",
            Self::CycleDetected => "Category hierarchy contains a cycle",
            Self::ConflictingParents => "Category has conflicting parents",
            Self::UnknownCategory => "Category not found",
            Self::MissingProductCategory => "Product category missing from hierarchy",
            Self::UnknownProduct => "Transaction references unknown product",
            Self::PathTooDeep => "Category path exceeds table width",
            Self::ReportWriteFailed => "Report write failed",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint that can be surfaced to operators.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::ConfigParseError => Some("Fix syntax in rollup.toml and retry."),
            Self::InputNotFound => Some("Pass the input paths explicitly or set them under [input]."),
            Self::MalformedInput => Some("Check the column names under [columns] and the cell values."),
            Self::CycleDetected => Some("Run `rollup check` to list every cycle, then remove one edge per cycle."),
            Self::ConflictingParents => Some(
                "Give each category a single parent, or set hierarchy.multi_parent = \"keep_last\".",
            ),
            Self::UnknownCategory => None,
            Self::MissingProductCategory => {
                Some("Add the category to the hierarchy, or set report.missing_category = \"skip\".")
            }
            Self::UnknownProduct => {
                Some("Add the product to the catalog, or set report.unknown_product = \"skip\".")
            }
            Self::PathTooDeep => Some("Raise paths.columns or omit it to size the table to the deepest path."),
            Self::ReportWriteFailed => Some("Check disk space and write permissions."),
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::ErrorCode;
    use std::collections::HashSet;

    const ALL: [ErrorCode; 11] = [
        ErrorCode::ConfigParseError,
        ErrorCode::InputNotFound,
        ErrorCode::MalformedInput,
        ErrorCode::CycleDetected,
        ErrorCode::ConflictingParents,
        ErrorCode::UnknownCategory,
        ErrorCode::MissingProductCategory,
        ErrorCode::UnknownProduct,
        ErrorCode::PathTooDeep,
        ErrorCode::ReportWriteFailed,
        ErrorCode::InternalUnexpected,
    ];

    #[test]
    fn all_codes_are_unique() {
        let mut seen = HashSet::new();
        for code in ALL {
            assert!(seen.insert(code.code()), "duplicate code {}", code.code());
        }
    }

    #[test]
    fn code_format_is_machine_friendly() {
        for code in ALL {
            let code = code.code();
            assert_eq!(code.len(), 5);
            assert!(code.starts_with('E'));
            assert!(code.chars().skip(1).all(|c| c.is_ascii_digit()));
        }
    }
}

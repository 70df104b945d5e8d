//! Macro for string conversions on the persisted status enums
//!
//! Every enum that lands in a database column or an `attributes` map needs
//! the same three things: a stable wire string, `Display`, and a
//! case-insensitive `FromStr`. This macro generates all three from a single
//! variant table so the column values cannot drift from the parser.
//!
//! # Example
//!
//! ```rust
//! use calrecon_domain::impl_status_conversions;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! pub enum Phase {
//!     Queued,
//!     Done,
//! }
//!
//! impl_status_conversions!(Phase {
//!     Queued => "queued",
//!     Done => "done",
//! });
//!
//! assert_eq!(Phase::Done.as_str(), "done");
//! assert_eq!("QUEUED".parse::<Phase>().unwrap(), Phase::Queued);
//! ```

/// Implements `as_str`, `Display` and `FromStr` for a fieldless enum
///
/// Parsing failures return [`crate::ReconError::Validation`] naming the enum,
/// which lets repository row mappers propagate them with `?`.
#[macro_export]
macro_rules! impl_status_conversions {
    ($enum_name:ident { $($variant:ident => $str:expr),+ $(,)? }) => {
        impl $enum_name {
            /// Stable string form used in storage and logs.
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $str,)+
                }
            }
        }

        impl ::std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl ::std::str::FromStr for $enum_name {
            type Err = $crate::ReconError;

            fn from_str(s: &str) -> ::std::result::Result<Self, Self::Err> {
                match s.trim().to_lowercase().as_str() {
                    $($str => Ok(Self::$variant),)+
                    _ => Err($crate::ReconError::Validation(format!(
                        "invalid {}: {}",
                        stringify!($enum_name),
                        s
                    ))),
                }
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use crate::ReconError;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Sample {
        First,
        SecondKind,
    }

    impl_status_conversions!(Sample {
        First => "first",
        SecondKind => "second-kind",
    });

    #[test]
    fn display_uses_wire_string() {
        assert_eq!(Sample::First.to_string(), "first");
        assert_eq!(Sample::SecondKind.to_string(), "second-kind");
    }

    #[test]
    fn parsing_is_case_insensitive_and_trimmed() {
        assert_eq!(Sample::from_str(" FIRST ").unwrap(), Sample::First);
        assert_eq!(Sample::from_str("Second-Kind").unwrap(), Sample::SecondKind);
    }

    #[test]
    fn unknown_value_is_validation_error() {
        let err = Sample::from_str("third").unwrap_err();
        assert!(matches!(err, ReconError::Validation(msg) if msg.contains("Sample")));
    }

    /// Expands next to the crate's one-parameter `Result` alias.
    mod with_result_alias {
        use std::str::FromStr;

        #[allow(unused_imports)]
        use crate::Result;

        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        enum Stage {
            Open,
        }

        impl_status_conversions!(Stage { Open => "open" });

        #[test]
        fn parses_when_result_alias_is_in_scope() {
            assert_eq!(Stage::from_str("open").unwrap(), Stage::Open);
            assert_eq!(Stage::Open.as_str(), "open");
        }
    }
}

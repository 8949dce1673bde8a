//! Error recovery hooks
//!
//! A recovery strategy gets the mutable parse context and the error about
//! to be raised. Returning `true` means the context was mutated into a
//! recoverable state (`start_position` and/or `token_ahead` updated); the
//! driver records the error and resumes. Returning `false` surfaces the
//! error.
//!
//! The default strategy scans forward through the input and resumes at the
//! first position where one of the state's expected terminals recognizes a
//! token.

use super::context::Context;
use crate::error::ParseError;

/// Custom recovery callable.
pub type RecoveryFn = Box<dyn for<'g, 'i> FnMut(&mut Context<'g, 'i>, &mut ParseError) -> bool>;

/// Recovery strategy installed on a parser.
#[derive(Default)]
pub enum ErrorRecovery {
    /// Surface the first error (the default).
    #[default]
    Off,
    /// Scan forward to the next recognizable expected token.
    Default,
    /// User hook.
    Custom(RecoveryFn),
}

impl std::fmt::Debug for ErrorRecovery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Off => f.write_str("Off"),
            Self::Default => f.write_str("Default"),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

//! Natural-language query synthesis

pub mod translator;

pub use translator::{
    strip_code_fences, AttemptFeedback, QueryAttemptResult, QueryTranslator, QueryValidation,
    EXHAUSTED_MESSAGE,
};

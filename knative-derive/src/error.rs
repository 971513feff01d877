use crate::REQUIRED_VARIANTS;
use proc_macro2::Span;
use syn::Error;
use std::fmt;

pub enum VerificationError {
    NotDependent(String),
    NotUnit(String),
    OneRequiredVariant,
}

impl VerificationError {
    pub fn spanned(self, span: Span) -> Error {
        Error::new(span, self)
    }
}

impl fmt::Display for VerificationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use VerificationError::*;
        match self {
            NotDependent(s) => write!(f, "{} may not be a dependent", s),
            NotUnit(s) => write!(f, "{} must be a unit variant", s),
            OneRequiredVariant => write!(
                f,
                "ConditionType must contain only one of either {} variant",
                REQUIRED_VARIANTS.join(" or ")
            ),
        }
    }
}

impl From<VerificationError> for Error {
    fn from(v: VerificationError) -> Error {
        v.spanned(Span::call_site())
    }
}

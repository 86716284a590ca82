//! Closed status vocabularies shared by attempts and evaluations.
//!
//! Every value is persisted as upper-case text. Decoding a value that is not part of the
//! vocabulary fails the row instead of leaking an unknown string into the state machine.

use serde::{Deserialize, Serialize};
use sqlx::{
    encode::IsNull,
    error::BoxDynError,
    postgres::{PgArgumentBuffer, PgTypeInfo, PgValueRef},
    Decode, Encode, Postgres, Type,
};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} value: {value}")]
pub struct UnknownValue {
    pub kind: &'static str,
    pub value: String,
}

macro_rules! text_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownValue;

            fn from_str(raw: &str) -> Result<Self, Self::Err> {
                let normalized = raw.trim().to_ascii_uppercase();
                $name::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str() == normalized)
                    .ok_or_else(|| UnknownValue { kind: $kind, value: raw.to_string() })
            }
        }

        impl Type<Postgres> for $name {
            fn type_info() -> PgTypeInfo {
                <String as Type<Postgres>>::type_info()
            }

            fn compatible(ty: &PgTypeInfo) -> bool {
                <String as Type<Postgres>>::compatible(ty)
            }
        }

        impl<'r> Decode<'r, Postgres> for $name {
            fn decode(value: PgValueRef<'r>) -> Result<Self, BoxDynError> {
                let raw = <&str as Decode<Postgres>>::decode(value)?;
                Ok(raw.parse()?)
            }
        }

        impl<'q> Encode<'q, Postgres> for $name {
            fn encode_by_ref(&self, buf: &mut PgArgumentBuffer) -> IsNull {
                <&str as Encode<Postgres>>::encode_by_ref(&self.as_str(), buf)
            }
        }
    };
}

/// Workflow status of a quiz attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttemptStatus {
    Attempting,
    Submitted,
    Reviewing,
    Satisfactory,
    Fail,
    Returned,
}

text_enum!(AttemptStatus, "attempt status", {
    Attempting => "ATTEMPTING",
    Submitted => "SUBMITTED",
    Reviewing => "REVIEWING",
    Satisfactory => "SATISFACTORY",
    Fail => "FAIL",
    Returned => "RETURNED",
});

impl AttemptStatus {
    /// Label shown in lists and detail pages. Returned attempts read as failed there while the
    /// stored value keeps saying RETURNED.
    pub fn display_label(&self) -> &'static str {
        match self {
            AttemptStatus::Fail | AttemptStatus::Returned => "NOT SATISFACTORY",
            other => other.as_str(),
        }
    }

    pub fn awaits_verdict(&self) -> bool {
        matches!(self, AttemptStatus::Submitted | AttemptStatus::Reviewing)
    }
}

impl From<Verdict> for AttemptStatus {
    fn from(verdict: Verdict) -> Self {
        match verdict {
            Verdict::Satisfactory => AttemptStatus::Satisfactory,
            Verdict::Fail => AttemptStatus::Fail,
        }
    }
}

/// Outcome computed outside this service by automatic marking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SystemResult {
    Inprogress,
    Completed,
    Evaluated,
    Marked,
}

text_enum!(SystemResult, "system result", {
    Inprogress => "INPROGRESS",
    Completed => "COMPLETED",
    Evaluated => "EVALUATED",
    Marked => "MARKED",
});

/// Marking verdict for a single question or a finalized evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    Satisfactory,
    Fail,
}

text_enum!(Verdict, "verdict", {
    Satisfactory => "SATISFACTORY",
    Fail => "FAIL",
});

impl Verdict {
    /// Accepts the stored names case-insensitively plus the "NOT SATISFACTORY" label the
    /// evaluator screens use for a failed verdict.
    pub fn parse_lenient(raw: &str) -> Result<Self, UnknownValue> {
        let normalized = raw.trim().to_ascii_uppercase().replace(['_', '-'], " ");
        match normalized.as_str() {
            "NOT SATISFACTORY" => Ok(Verdict::Fail),
            _ => raw.parse(),
        }
    }
}

impl<'de> Deserialize<'de> for Verdict {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Verdict::parse_lenient(&raw).map_err(serde::de::Error::custom)
    }
}

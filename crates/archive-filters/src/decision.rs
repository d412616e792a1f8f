use serde::{Deserialize, Serialize};

/// Which filter stage produced a `Filtered` outcome (spec §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterCategory {
    StaticAsset,
    ListPage,
    SizeType,
    Duplicate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterOutcome {
    Kept,
    Filtered {
        reason: String,
        category: FilterCategory,
        details: Option<String>,
    },
}

impl FilterOutcome {
    pub fn is_kept(&self) -> bool {
        matches!(self, Self::Kept)
    }
}

/// The parallel decision record a filter produces for one capture (spec
/// §4.2): `{kept | filtered(reason, category, details)}` plus
/// `can_be_manually_overridden` and a `priority_hint` in `1..=10`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterDecision {
    pub outcome: FilterOutcome,
    pub can_be_manually_overridden: bool,
    pub priority_hint: u8,
}

impl FilterDecision {
    pub fn kept(priority_hint: u8) -> Self {
        Self {
            outcome: FilterOutcome::Kept,
            can_be_manually_overridden: false,
            priority_hint: priority_hint.clamp(1, 10),
        }
    }

    pub fn filtered(
        reason: impl Into<String>,
        category: FilterCategory,
        details: Option<String>,
        can_be_manually_overridden: bool,
        priority_hint: u8,
    ) -> Self {
        Self {
            outcome: FilterOutcome::Filtered {
                reason: reason.into(),
                category,
                details,
            },
            can_be_manually_overridden,
            priority_hint: priority_hint.clamp(1, 10),
        }
    }
}

//! Service skills and the expertise implication chain

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Skill category of a service / technician expertise level.
///
/// The business rule is a strict chain: special implies premium implies
/// regular. Expansion happens at ingestion so the solver only ever sees
/// already-closed expertise sets.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Skill {
    Regular,
    Premium,
    Special,
}

/// Closed set of skills.
pub type SkillSet = BTreeSet<Skill>;

impl Skill {
    pub const ALL: [Skill; 3] = [Skill::Regular, Skill::Premium, Skill::Special];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Regular => "regular",
            Self::Premium => "premium",
            Self::Special => "special",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "regular" => Some(Self::Regular),
            "premium" => Some(Self::Premium),
            "special" => Some(Self::Special),
            _ => None,
        }
    }

    /// Skills implied by holding this one, including itself.
    pub fn implied(&self) -> &'static [Skill] {
        match self {
            Self::Regular => &[Skill::Regular],
            Self::Premium => &[Skill::Premium, Skill::Regular],
            Self::Special => &[Skill::Special, Skill::Premium, Skill::Regular],
        }
    }

    /// Close a skill collection under the implication chain.
    pub fn expand(skills: impl IntoIterator<Item = Skill>) -> SkillSet {
        skills
            .into_iter()
            .flat_map(|s| s.implied().iter().copied())
            .collect()
    }

    /// On-site minutes for one service of this category.
    pub fn service_minutes(&self) -> i64 {
        15
    }

    /// Listed price of one service of this category.
    pub fn price(&self) -> i64 {
        match self {
            Self::Regular => 200,
            Self::Premium => 300,
            Self::Special => 400,
        }
    }

    /// Per-shift hiring cost of a technician whose top expertise is this
    /// category.
    pub fn base_cost(&self) -> i64 {
        match self {
            Self::Regular => 800,
            Self::Premium => 900,
            Self::Special => 1000,
        }
    }
}

/// Highest category in a (possibly expanded) expertise set.
pub fn top_skill(skills: &SkillSet) -> Option<Skill> {
    skills.iter().max().copied()
}

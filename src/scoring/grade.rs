//! Letter grade and recommendation derived from the 0–100 total.
//!
//! Cutoffs: ≥85 A, ≥70 B+, ≥60 B, ≥50 C+, ≥40 C, else D.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Grade {
    #[serde(rename = "D")]
    D,
    #[serde(rename = "C")]
    C,
    #[serde(rename = "C+")]
    CPlus,
    #[serde(rename = "B")]
    B,
    #[serde(rename = "B+")]
    BPlus,
    #[serde(rename = "A")]
    A,
}

const CUTOFFS: [(u32, Grade); 5] = [
    (85, Grade::A),
    (70, Grade::BPlus),
    (60, Grade::B),
    (50, Grade::CPlus),
    (40, Grade::C),
];

impl Grade {
    pub fn from_total(total: u32) -> Self {
        CUTOFFS
            .iter()
            .find(|(min, _)| total >= *min)
            .map(|(_, g)| *g)
            .unwrap_or(Grade::D)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Grade::A => "A",
            Grade::BPlus => "B+",
            Grade::B => "B",
            Grade::CPlus => "C+",
            Grade::C => "C",
            Grade::D => "D",
        }
    }

    pub fn recommendation(&self) -> &'static str {
        match self {
            Grade::A => "Excellent opportunity: strong demand with room for a new channel.",
            Grade::BPlus => "Strong niche worth pursuing.",
            Grade::B => "Solid niche; differentiate on format or angle.",
            Grade::CPlus => "Viable with a clear angle, but expect slower growth.",
            Grade::C => "Marginal niche; validate demand before investing.",
            Grade::D => "Weak niche; consider a different topic.",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cutoffs_are_inclusive() {
        assert_eq!(Grade::from_total(100), Grade::A);
        assert_eq!(Grade::from_total(85), Grade::A);
        assert_eq!(Grade::from_total(84), Grade::BPlus);
        assert_eq!(Grade::from_total(70), Grade::BPlus);
        assert_eq!(Grade::from_total(60), Grade::B);
        assert_eq!(Grade::from_total(50), Grade::CPlus);
        assert_eq!(Grade::from_total(40), Grade::C);
        assert_eq!(Grade::from_total(39), Grade::D);
        assert_eq!(Grade::from_total(0), Grade::D);
    }

    #[test]
    fn grades_are_monotonic_in_total() {
        let mut prev = Grade::D;
        for t in 0..=100 {
            let g = Grade::from_total(t);
            assert!(g >= prev);
            prev = g;
        }
    }

    #[test]
    fn serializes_with_plus_sign() {
        assert_eq!(serde_json::to_string(&Grade::BPlus).unwrap(), "\"B+\"");
        assert_eq!(Grade::CPlus.as_str(), "C+");
    }
}

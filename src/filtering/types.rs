// Shared types for tier filtering
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::confidence::Tier;
use crate::ingestion::QuestionRecord;

/// Which records a reviewer wants to see
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TierFilter {
    /// No filtering
    #[default]
    All,
    /// Only records classified into this tier
    Only(Tier),
}

impl TierFilter {
    pub fn matches(&self, record: &QuestionRecord) -> bool {
        match self {
            TierFilter::All => true,
            TierFilter::Only(tier) => record.confidence_tier == *tier,
        }
    }
}

impl FromStr for TierFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            return Ok(TierFilter::All);
        }
        Tier::parse(s)
            .map(TierFilter::Only)
            .ok_or_else(|| format!("unknown tier filter '{}' (all, high, medium, low, unknown)", s))
    }
}

impl fmt::Display for TierFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TierFilter::All => f.write_str("all"),
            TierFilter::Only(tier) => f.write_str(tier.as_str()),
        }
    }
}

/// Statistics from a filter pass
#[derive(Debug, Clone, Default)]
pub struct FilterStats {
    pub filter: TierFilter,
    /// Number of records before filtering
    pub input_records: usize,
    /// Number of records that matched
    pub output_records: usize,
    pub processing_time_us: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_filter() {
        assert_eq!("all".parse::<TierFilter>(), Ok(TierFilter::All));
        assert_eq!("ALL".parse::<TierFilter>(), Ok(TierFilter::All));
        assert_eq!(
            "Medium".parse::<TierFilter>(),
            Ok(TierFilter::Only(Tier::Medium))
        );
        assert!("sometimes".parse::<TierFilter>().is_err());
    }

    #[test]
    fn test_display_round_trips() {
        for filter in [TierFilter::All, TierFilter::Only(Tier::Low)] {
            assert_eq!(filter.to_string().parse::<TierFilter>(), Ok(filter));
        }
    }
}

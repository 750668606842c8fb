//! Domain vocabulary shared by the analysis passes

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// Legislative chamber
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chamber {
    House,
    Senate,
}

impl Chamber {
    /// Lowercase storage form used in `bills.chamber` and `rollcalls.chamber`
    pub fn as_str(&self) -> &'static str {
        match self {
            Chamber::House => "house",
            Chamber::Senate => "senate",
        }
    }

    /// Title-case display form ("House", "Senate")
    pub fn title(&self) -> &'static str {
        match self {
            Chamber::House => "House",
            Chamber::Senate => "Senate",
        }
    }

    /// SQL predicate selecting members of this chamber from `members`
    ///
    /// House members carry a district; senators do not.
    pub fn member_predicate(&self) -> &'static str {
        match self {
            Chamber::House => "district IS NOT NULL",
            Chamber::Senate => "district IS NULL",
        }
    }
}

impl fmt::Display for Chamber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Chamber {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "house" => Ok(Chamber::House),
            "senate" => Ok(Chamber::Senate),
            other => Err(Error::InvalidInput(format!(
                "Unknown chamber '{}' (expected 'house' or 'senate')",
                other
            ))),
        }
    }
}

/// Party affiliation after normalizing the spellings found in loaded data
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Party {
    Democrat,
    Republican,
    Other(String),
}

impl Party {
    /// Normalize raw party strings ("D", "Democratic", "Republican", NULL, ...)
    pub fn normalize(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some("D") | Some("Democrat") | Some("Democratic") => Party::Democrat,
            Some("R") | Some("Republican") => Party::Republican,
            Some(other) if !other.is_empty() => Party::Other(other.to_string()),
            _ => Party::Other("Unknown".to_string()),
        }
    }

    /// One-letter code for the two major parties, raw name otherwise
    pub fn code(&self) -> &str {
        match self {
            Party::Democrat => "D",
            Party::Republican => "R",
            Party::Other(name) => name.as_str(),
        }
    }

    /// The major party on the other side of the aisle
    pub fn opposite(&self) -> Option<Party> {
        match self {
            Party::Democrat => Some(Party::Republican),
            Party::Republican => Some(Party::Democrat),
            Party::Other(_) => None,
        }
    }

    pub fn is_major(&self) -> bool {
        !matches!(self, Party::Other(_))
    }
}

impl fmt::Display for Party {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl Serialize for Party {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.code())
    }
}

impl<'de> Deserialize<'de> for Party {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Party::normalize(Some(&raw)))
    }
}

/// A member's recorded response on a roll call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VoteCode {
    Yea,
    Nay,
    Present,
    #[serde(rename = "Not Voting")]
    NotVoting,
}

impl VoteCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoteCode::Yea => "Yea",
            VoteCode::Nay => "Nay",
            VoteCode::Present => "Present",
            VoteCode::NotVoting => "Not Voting",
        }
    }

    /// Yea and Nay are the only votes that count toward agreement and party tallies
    pub fn is_decisive(&self) -> bool {
        matches!(self, VoteCode::Yea | VoteCode::Nay)
    }
}

impl fmt::Display for VoteCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VoteCode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Yea" | "Yes" | "Aye" => Ok(VoteCode::Yea),
            "Nay" | "No" => Ok(VoteCode::Nay),
            "Present" => Ok(VoteCode::Present),
            "Not Voting" => Ok(VoteCode::NotVoting),
            other => Err(Error::InvalidInput(format!("Unknown vote code '{}'", other))),
        }
    }
}

/// A party's collective position on a roll call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Position {
    Yea,
    Nay,
    Tie,
}

impl Position {
    /// Majority of a yea/nay split; equal counts (including 0-0) are a tie
    pub fn from_counts(yea: u32, nay: u32) -> Self {
        if yea > nay {
            Position::Yea
        } else if nay > yea {
            Position::Nay
        } else {
            Position::Tie
        }
    }

    /// Whether a decisive vote matches this position
    pub fn matches(&self, vote: VoteCode) -> bool {
        matches!(
            (self, vote),
            (Position::Yea, VoteCode::Yea) | (Position::Nay, VoteCode::Nay)
        )
    }
}

//! Shared domain enumerations.

use serde::{Deserialize, Serialize};

/// Sort dimension of the public listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum SortDimension {
    /// Most viewed first.
    Hottest,
    /// Most recently created first.
    Latest,
}

impl SortDimension {
    pub const ALL: [SortDimension; 2] = [SortDimension::Hottest, SortDimension::Latest];

    /// Document field the dimension orders by.
    pub fn field(self) -> &'static str {
        match self {
            SortDimension::Hottest => "views",
            SortDimension::Latest => "createdAt",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SortDimension::Hottest => "hottest",
            SortDimension::Latest => "latest",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageDirection {
    Initial,
    Next,
    Prev,
}

impl PageDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            PageDirection::Initial => "initial",
            PageDirection::Next => "next",
            PageDirection::Prev => "prev",
        }
    }
}

//! Leaderboards by XP, recipes created and recipes cooked

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Result;
use crate::fetch::{ApiClient, QueryParams};
use crate::pagination::NumberedPage;

/// Entries requested per page
pub const LEADERBOARD_PAGE_SIZE: u32 = 50;

/// Time window for the XP leaderboard
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Timeframe {
    #[default]
    All,
    Week,
    Month,
    Year,
}

impl Timeframe {
    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::All => "all",
            Timeframe::Week => "week",
            Timeframe::Month => "month",
            Timeframe::Year => "year",
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ranking criterion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeaderboardKind {
    Xp,
    Recipes,
    Cooked,
}

impl LeaderboardKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeaderboardKind::Xp => "xp",
            LeaderboardKind::Recipes => "recipes",
            LeaderboardKind::Cooked => "cooked",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedUser {
    pub id: String,
    pub username: String,
    pub level: u32,
    pub xp: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RankStats {
    #[serde(default)]
    pub recipes_created: u64,
    #[serde(default)]
    pub recipes_cooked: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub rank: u32,
    pub user: RankedUser,
    #[serde(default)]
    pub stats: RankStats,
}

/// Client for the leaderboard endpoints
#[derive(Clone)]
pub struct LeaderboardService {
    api: ApiClient,
}

impl LeaderboardService {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    /// Fetch one page of a leaderboard. The timeframe only applies to the XP board.
    pub async fn get(
        &self,
        kind: LeaderboardKind,
        timeframe: Timeframe,
        page: u32,
    ) -> Result<NumberedPage<LeaderboardEntry>> {
        let mut query = QueryParams::new();
        if kind == LeaderboardKind::Xp {
            query = query.set("timeframe", timeframe);
        }
        let query = query
            .set("page", page)
            .set("limit", LEADERBOARD_PAGE_SIZE);

        self.api
            .get(&format!("/leaderboard/{}", kind.as_str()), Some(&query))
            .await
    }

    pub async fn by_xp(&self, timeframe: Timeframe, page: u32) -> Result<NumberedPage<LeaderboardEntry>> {
        self.get(LeaderboardKind::Xp, timeframe, page).await
    }

    pub async fn by_recipes(&self, page: u32) -> Result<NumberedPage<LeaderboardEntry>> {
        self.get(LeaderboardKind::Recipes, Timeframe::All, page).await
    }

    pub async fn by_cooked(&self, page: u32) -> Result<NumberedPage<LeaderboardEntry>> {
        self.get(LeaderboardKind::Cooked, Timeframe::All, page).await
    }
}

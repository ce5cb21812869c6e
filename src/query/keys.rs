//! Key builders for every cached resource

use serde_json::json;

use crate::leaderboard::{LeaderboardKind, Timeframe};
use crate::recipes::RecipeFilters;

use super::key::QueryKey;

pub const RECIPES: &str = "recipes";
pub const RECIPE: &str = "recipe";
pub const SAVED_RECIPES: &str = "saved-recipes";
pub const COOKED_RECIPES: &str = "cooked-recipes";
pub const COMMENTS: &str = "comments";
pub const FOLLOWERS: &str = "followers";
pub const FOLLOWING: &str = "following";
pub const FEED: &str = "feed";
pub const LEADERBOARD: &str = "leaderboard";
pub const NOTIFICATIONS: &str = "notifications";
pub const UNREAD_COUNT: &str = "unread-count";

/// Listing key; parameters mirror the request's query string
pub fn recipes(filters: &RecipeFilters) -> QueryKey {
    QueryKey::from_query(RECIPES, &filters.to_query())
}

pub fn recipe(slug: &str) -> QueryKey {
    QueryKey::new(RECIPE, json!({ "slug": slug }))
}

pub fn saved_recipes() -> QueryKey {
    QueryKey::kind_only(SAVED_RECIPES)
}

pub fn cooked_recipes() -> QueryKey {
    QueryKey::kind_only(COOKED_RECIPES)
}

pub fn comments(slug: &str, page: u32) -> QueryKey {
    QueryKey::new(COMMENTS, json!({ "slug": slug, "page": page }))
}

/// Every comment page of one recipe, for invalidation
pub fn all_comments(slug: &str) -> QueryKey {
    QueryKey::new(COMMENTS, json!({ "slug": slug }))
}

pub fn followers(user_id: &str, page: u32) -> QueryKey {
    QueryKey::new(FOLLOWERS, json!({ "user": user_id, "page": page }))
}

pub fn following(user_id: &str, page: u32) -> QueryKey {
    QueryKey::new(FOLLOWING, json!({ "user": user_id, "page": page }))
}

pub fn feed(page: u32) -> QueryKey {
    QueryKey::new(FEED, json!({ "page": page }))
}

pub fn leaderboard(kind: LeaderboardKind, timeframe: Timeframe, page: u32) -> QueryKey {
    let timeframe = match kind {
        LeaderboardKind::Xp => Some(timeframe.as_str()),
        _ => None,
    };
    QueryKey::new(
        LEADERBOARD,
        json!({ "board": kind.as_str(), "timeframe": timeframe, "page": page }),
    )
}

pub fn notifications(page: u32, unread_only: bool) -> QueryKey {
    QueryKey::new(NOTIFICATIONS, json!({ "page": page, "unread_only": unread_only }))
}

pub fn unread_count() -> QueryKey {
    QueryKey::kind_only(UNREAD_COUNT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recipes::Difficulty;

    #[test]
    fn test_recipe_listing_keys() {
        let a = recipes(&RecipeFilters::new().difficulty(Difficulty::Easy).page(1));
        let b = recipes(&RecipeFilters::new().page(1).difficulty(Difficulty::Easy).cuisine(""));
        assert_eq!(a, b);
        assert_ne!(a, recipes(&RecipeFilters::new().difficulty(Difficulty::Easy).page(2)));
        assert!(a.matches(&QueryKey::kind_only(RECIPES)));
    }

    #[test]
    fn test_timeframe_only_distinguishes_xp_board() {
        assert_eq!(
            leaderboard(LeaderboardKind::Cooked, Timeframe::Week, 1),
            leaderboard(LeaderboardKind::Cooked, Timeframe::All, 1)
        );
        assert_ne!(
            leaderboard(LeaderboardKind::Xp, Timeframe::Week, 1),
            leaderboard(LeaderboardKind::Xp, Timeframe::All, 1)
        );
    }

    #[test]
    fn test_comment_pages_match_recipe_filter() {
        assert!(comments("pancakes", 3).matches(&all_comments("pancakes")));
        assert!(!comments("pancakes", 3).matches(&all_comments("waffles")));
    }
}

//! Recipe list filters

use serde::{Deserialize, Serialize};

use super::types::{Difficulty, Rarity};
use crate::fetch::QueryParams;

/// Filters for `GET /recipes`.
///
/// Every field is optional; absent or empty values are left out of both the query
/// string and the cache key. List fields keep their order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecipeFilters {
    /// Title search, sent as `q`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    /// Author user ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,

    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub tags: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<Difficulty>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub cuisine: Option<String>,

    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub dietary_restrictions: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub rarity: Option<Rarity>,

    /// Minimum total time in minutes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_min: Option<u32>,

    /// Maximum total time in minutes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_max: Option<u32>,

    /// Ingredient name search
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ingredient: Option<String>,

    /// Sort field, e.g. `-created_at` or `views`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u32>,
}

impl RecipeFilters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, value: &str) -> Self {
        self.text = Some(value.to_string());
        self
    }

    pub fn author(mut self, value: &str) -> Self {
        self.author = Some(value.to_string());
        self
    }

    pub fn tag(mut self, value: &str) -> Self {
        self.tags.push(value.to_string());
        self
    }

    pub fn difficulty(mut self, value: Difficulty) -> Self {
        self.difficulty = Some(value);
        self
    }

    pub fn cuisine(mut self, value: &str) -> Self {
        self.cuisine = Some(value.to_string());
        self
    }

    pub fn dietary_restriction(mut self, value: &str) -> Self {
        self.dietary_restrictions.push(value.to_string());
        self
    }

    pub fn rarity(mut self, value: Rarity) -> Self {
        self.rarity = Some(value);
        self
    }

    pub fn time_range(mut self, min: Option<u32>, max: Option<u32>) -> Self {
        self.time_min = min;
        self.time_max = max;
        self
    }

    pub fn ingredient(mut self, value: &str) -> Self {
        self.ingredient = Some(value.to_string());
        self
    }

    pub fn sort(mut self, value: &str) -> Self {
        self.sort = Some(value.to_string());
        self
    }

    pub fn page(mut self, value: u32) -> Self {
        self.page = Some(value);
        self
    }

    pub fn page_size(mut self, value: u32) -> Self {
        self.page_size = Some(value);
        self
    }

    /// Encode as query parameters in a fixed order
    pub fn to_query(&self) -> QueryParams {
        QueryParams::new()
            .opt("q", self.text.as_deref())
            .opt("author", self.author.as_deref())
            .repeated("tags", &self.tags)
            .opt("difficulty", self.difficulty)
            .opt("cuisine", self.cuisine.as_deref())
            .repeated("dietary_restrictions", &self.dietary_restrictions)
            .opt("rarity", self.rarity)
            .opt("time_min", self.time_min)
            .opt("time_max", self.time_max)
            .opt("ingredient", self.ingredient.as_deref())
            .opt("sort", self.sort.as_deref())
            .opt("page", self.page)
            .opt("page_size", self.page_size)
    }
}

//! Recipe service

mod filter;
mod types;

use crate::error::Result;
use crate::fetch::ApiClient;
use crate::pagination::{CursorPage, Page};

pub use filter::*;
pub use types::*;

/// Page size the server applies when none is requested
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Client for the recipe endpoints
#[derive(Clone)]
pub struct RecipeService {
    api: ApiClient,
}

impl RecipeService {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    fn recipe_path(slug: &str, action: &str) -> String {
        if action.is_empty() {
            format!("/recipes/{}", slug)
        } else {
            format!("/recipes/{}/{}", slug, action)
        }
    }

    /// Raw `{count, next, previous, results}` listing
    pub async fn list(&self, filters: &RecipeFilters) -> Result<CursorPage<RecipeListItem>> {
        self.api.get("/recipes", Some(&filters.to_query())).await
    }

    /// Listing converted to the uniform page shape
    pub async fn list_page(&self, filters: &RecipeFilters) -> Result<Page<RecipeListItem>> {
        let envelope = self.list(filters).await?;
        Ok(envelope.into_page(
            filters.page.unwrap_or(1),
            filters.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
        ))
    }

    pub async fn get(&self, slug: &str) -> Result<Recipe> {
        self.api.get(&Self::recipe_path(slug, ""), None).await
    }

    pub async fn create(&self, recipe: &CreateRecipeRequest) -> Result<Recipe> {
        self.api
            .post("/recipes", Some(serde_json::to_value(recipe)?))
            .await
    }

    pub async fn update(&self, slug: &str, patch: &UpdateRecipeRequest) -> Result<Recipe> {
        self.api
            .put(&Self::recipe_path(slug, ""), serde_json::to_value(patch)?)
            .await
    }

    pub async fn delete(&self, slug: &str) -> Result<()> {
        self.api.delete(&Self::recipe_path(slug, "")).await
    }

    /// Award cooking XP. The returned progress is informational; the session's
    /// user is only updated by fetching it again.
    pub async fn mark_cooked(&self, slug: &str) -> Result<MarkCookedResponse> {
        self.api
            .post(&Self::recipe_path(slug, "mark_cooked"), None)
            .await
    }

    pub async fn toggle_save(&self, slug: &str) -> Result<SaveToggleResponse> {
        self.api.post(&Self::recipe_path(slug, "save"), None).await
    }

    pub async fn saved(&self) -> Result<RecipeCollection> {
        self.api.get("/recipes/saved", None).await
    }

    pub async fn cooked(&self) -> Result<RecipeCollection> {
        self.api.get("/recipes/cooked", None).await
    }
}

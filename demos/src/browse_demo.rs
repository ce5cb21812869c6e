use dotenv::dotenv;
use recipe_client::leaderboard::{LeaderboardKind, Timeframe};
use recipe_client::prelude::*;

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    pretty_env_logger::init();

    let client = RecipeClient::new(ClientOptions::from_env()?)?;
    let queries = client.queries();

    let filters = RecipeFilters::new()
        .difficulty(Difficulty::Easy)
        .tag("vegetarian")
        .page(1);

    println!("Easy vegetarian recipes:");
    let listing = queries.recipes(&filters).await;
    match (&listing.data, &listing.error) {
        (Some(page), _) => {
            for recipe in &page.items {
                println!("  {} ({})", recipe.title, recipe.slug);
            }
            println!("Page {} of {}, {} total", page.page, page.total_pages, page.total_count);
        }
        (None, Some(e)) => println!("Could not load recipes: {}", e),
        (None, None) => println!("No recipes"),
    }

    // Served from the cache: listings stay fresh for two minutes
    let again = queries.recipes(&filters).await;
    println!("Second read fetching: {}", again.is_fetching);

    println!("\nTop cooks this week:");
    let board = queries
        .leaderboard(LeaderboardKind::Xp, Timeframe::Week, 1)
        .await;
    if let Some(page) = board.data {
        for entry in page.items.iter().take(10) {
            println!("  #{} {} (level {}, {} XP)", entry.rank, entry.user.username, entry.user.level, entry.user.xp);
        }
    }

    client.shutdown();
    Ok(())
}

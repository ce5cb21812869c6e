use dotenv::dotenv;
use log::info;
use recipe_client::auth::{FileStorage, LoginRequest};
use recipe_client::prelude::*;
use std::env;
use std::sync::Arc;

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file
    dotenv().ok();
    pretty_env_logger::init();

    let options = ClientOptions::from_env()?;
    let username = env::var("RECIPE_USERNAME").expect("RECIPE_USERNAME must be set");
    let password = env::var("RECIPE_PASSWORD").expect("RECIPE_PASSWORD must be set");

    // Tokens survive restarts through a file next to the binary
    let storage = Arc::new(FileStorage::new(".recipe-session.json"));
    let client = RecipeClient::with_storage(options, storage)?;

    match client.init().await? {
        Some(user) => println!("Restored session for {}", user.username),
        None => {
            println!("Signing in as {}", username);
            let user = client
                .session()
                .login(&LoginRequest::new(&username, &password))
                .await?;
            println!("Signed in: level {} with {} XP", user.level, user.xp);
        }
    }

    let poller = client.spawn_unread_poller();

    let unread = client.queries().unread_count().await;
    if let Some(count) = unread.data {
        println!("Unread notifications: {}", count.unread_count);
    }

    // Cooking a recipe awards XP; the session picks it up on the next fetch
    if let Ok(slug) = env::var("RECIPE_SLUG") {
        let cooked = client.queries().mark_cooked(&slug).await?;
        println!("Cooked {}: +{} XP", slug, cooked.xp_awarded);
        if let Some(user) = client.session().fetch_user().await? {
            println!("Now level {} with {} XP", user.level, user.xp);
        }
    }

    info!("Signing out");
    client.logout().await;
    println!("Signed out, poller running: {}", poller.is_running());

    Ok(())
}

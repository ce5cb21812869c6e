mod common;

use common::*;
use recipe_client::auth::MemoryStorage;
use recipe_client::error::ErrorKind;
use recipe_client::leaderboard::{LeaderboardKind, Timeframe};
use recipe_client::notifications::NotificationType;
use recipe_client::recipes::{Difficulty, Rarity, RecipeFilters};
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_recipe_filters_encode_only_present_values() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/recipes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "count": 0, "next": null, "previous": null, "results": []
        })))
        .mount(&mock_server)
        .await;

    let client = client(&mock_server, &MemoryStorage::new());
    let filters = RecipeFilters::new()
        .text("soup")
        .tag("vegan")
        .tag("quick")
        .cuisine("")
        .rarity(Rarity::Epic)
        .time_range(None, Some(30))
        .page(2);

    let page = client.recipes().list_page(&filters).await.unwrap();
    assert!(page.items.is_empty());
    assert_eq!(page.page, 2);

    let requests = mock_server.received_requests().await.unwrap();
    assert_eq!(
        requests[0].url.query(),
        Some("q=soup&tags=vegan&tags=quick&rarity=epic&time_max=30&page=2")
    );
}

#[tokio::test]
async fn test_numbered_pages_for_follow_lists() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/users/u1/followers"))
        .and(query_param("page", "1"))
        .and(query_param("limit", "20"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "count": 21,
            "page": 1,
            "limit": 20,
            "total_pages": 2,
            "results": [{"id": "u2", "username": "baker_bo", "level": 3, "xp": 340, "followers_count": 8, "is_following": true}]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client(&mock_server, &MemoryStorage::new());
    let page = client.social().followers("u1", 1).await.unwrap().into_page();

    assert_eq!(page.total_count, 21);
    assert!(page.has_next());
    assert!(!page.has_previous());
    assert_eq!(page.items[0].username, "baker_bo");
}

#[tokio::test]
async fn test_leaderboard_timeframe_only_for_xp() {
    let mock_server = MockServer::start().await;
    let board = json!({
        "count": 1, "page": 1, "limit": 50, "total_pages": 1,
        "results": [{
            "rank": 1,
            "user": {"id": "u1", "username": "chef_anna", "level": 7, "xp": 2400},
            "stats": {"recipes_created": 12, "recipes_cooked": 40}
        }]
    });
    Mock::given(method("GET"))
        .and(path("/api/leaderboard/xp"))
        .and(query_param("timeframe", "week"))
        .respond_with(ResponseTemplate::new(200).set_body_json(board.clone()))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/leaderboard/cooked"))
        .respond_with(ResponseTemplate::new(200).set_body_json(board))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client(&mock_server, &MemoryStorage::new());
    let xp = client.leaderboard().by_xp(Timeframe::Week, 1).await.unwrap();
    assert_eq!(xp.results[0].user.xp, 2400);

    let cooked = client
        .leaderboard()
        .get(LeaderboardKind::Cooked, Timeframe::Month, 1)
        .await
        .unwrap();
    assert_eq!(cooked.results[0].stats.recipes_cooked, 40);

    let requests = mock_server.received_requests().await.unwrap();
    assert_eq!(requests[1].url.query(), Some("page=1&limit=50"));
}

#[tokio::test]
async fn test_notifications_listing_and_unknown_types() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/notifications"))
        .and(query_param("unread_only", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "count": 2, "page": 1, "limit": 20, "total_pages": 1, "unread_count": 2,
            "results": [
                {"id": "n1", "type": "new_follower", "title": "New follower", "message": "baker_bo followed you", "is_read": false},
                {"id": "n2", "type": "seasonal_event", "title": "Autumn", "message": "Pumpkin week!", "is_read": false}
            ]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/notifications/n1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client(&mock_server, &MemoryStorage::new());
    let inbox = client.notifications().list(1, true).await.unwrap();

    assert_eq!(inbox.unread_count, Some(2));
    assert_eq!(inbox.page.results[0].kind, NotificationType::NewFollower);
    assert_eq!(inbox.page.results[1].kind, NotificationType::Other);

    client.notifications().delete("n1").await.unwrap();
}

#[tokio::test]
async fn test_comment_edit_accepts_both_envelopes() {
    let mock_server = MockServer::start().await;
    let comment = json!({
        "id": "c1",
        "author": {"id": "u1", "username": "chef_anna"},
        "content": "Even better with cinnamon",
        "likes_count": 3,
        "is_liked": true
    });
    Mock::given(method("PUT"))
        .and(path("/api/recipes/pancakes/comments/c1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "comment": comment.clone() })))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/api/recipes/pancakes/comments/c1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(comment))
        .mount(&mock_server)
        .await;

    let client = client(&mock_server, &MemoryStorage::new());
    for _ in 0..2 {
        let edited = client
            .comments()
            .update("pancakes", "c1", "Even better with cinnamon")
            .await
            .unwrap();
        assert_eq!(edited.likes_count, 3);
    }
}

#[tokio::test]
async fn test_error_kinds() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/recipes/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"detail": "Not found."})))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/recipes/garbled"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/recipes"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({"title": ["This field is required."]})))
        .mount(&mock_server)
        .await;

    let client = client(&mock_server, &MemoryStorage::new());

    let missing = client.recipes().get("missing").await.unwrap_err();
    assert_eq!(missing.kind(), ErrorKind::Http);
    assert_eq!(missing.status(), Some(404));
    assert!(!missing.is_retryable());

    let garbled = client.recipes().get("garbled").await.unwrap_err();
    assert_eq!(garbled.kind(), ErrorKind::Decode);

    let invalid = client
        .recipes()
        .create(&recipe_client::recipes::CreateRecipeRequest {
            title: String::new(),
            description: "Creamy".to_string(),
            difficulty: Difficulty::Medium,
            prep_time: 10,
            cook_time: 20,
            servings: 2,
            tags: vec![],
            cuisine: "italian".to_string(),
            ingredients: vec![],
            steps: vec![],
            images: None,
            nutrition_info: None,
        })
        .await
        .unwrap_err();
    assert_eq!(invalid.status(), Some(400));
    assert!(invalid.to_string().contains("This field is required."));

    let offline = recipe_client::RecipeClient::new(
        recipe_client::config::ClientOptions::new("http://127.0.0.1:9/api"),
    )
    .unwrap();
    let err = offline.recipes().get("anything").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Network);
    assert!(err.is_retryable());
}

use axum::http::StatusCode;
use mathpractice_api::models::game::{GameMode, Operation};

mod common;

async fn play(app: &axum::Router, username: &str, correct: usize) {
    let started = common::start_game(app, username, "multiplication", "mini").await;
    let session_id = started["session_id"].as_str().unwrap();
    if correct > 0 {
        common::answer_correctly(app, session_id, &started["question"], correct).await;
    }
    common::give_up(app, session_id).await;
}

#[tokio::test]
async fn test_leaderboard_orders_players_by_best_score() {
    let (app, _) = common::create_test_app();
    play(&app, "bob", 1).await;
    play(&app, "ada", 3).await;
    play(&app, "cy", 2).await;
    play(&app, "bob", 0).await;

    let (status, board) =
        common::send(&app, "GET", "/api/v1/leaderboards/multiplication/mini", None).await;
    assert_eq!(status, StatusCode::OK);

    let entries = board.as_array().unwrap();
    let names: Vec<&str> = entries
        .iter()
        .map(|e| e["username"].as_str().unwrap())
        .collect();
    assert_eq!(names, ["ada", "cy", "bob"]);
    assert_eq!(entries[0]["score"], 15);
    assert_eq!(entries[2]["score"], 5);
}

#[tokio::test]
async fn test_leaderboards_are_per_board() {
    let (app, _) = common::create_test_app();
    play(&app, "ada", 2).await;

    let (status, board) =
        common::send(&app, "GET", "/api/v1/leaderboards/multiplication/level", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(board.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_leaderboard_respects_configured_limit() {
    let (app, _) = common::create_test_app_with(mathpractice_api::Config {
        tick_interval_ms: 60_000,
        leaderboard_limit: 2,
        ..mathpractice_api::Config::default()
    });
    for name in ["a", "b", "c"] {
        play(&app, name, 1).await;
    }

    let (_, board) =
        common::send(&app, "GET", "/api/v1/leaderboards/multiplication/mini", None).await;
    assert_eq!(board.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_unknown_board_is_bad_request() {
    let (app, _) = common::create_test_app();
    let (status, _) = common::send(&app, "GET", "/api/v1/leaderboards/modulo/mini", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) =
        common::send(&app, "GET", "/api/v1/leaderboards/addition/marathon", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_best_score_endpoint() {
    let (app, _) = common::create_test_app();

    let (status, best) = common::send(
        &app,
        "GET",
        "/api/v1/players/ada/best/multiplication/mini",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(best["best_score"], 0);

    play(&app, "ada", 2).await;
    let (_, best) = common::send(
        &app,
        "GET",
        "/api/v1/players/ada/best/multiplication/mini",
        None,
    )
    .await;
    assert_eq!(best["best_score"], 10);
    assert_eq!(best["operation"], "multiplication");
    assert_eq!(best["mode"], "mini");
    assert_eq!(best["store_available"], true);
}

#[tokio::test]
async fn test_new_best_is_pushed_to_subscribers() {
    let (app, state) = common::create_test_app();
    let mut subscription = state
        .leaderboards
        .subscribe(Operation::Multiplication, GameMode::Mini)
        .await;

    play(&app, "ada", 1).await;

    let pushed = tokio::time::timeout(std::time::Duration::from_secs(1), subscription.next())
        .await
        .expect("leaderboard update should be published")
        .unwrap();
    assert_eq!(pushed.len(), 1);
    assert_eq!(pushed[0].username, "ada");
    assert_eq!(pushed[0].score, 5);
}

#[tokio::test]
async fn test_unreachable_store_degrades_reads() {
    let (app, _) = common::create_test_app_with_store(
        mathpractice_api::Config {
            tick_interval_ms: 60_000,
            ..mathpractice_api::Config::default()
        },
        std::sync::Arc::new(common::UnreachableScoreStore),
    );

    let (status, best) =
        common::send(&app, "GET", "/api/v1/players/ada/best/addition/mini", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(best["best_score"], 0);
    assert_eq!(best["store_available"], false);

    let (status, board) =
        common::send(&app, "GET", "/api/v1/leaderboards/addition/mini", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(board.as_array().unwrap().len(), 0);

    let started = common::start_game(&app, "ada", "addition", "mini").await;
    let session_id = started["session_id"].as_str().unwrap();
    common::answer_correctly(&app, session_id, &started["question"], 1).await;
    let summary = common::give_up(&app, session_id).await;
    assert_eq!(summary["store_available"], false);
    assert_eq!(summary["is_new_best"], false);
    assert_eq!(summary["best_score"], summary["final_score"]);
}

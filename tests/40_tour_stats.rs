mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::json;

use common::{tour_body, TestServer};

#[tokio::test]
async fn stats_group_by_difficulty() -> Result<()> {
    let server = TestServer::seeded().await?;

    let (status, body) = server.get("/tours/tour-stats").await?;
    assert_eq!(status, StatusCode::OK, "{}", body);

    let stats = body["data"]["stats"].as_array().cloned().unwrap_or_default();
    let groups: Vec<&str> = stats.iter().map(|s| s["_id"].as_str().unwrap_or_default()).collect();
    assert_eq!(groups, vec!["EASY", "MEDIUM", "DIFFICULT"]);

    let easy = &stats[0];
    assert_eq!(easy["numTours"], 4);
    assert_eq!(easy["numRatings"].as_f64(), Some(159.0));
    assert_eq!(easy["avgPrice"].as_f64(), Some(1272.0));
    assert_eq!(easy["minPrice"].as_f64(), Some(397.0));
    assert_eq!(easy["maxPrice"].as_f64(), Some(1997.0));
    let avg_rating = easy["avgRating"].as_f64().unwrap_or_default();
    assert!((avg_rating - 4.675).abs() < 1e-9, "{}", avg_rating);

    Ok(())
}

#[tokio::test]
async fn stats_skip_secret_and_low_rated_tours() -> Result<()> {
    let server = TestServer::start().await?;

    let mut secret = tour_body("The Secret Island");
    secret["secretTour"] = json!(true);
    secret["ratingsAverage"] = json!(4.9);
    server.post("/tours", &secret).await?;

    let mut low = tour_body("The Rainy Trail");
    low["ratingsAverage"] = json!(3.2);
    server.post("/tours", &low).await?;

    let (_, body) = server.get("/tours/tour-stats").await?;
    assert_eq!(body["data"]["stats"], json!([]));

    Ok(())
}

#[tokio::test]
async fn monthly_plan_counts_starts() -> Result<()> {
    let server = TestServer::seeded().await?;

    let (status, body) = server.get("/tours/monthly-plan/2021").await?;
    assert_eq!(status, StatusCode::OK, "{}", body);

    let plan = body["data"]["plan"].as_array().cloned().unwrap_or_default();
    assert_eq!(plan.len(), 10);
    assert_eq!(plan[0]["month"], 7);
    assert_eq!(plan[0]["numTourStarts"], 3);
    assert_eq!(plan[0]["tours"], json!(["The Forest Hiker", "The Sea Explorer", "The Sports Lover"]));

    let months: Vec<u64> = plan.iter().map(|p| p["month"].as_u64().unwrap_or_default()).collect();
    assert_eq!(months, vec![7, 3, 4, 6, 8, 9, 10, 2, 5, 12]);

    Ok(())
}

#[tokio::test]
async fn monthly_plan_rejects_bad_years() -> Result<()> {
    let server = TestServer::seeded().await?;

    let (status, body) = server.get("/tours/monthly-plan/twenty").await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid year: twenty.");

    let (_, body) = server.get("/tours/monthly-plan/1999").await?;
    assert_eq!(body["data"]["plan"], json!([]));

    Ok(())
}

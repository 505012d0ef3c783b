use chrono::Datelike;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::database::document::{self, Document};
use crate::database::{DatabaseError, Repository};
use crate::query::{Filter, FilterOp};

/// Tours rated at least this well take part in the stats
pub const STATS_MIN_RATING: f64 = 4.5;

/// One difficulty group
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TourStat {
    /// Uppercased difficulty
    #[serde(rename = "_id")]
    pub id: String,
    pub num_tours: u64,
    pub num_ratings: f64,
    pub avg_rating: f64,
    pub avg_price: f64,
    pub min_price: f64,
    pub max_price: f64,
}

/// Tour starts within one calendar month
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyPlan {
    pub month: u32,
    pub num_tour_starts: u64,
    pub tours: Vec<String>,
}

#[derive(Default)]
struct Accumulator {
    count: u64,
    ratings: f64,
    rating_sum: f64,
    price_sum: f64,
    min_price: Option<f64>,
    max_price: Option<f64>,
}

/// Group tours by difficulty, cheapest average price first. Tours rated
/// below the threshold are skipped.
pub fn tour_stats(tours: &[Document]) -> Vec<TourStat> {
    let mut groups: BTreeMap<String, Accumulator> = BTreeMap::new();

    for tour in tours {
        let rating = number(tour, "ratingsAverage");
        if rating.map(|r| r < STATS_MIN_RATING).unwrap_or(true) {
            continue;
        }
        let difficulty = tour.get("difficulty").and_then(Value::as_str).unwrap_or_default().to_uppercase();
        let acc = groups.entry(difficulty).or_default();

        acc.count += 1;
        acc.ratings += number(tour, "ratingsQuantity").unwrap_or(0.0);
        acc.rating_sum += rating.unwrap_or(0.0);
        if let Some(price) = number(tour, "price") {
            acc.price_sum += price;
            acc.min_price = Some(acc.min_price.map_or(price, |m| m.min(price)));
            acc.max_price = Some(acc.max_price.map_or(price, |m| m.max(price)));
        }
    }

    let mut stats: Vec<TourStat> = groups
        .into_iter()
        .map(|(id, acc)| {
            let n = acc.count as f64;
            TourStat {
                id,
                num_tours: acc.count,
                num_ratings: acc.ratings,
                avg_rating: acc.rating_sum / n,
                avg_price: acc.price_sum / n,
                min_price: acc.min_price.unwrap_or(0.0),
                max_price: acc.max_price.unwrap_or(0.0),
            }
        })
        .collect();

    stats.sort_by(|a, b| a.avg_price.total_cmp(&b.avg_price));
    stats
}

/// Count tour starts per month of `year`, busiest month first
pub fn monthly_plan(tours: &[Document], year: i32) -> Vec<MonthlyPlan> {
    let mut months: BTreeMap<u32, Vec<String>> = BTreeMap::new();

    for tour in tours {
        let name = tour.get("name").and_then(Value::as_str).unwrap_or_default();
        let Some(dates) = tour.get("startDates").and_then(Value::as_array) else {
            continue;
        };
        for start in dates.iter().filter_map(Value::as_str).filter_map(document::parse_date) {
            if start.year() == year {
                months.entry(start.month()).or_default().push(name.to_string());
            }
        }
    }

    let mut plan: Vec<MonthlyPlan> = months
        .into_iter()
        .map(|(month, tours)| MonthlyPlan { month, num_tour_starts: tours.len() as u64, tours })
        .collect();

    plan.sort_by(|a, b| b.num_tour_starts.cmp(&a.num_tour_starts).then(a.month.cmp(&b.month)));
    plan.truncate(12);
    plan
}

pub async fn load_tour_stats(tours: &Repository) -> Result<Vec<TourStat>, DatabaseError> {
    let filter = Filter::new().with("ratingsAverage", FilterOp::Gte, STATS_MIN_RATING);
    let docs = tours.select_any(filter).await?;
    Ok(tour_stats(&docs))
}

pub async fn load_monthly_plan(tours: &Repository, year: i32) -> Result<Vec<MonthlyPlan>, DatabaseError> {
    let docs = tours.select_any(Filter::new()).await?;
    Ok(monthly_plan(&docs, year))
}

fn number(doc: &Document, field: &str) -> Option<f64> {
    doc.get(field).and_then(Value::as_f64)
}

pub mod password_reset;
pub mod tour_stats;

pub use password_reset::{issue_password_reset, reset_password};
pub use tour_stats::{load_monthly_plan, load_tour_stats, monthly_plan, tour_stats, MonthlyPlan, TourStat};

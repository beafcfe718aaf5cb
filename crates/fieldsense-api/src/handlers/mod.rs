mod analysis;
mod health;

pub use analysis::run_analysis;
pub use health::health_check;

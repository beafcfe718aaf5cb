mod request;
mod response;

pub use request::RunAnalysisRequest;
pub use response::{HealthResponse, RunAnalysisResponse};

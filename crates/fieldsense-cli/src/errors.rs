use console::style;
use fieldsense_core::error::{ErrorCategory, FieldsenseError};
use std::fmt;

/// Error with remediation hints for the operator
pub struct CliError {
    pub message: String,
    pub context: Option<String>,
    pub suggestions: Vec<String>,
}

impl CliError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into(), context: None, suggestions: Vec::new() }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    pub fn display(&self) {
        eprintln!("{} {}\n", style("✗").red().bold(), style(&self.message).red().bold());

        if let Some(ref context) = self.context {
            eprintln!("{}", context);
            eprintln!();
        }

        if !self.suggestions.is_empty() {
            eprintln!("{}", style("To fix this:").yellow().bold());
            for (i, suggestion) in self.suggestions.iter().enumerate() {
                eprintln!("  {}. {}", i + 1, suggestion);
            }
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Debug for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

/// Create error for database connection failure
pub fn database_connection_failed(error: &str) -> CliError {
    CliError::new("Cannot connect to PostgreSQL")
        .with_context(format!("DATABASE_URL is not set or connection failed.\n\nError: {}", error))
        .with_suggestion("Set DATABASE_URL: export DATABASE_URL=\"postgresql://localhost/fieldsense\"")
        .with_suggestion("Or run against the in-memory store: --storage memory")
}

/// Create error for an unreadable field boundary file
pub fn aoi_unreadable(path: &str, error: &str) -> CliError {
    CliError::new("Cannot read the field boundary")
        .with_context(format!("Path: {}\nError: {}", path, error))
        .with_suggestion("Pass a GeoJSON Polygon or MultiPolygon in WGS84 coordinates")
        .with_suggestion("A Feature or a FeatureCollection with a single feature also works")
}

/// Create error for a failed analysis run
pub fn analysis_failed(error: &FieldsenseError) -> CliError {
    let err = CliError::new("Analysis failed").with_context(error.to_string());
    match error.category() {
        ErrorCategory::NoData => err
            .with_suggestion("Retry later, once new imagery has been acquired")
            .with_suggestion("Or widen the search: --window-days 14,30,60,90,180"),
        ErrorCategory::Computation => {
            err.with_suggestion("Check that the field is large enough to show spatial variation")
        }
        ErrorCategory::Storage => err
            .with_suggestion("Check that the database is reachable: fieldsense db status")
            .with_suggestion("Exports may exist on disk without a cached record"),
        ErrorCategory::InvalidInput => {
            err.with_suggestion("Check the field id and the boundary geometry")
        }
    }
}

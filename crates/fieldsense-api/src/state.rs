use fieldsense_analysis::AnalysisPipeline;
use fieldsense_store::MetadataStore;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<AnalysisPipeline>,
    pub store: Arc<dyn MetadataStore>,
    /// Directory served under `/analysis_files`
    pub export_dir: PathBuf,
}

impl AppState {
    pub fn new(pipeline: Arc<AnalysisPipeline>, store: Arc<dyn MetadataStore>) -> Self {
        let export_dir = pipeline.layout().dir().to_path_buf();
        Self { pipeline, store, export_dir }
    }
}

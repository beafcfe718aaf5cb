pub mod analysis;
pub mod geometry;
pub mod imagery;

pub use analysis::{
    AnalysisId, AnalysisRecord, AnalysisRequest, AnalysisResult, FieldId, NewOutput, OutputKind,
    OutputRecord,
};
pub use geometry::{AreaOfInterest, BoundingBox, Geometry, GeometryType};
pub use imagery::{
    BandExpression, BandImage, Collection, EigenDecomposition, ImageId, Reducer, RegionStats,
    SceneFilter, SceneSet, TemporalWindow,
};

use ne_image::ImageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog {key} is missing symbols: {}", .names.join(", "))]
    MissingSymbols { key: String, names: Vec<String> },
    #[error("catalog {key} symbols are not in one segment: {}", describe_segments(.segments))]
    InconsistentSegment { key: String, segments: Vec<(String, u16)> },
    #[error("format error: {0}")]
    Format(String),
    #[error("range error: {0}")]
    Range(String),
    #[error(transparent)]
    Image(#[from] ImageError),
    #[error("invalid globals JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn describe_segments(segments: &[(String, u16)]) -> String {
    segments
        .iter()
        .map(|(name, segment)| format!("{name}={segment}"))
        .collect::<Vec<_>>()
        .join(", ")
}

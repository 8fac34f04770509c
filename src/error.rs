//! Error taxonomy for region conversion.

use thiserror::Error;

/// Result alias for converter operations.
pub type Result<T> = std::result::Result<T, ConvertError>;

/// Every way a conversion can fail. None of these escape `convert` as a
/// panic; they are returned alongside an error status.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConvertError {
    /// The converter never initialized successfully (capabilities missing).
    #[error("converter is not initialized")]
    NotReady,

    /// The selector or handle did not resolve to an element.
    #[error("region not found: {0}")]
    RegionNotFound(String),

    /// The rasterizer rejected the region.
    #[error("rasterization failed: {0}")]
    Rasterization(String),

    /// Page construction, image embedding, or save failed.
    #[error("document assembly failed: {0}")]
    Assembly(String),
}

impl ConvertError {
    /// Short stable name, used in log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            ConvertError::NotReady => "NotReady",
            ConvertError::RegionNotFound(_) => "RegionNotFound",
            ConvertError::Rasterization(_) => "RasterizationFailure",
            ConvertError::Assembly(_) => "AssemblyFailure",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_carries_underlying_message() {
        let e = ConvertError::Rasterization("canvas exploded".to_string());
        assert_eq!(e.to_string(), "rasterization failed: canvas exploded");
        assert_eq!(e.kind(), "RasterizationFailure");
    }
}

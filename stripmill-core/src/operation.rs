//! Operation kinds.

use std::fmt;

/// The named transform requested for a whole session.
///
/// Identifiers that match no known operation are kept verbatim in `Other`
/// and resolve to the identity transform.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OperationKind {
    EdgeDetection,
    ColorInversion,
    Resize,
    Blur,
    Erosion,
    Dilation,
    Other(String),
}

impl OperationKind {
    /// All recognized operations, in menu order.
    pub const KNOWN: [OperationKind; 6] = [
        OperationKind::EdgeDetection,
        OperationKind::ColorInversion,
        OperationKind::Resize,
        OperationKind::Blur,
        OperationKind::Erosion,
        OperationKind::Dilation,
    ];

    /// Resolves a wire identifier. Matching is exact.
    pub fn parse(identifier: &str) -> Self {
        match identifier {
            "edge_detection" => OperationKind::EdgeDetection,
            "color_inversion" => OperationKind::ColorInversion,
            "resize" => OperationKind::Resize,
            "blur" => OperationKind::Blur,
            "erosion" => OperationKind::Erosion,
            "dilation" => OperationKind::Dilation,
            other => OperationKind::Other(other.to_string()),
        }
    }

    /// Returns the wire identifier.
    pub fn as_str(&self) -> &str {
        match self {
            OperationKind::EdgeDetection => "edge_detection",
            OperationKind::ColorInversion => "color_inversion",
            OperationKind::Resize => "resize",
            OperationKind::Blur => "blur",
            OperationKind::Erosion => "erosion",
            OperationKind::Dilation => "dilation",
            OperationKind::Other(s) => s,
        }
    }

    /// True if this resolves to the identity transform.
    pub fn is_identity(&self) -> bool {
        matches!(self, OperationKind::Other(_))
    }
}

impl From<&str> for OperationKind {
    fn from(identifier: &str) -> Self {
        Self::parse(identifier)
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Error type for the terrain crate.
//
// Every variant is a precondition violation: a call sequence the caller
// should never produce (out-of-range coordinates, mutating geometry after
// the neighbor graph is frozen, resolving an `Unknown` relation, unpaired
// occupancy removal) or a malformed terrain stream. None of them are
// retried. Routine movement refusal is not an error; see
// `locator::MoveRejected`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TerrainError {
    #[error("cell ({x}, {y}) is outside the {length}x{width} grid")]
    OutOfBounds {
        x: i64,
        y: i64,
        length: u32,
        width: u32,
    },

    #[error("neighbor graph already built; terrain geometry is frozen")]
    GraphAlreadyBuilt,

    #[error("neighbor graph has not been built yet")]
    GraphNotBuilt,

    #[error("expected {expected} boundary values, got {actual}")]
    BoundaryCountMismatch { expected: usize, actual: usize },

    #[error("boundary values for cell ({x}, {y}) are not non-decreasing")]
    NonMonotonicBoundaries { x: u32, y: u32 },

    #[error("layer {layer} out of range for a cell with {count} layers")]
    LayerOutOfRange { layer: u8, count: u8 },

    #[error("cannot resolve a target layer from an Unknown relation")]
    UnknownRelation,

    #[error("cell ({x}, {y}) has no walkable layer")]
    NoWalkableSurface { x: u32, y: u32 },

    #[error("occupancy counter would drop below zero")]
    OccupancyUnderflow,

    #[error("occupancy counter is saturated")]
    OccupancyOverflow,

    #[error("locator is bound to a different occupancy overlay")]
    ForeignOccupancy,

    #[error("invalid terrain scale: {0}")]
    InvalidScale(String),

    #[error("grid of {cells} cells exceeds the limit of {max}")]
    GridTooLarge { cells: u64, max: u64 },

    #[error("terrain arena holds {len} entries; offsets must fit in u32")]
    ArenaFull { len: usize },

    #[error("position has a non-finite coordinate")]
    NonFinitePosition,

    #[error("terrain stream I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for terrain operations.
pub type Result<T> = std::result::Result<T, TerrainError>;

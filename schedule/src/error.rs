use snafu::Snafu;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    /// No grid cell satisfies the seed predicate (or truncation left none).
    #[snafu(display("work domain is empty: no grid cell satisfies the seed predicate"))]
    EmptyWorkDomain,

    #[snafu(display("{array} holds {actual} elements, grid needs {expected}"))]
    ShapeMismatch { array: &'static str, expected: usize, actual: usize },

    #[snafu(display("seed query needs a mask, a mapping flag test, or both"))]
    NoPredicate,

    #[snafu(display("launch granularity must be positive, got {granularity}"))]
    InvalidGranularity { granularity: usize },

    #[snafu(display("invalid chunk policy: {reason}"))]
    InvalidPolicy { reason: String },

    #[snafu(display("no chunk is in flight"))]
    NoChunkInFlight,
}

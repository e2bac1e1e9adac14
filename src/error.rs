use thiserror::Error;

/// Why a URI could not be mapped. [`UridMap::map`](crate::UridMap::map)
/// reports every variant as URID `0`.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Error)]
pub enum MapError {
    #[error("empty URI")]
    Empty,
    #[error("urid table exhausted")]
    Overflow,
    #[error("allocator refused to clone URI")]
    AllocFailed,
}

/// Construction failures of a [`UridMap`](crate::UridMap).
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("capacity {requested} does not fit the 32-bit urid space")]
    CapacityOverflow { requested: u64 },
    #[error("failed to allocate slot table")]
    TableAlloc(#[from] std::collections::TryReserveError),
    #[error("static uri #{index} could not be registered: {source}")]
    Static { index: u32, source: MapError },
    #[error("static uri #{index} duplicates static uri #{first}")]
    DuplicateStatic { index: u32, first: u32 },
}

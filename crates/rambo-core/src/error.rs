use thiserror::Error;

/// Errors raised while parsing an iNES image.
#[derive(Debug, Error)]
pub enum LoaderError {
    /// Magic number ("NES<EOF>") is missing.
    #[error("missing NES magic bytes")]
    InvalidMagic,
    /// A ROM section (header/trainer/PRG/CHR) is shorter than advertised.
    #[error("{section} section expected {expected} bytes, got {actual}")]
    TruncatedRom {
        section: &'static str,
        expected: usize,
        actual: usize,
    },
    /// Header advertises a mapper number this core does not implement.
    #[error("mapper {0} is not implemented")]
    UnsupportedMapper(u16),
    /// Header advertises an iNES revision we do not parse.
    #[error("unsupported iNES header revision")]
    UnsupportedVersion,
}

/// Errors raised while decoding or applying a snapshot blob.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// Snapshot was produced by an incompatible core revision.
    #[error("snapshot version {found} does not match supported version {expected}")]
    VersionMismatch { expected: u16, found: u16 },
    /// Snapshot was taken with a different mapper than the loaded cartridge.
    #[error("snapshot mapper {found} does not match loaded mapper {expected}")]
    UnsupportedMapper { expected: u16, found: u16 },
    /// Snapshot region/variant does not match the running configuration.
    #[error("snapshot configuration does not match the running machine")]
    ConfigMismatch,
    /// Blob ends before the serialized state does.
    #[error("snapshot blob is truncated")]
    Truncated,
    /// Underlying codec failure.
    #[error("snapshot codec error: {0}")]
    Codec(#[from] postcard::Error),
}

//! Crate-wide error taxonomy.
//!
//! The teacher split errors three ways (`FatError`/`DirError`/`FileError`);
//! here every layer returns the same flat enum instead, because the cache
//! flush latch (fat.rs), the directory-write rollback (dir.rs) and the VFS
//! path traversal (vfs.rs) all need to compare, store and propagate errors
//! from each other's layer without a conversion dance at every call site.

use core::fmt;

use crate::device::DeviceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The backing store itself failed a read, write or flush.
    Io,
    /// On-disk FAT or directory content violates the structural rules of
    /// the format (bogus cluster number, bad offset, unexpected EOC, a
    /// length that cannot agree with the cluster chain, a bad signature).
    Corruption(Corruption),
    NotFound,
    AlreadyExists,
    IsADirectory,
    IsAFile,
    NotADirectory,
    NoMemory,
    DiskFull,
    /// A file or seek position would exceed the FAT 2^32-1 byte limit.
    FileTooBig,
    FilenameTooLong,
    /// The volume was mounted read-only and a write-access operation was attempted.
    WriteProtect,
    AccessDenied,
    InvalidName,
    TooManySymlinks,
    NotSupported,
    /// The backing store does not look like a FAT volume at all (bad boot signature).
    UnknownFormat,
    /// It has a plausible FAT signature but the geometry fails validation.
    BogusFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Corruption {
    BogusOffset,
    BogusCluster,
    UnexpectedEoc,
    LengthMismatch,
    InvalidSignature,
}

impl From<DeviceError> for Error {
    fn from(_: DeviceError) -> Self {
        Error::Io
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io => write!(f, "backing store I/O error"),
            Error::Corruption(c) => write!(f, "on-disk corruption: {:?}", c),
            Error::NotFound => write!(f, "not found"),
            Error::AlreadyExists => write!(f, "already exists"),
            Error::IsADirectory => write!(f, "is a directory"),
            Error::IsAFile => write!(f, "is a file"),
            Error::NotADirectory => write!(f, "not a directory"),
            Error::NoMemory => write!(f, "out of memory"),
            Error::DiskFull => write!(f, "disk full"),
            Error::FileTooBig => write!(f, "file too big"),
            Error::FilenameTooLong => write!(f, "filename too long"),
            Error::WriteProtect => write!(f, "volume is mounted read-only"),
            Error::AccessDenied => write!(f, "access denied"),
            Error::InvalidName => write!(f, "invalid name"),
            Error::TooManySymlinks => write!(f, "too many symlinks"),
            Error::NotSupported => write!(f, "not supported"),
            Error::UnknownFormat => write!(f, "unknown filesystem format"),
            Error::BogusFormat => write!(f, "invalid FAT geometry"),
        }
    }
}

impl core::error::Error for Error {}

pub type Result<T> = core::result::Result<T, Error>;

//! # Firmware table errors

use crate::sdt::Signature;

/// A firmware table could not be located or failed validation.
///
/// All of these describe firmware data the kernel cannot interpret; the
/// platform layer treats every variant as fatal.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TableError {
    #[error("no RSDP address was handed over by the loader")]
    NullRsdp,
    #[error("RSDP signature mismatch at {0:#x}")]
    BadRsdpSignature(u64),
    #[error("RSDP checksum mismatch at {0:#x}")]
    BadRsdpChecksum(u64),
    #[error("RSDP names neither an RSDT nor an XSDT")]
    NoRootTable,
    #[error("root table {signature} at {addr:#x} is invalid")]
    BadRootTable { signature: Signature, addr: u64 },
    #[error("table {signature} is too short ({length} bytes, need {required})")]
    TooShort {
        signature: Signature,
        length: usize,
        required: usize,
    },
    #[error("table {0} failed checksum validation")]
    BadChecksum(Signature),
    #[error("malformed subtable at offset {offset}: {reason}")]
    MalformedSubtable {
        offset: usize,
        reason: SubtableFault,
    },
}

/// Why a subtable record was rejected.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubtableFault {
    #[error("record header crosses the table end")]
    TruncatedHeader,
    #[error("record declares {length} bytes, less than its own header")]
    TooShort { length: usize },
    #[error("record of {length} bytes crosses the table end")]
    Overrun { length: usize },
    #[error("record type {kind} needs {required} bytes but declares {length}")]
    ShortPayload {
        kind: u8,
        length: usize,
        required: usize,
    },
}

// Copyright 2025 boardkit contributors
// SPDX-License-Identifier: Apache-2.0

//! Classification of kernel return codes from bus transfers.

/// Linux errno values the retry policy treats as transient
pub mod errno {
    pub const EAGAIN: i32 = 11;
    pub const ETIMEDOUT: i32 = 110;
    pub const EREMOTEIO: i32 = 121;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransientKind {
    /// EAGAIN / EWOULDBLOCK
    WouldBlock,
    /// ETIMEDOUT
    TimedOut,
    /// EREMOTEIO, usually a NACK from the remote device
    RemoteIo,
}

impl TransientKind {
    pub fn errno(self) -> i32 {
        match self {
            TransientKind::WouldBlock => errno::EAGAIN,
            TransientKind::TimedOut => errno::ETIMEDOUT,
            TransientKind::RemoteIo => errno::EREMOTEIO,
        }
    }
}

impl std::fmt::Display for TransientKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransientKind::WouldBlock => write!(f, "would block"),
            TransientKind::TimedOut => write!(f, "timed out"),
            TransientKind::RemoteIo => write!(f, "remote I/O error"),
        }
    }
}

/// Outcome of a single transfer attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStatus {
    Ok,
    Transient(TransientKind),
    /// Any other negative return; carries the positive errno
    Fatal(i32),
}

impl TransferStatus {
    /// Classify a return code: non-negative is success, `-errno` otherwise
    pub fn classify(code: i32) -> Self {
        if code >= 0 {
            return TransferStatus::Ok;
        }
        match code.checked_neg().unwrap_or(i32::MAX) {
            errno::EAGAIN => TransferStatus::Transient(TransientKind::WouldBlock),
            errno::ETIMEDOUT => TransferStatus::Transient(TransientKind::TimedOut),
            errno::EREMOTEIO => TransferStatus::Transient(TransientKind::RemoteIo),
            other => TransferStatus::Fatal(other),
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, TransferStatus::Transient(_))
    }
}

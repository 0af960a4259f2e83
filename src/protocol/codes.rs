use crate::error::StoreError;

/// Response error codes. Numeric values are part of the wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCode {
    NoErr = 0x00,
    KeyDoesNotExist = 0x01,
    NoSpace = 0x02,
    SysOverload = 0x03,
    KvInternal = 0x04,
    UnknownCommand = 0x05,
    InvalidKey = 0x06,
    InvalidValue = 0x07,
}

impl ErrorCode {
    pub fn code(self) -> u32 {
        self as u32
    }

    pub fn from_code(code: u32) -> Option<Self> {
        Some(match code {
            0x00 => ErrorCode::NoErr,
            0x01 => ErrorCode::KeyDoesNotExist,
            0x02 => ErrorCode::NoSpace,
            0x03 => ErrorCode::SysOverload,
            0x04 => ErrorCode::KvInternal,
            0x05 => ErrorCode::UnknownCommand,
            0x06 => ErrorCode::InvalidKey,
            0x07 => ErrorCode::InvalidValue,
            _ => return None,
        })
    }
}

impl From<&StoreError> for ErrorCode {
    fn from(err: &StoreError) -> Self {
        match err {
            StoreError::KeyNotFound => ErrorCode::KeyDoesNotExist,
            StoreError::KeyTooLong(_) => ErrorCode::InvalidKey,
            StoreError::ValueTooLong(_) => ErrorCode::InvalidValue,
            StoreError::NoSpace(_) => ErrorCode::NoSpace,
        }
    }
}

impl<T> From<&Result<T, StoreError>> for ErrorCode {
    fn from(result: &Result<T, StoreError>) -> Self {
        match result {
            Ok(_) => ErrorCode::NoErr,
            Err(e) => e.into(),
        }
    }
}

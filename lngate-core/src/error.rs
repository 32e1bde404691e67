use base64::DecodeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Base64DecodeError {0}")]
    Base64Decode(#[from] DecodeError),
}

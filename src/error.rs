use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Invalid route pattern: {0}")]
    InvalidPattern(String),
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

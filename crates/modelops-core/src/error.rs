use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("No model version left after {0}")]
    VersionOverflow(i32),
}

pub type Result<T> = std::result::Result<T, Error>;

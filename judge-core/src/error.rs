use judge_protocol::Verdict;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// The taxonomy of spec §7, collapsed into one enum so every fallible path
/// in this crate can convert to a [`Verdict`] at the case or job boundary
/// via [`Error::to_verdict`].
#[derive(Error, Debug)]
pub enum Error {
    #[error("format error: {0}")]
    Format(#[from] judge_protocol::FormatError),

    #[error("compile error: {0}")]
    Compile(String),

    #[error("unsupported language: {0}")]
    UnknownLanguage(String),

    #[error(transparent)]
    Sandbox(#[from] judge_sandbox::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Zip(#[from] zip::result::ZipError),

    #[error("{0}")]
    System(String),
}

impl Error {
    /// Maps an error to the verdict it should surface as at the nearest
    /// case/job boundary. Never propagated further than that boundary
    /// (spec §7: "errors inside a single case ... never abort the job").
    pub fn to_verdict(&self) -> Verdict {
        match self {
            Error::Format(_) => Verdict::SystemError,
            Error::Compile(_) => Verdict::CompileError,
            Error::UnknownLanguage(_) => Verdict::SystemError,
            Error::Sandbox(_) | Error::Io(_) | Error::Yaml(_) | Error::Zip(_) | Error::System(_) => {
                Verdict::SystemError
            }
        }
    }
}

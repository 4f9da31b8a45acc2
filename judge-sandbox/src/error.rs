use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Nix(#[from] nix::Error),

    #[error("sandbox pool is closed")]
    PoolClosed,

    #[error("resource group controller failed: {0}")]
    ResourceGroup(String),

    #[error("the cgroup handshake socket accepted no connection before the run finished")]
    CgroupHandshakeMissed,

    #[error("sandbox operation timed out")]
    Timeout,
}

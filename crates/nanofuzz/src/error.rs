use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] nanofuzz_core::Error),

    #[error("prefetch worker thread panicked")]
    PrefetchWorkerPanicked,
}

pub type Result<T> = std::result::Result<T, Error>;

use derive_more::From;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, From)]
pub enum Error {
    CliUsage(String),

    // -- Module soft failures, always scoped to one module's run
    InvalidHttpResponse(String),
    ServiceUnavailable(String),
    MissingCsrfToken(String),
    CaptchaDetected(String),
    ShadowBanDetected(String),
    InvalidCredentials(String),
    RateLimited(String),

    #[from]
    File(std::io::Error),

    #[from]
    SystemTime(std::time::SystemTimeError),

    #[from]
    Reqwest(reqwest::Error),

    #[from]
    SerdeJson(serde_json::Error),
}

// region:    --- Error Boilerplate

impl core::fmt::Display for Error {
    fn fmt(&self, fmt: &mut core::fmt::Formatter) -> core::result::Result<(), core::fmt::Error> {
        write!(fmt, "{self:?}")
    }
}

impl std::error::Error for Error {}

// endregion: --- Error Boilerplate

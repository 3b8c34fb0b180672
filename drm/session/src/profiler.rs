use core::fmt;

/**
    Phases of a license acquisition that the player profiles separately.
*/
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProfileBucket {
    /// Session init, init-data binding and challenge generation.
    LicensePreprocess,
    /// The license HTTP exchange, retries included.
    LicenseNetwork,
    /// Feeding the license to the platform session.
    LicensePostprocess,
}

impl ProfileBucket {
    pub const fn to_name(self) -> &'static str {
        match self {
            Self::LicensePreprocess => "LA_PREPROC",
            Self::LicenseNetwork => "LA_NETWORK",
            Self::LicensePostprocess => "LA_POSTPROC",
        }
    }
}

impl fmt::Display for ProfileBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_name())
    }
}

/**
    Receives begin/end timestamps of the license phases.

    Every `begin` is followed by exactly one `end` or `error` for the same
    bucket.
*/
pub trait LicenseProfiler: Send + Sync {
    fn begin(&self, bucket: ProfileBucket);
    fn end(&self, bucket: ProfileBucket);
    fn error(&self, bucket: ProfileBucket);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopProfiler;

impl LicenseProfiler for NoopProfiler {
    fn begin(&self, _bucket: ProfileBucket) {}
    fn end(&self, _bucket: ProfileBucket) {}
    fn error(&self, _bucket: ProfileBucket) {}
}

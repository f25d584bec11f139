use std::fmt;

/// State of the most recent featured-image fetch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CacheStatus {
    #[default]
    Loading,
    Done,
    Error,
}

impl fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CacheStatus::Loading => "loading",
            CacheStatus::Done => "done",
            CacheStatus::Error => "error",
        };
        f.write_str(s)
    }
}

use std::fmt;

/// Stages of an orchestrated run, in the only order they are entered.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub enum Stage {
    Idle,
    ServerStarting,
    ModelLoading,
    Conversing,
    Persisting,
    ModelUnloading,
    ServerStopping,
    CacheCleanup,
    Scoring,
    Done,
}

impl Stage {
    pub const ORDER: [Stage; 10] = [
        Stage::Idle,
        Stage::ServerStarting,
        Stage::ModelLoading,
        Stage::Conversing,
        Stage::Persisting,
        Stage::ModelUnloading,
        Stage::ServerStopping,
        Stage::CacheCleanup,
        Stage::Scoring,
        Stage::Done,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::ServerStarting => "server_starting",
            Self::ModelLoading => "model_loading",
            Self::Conversing => "conversing",
            Self::Persisting => "persisting",
            Self::ModelUnloading => "model_unloading",
            Self::ServerStopping => "server_stopping",
            Self::CacheCleanup => "cache_cleanup",
            Self::Scoring => "scoring",
            Self::Done => "done",
        }
    }

    pub fn next(self) -> Option<Stage> {
        let index = Self::ORDER.iter().position(|stage| *stage == self)?;
        Self::ORDER.get(index + 1).copied()
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

use uuid::Uuid;

/// Strongly typed ID for participants.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Copy, serde::Serialize, serde::Deserialize,
)]
#[serde(transparent)]
pub struct ParticipantId(pub Uuid);

impl Default for ParticipantId {
    fn default() -> Self {
        Self::new()
    }
}

impl ParticipantId {
    pub fn new() -> Self {
        ParticipantId(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    pub fn to_uuid(&self) -> Uuid {
        self.0
    }
}

impl AsRef<Uuid> for ParticipantId {
    fn as_ref(&self) -> &Uuid {
        &self.0
    }
}

impl From<Uuid> for ParticipantId {
    fn from(id: Uuid) -> Self {
        ParticipantId(id)
    }
}

impl std::fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Strongly typed ID for telemetry events.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Copy, serde::Serialize, serde::Deserialize,
)]
#[serde(transparent)]
pub struct EventId(pub Uuid);

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl EventId {
    pub fn new() -> Self {
        EventId(Uuid::new_v4())
    }

    pub fn to_uuid(&self) -> Uuid {
        self.0
    }
}

impl From<Uuid> for EventId {
    fn from(id: Uuid) -> Self {
        EventId(id)
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Strongly typed ID for source-analysis records.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Copy, serde::Serialize, serde::Deserialize,
)]
#[serde(transparent)]
pub struct AnalysisId(pub Uuid);

impl Default for AnalysisId {
    fn default() -> Self {
        Self::new()
    }
}

impl AnalysisId {
    pub fn new() -> Self {
        AnalysisId(Uuid::new_v4())
    }

    pub fn to_uuid(&self) -> Uuid {
        self.0
    }
}

impl From<Uuid> for AnalysisId {
    fn from(id: Uuid) -> Self {
        AnalysisId(id)
    }
}

impl std::fmt::Display for AnalysisId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

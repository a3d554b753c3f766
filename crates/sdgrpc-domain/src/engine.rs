//! Engine module - descriptors for the engines a manager exposes

/// Kind of output an engine produces
///
/// Mirrors the engine categories of the wire schema. The gateway only ever
/// runs picture engines, the other kinds exist so descriptors coming from a
/// manager can be reported faithfully.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EngineKind {
    /// Text generation
    Text,

    /// Image generation
    #[default]
    Picture,

    /// Audio generation
    Audio,

    /// Video generation
    Video,

    /// Classification models
    Classification,

    /// Artifact storage backends
    Storage,
}

impl EngineKind {
    /// Get the kind name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineKind::Text => "text",
            EngineKind::Picture => "picture",
            EngineKind::Audio => "audio",
            EngineKind::Video => "video",
            EngineKind::Classification => "classification",
            EngineKind::Storage => "storage",
        }
    }

    /// Parse a kind from a string (case-insensitive)
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" => Some(EngineKind::Text),
            "picture" | "image" => Some(EngineKind::Picture),
            "audio" => Some(EngineKind::Audio),
            "video" => Some(EngineKind::Video),
            "classification" => Some(EngineKind::Classification),
            "storage" => Some(EngineKind::Storage),
            _ => None,
        }
    }
}

/// Public description of one engine, as enumerated to clients
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineDescriptor {
    /// Engine identifier clients pass in generation requests
    pub id: String,

    /// Human readable name
    pub name: String,

    /// Free-form description
    pub description: String,

    /// What the engine produces
    pub kind: EngineKind,

    /// Who provides the engine
    pub owner: String,

    /// Whether the engine can currently serve requests
    pub ready: bool,

    /// Whether requests without an engine id land here
    pub is_default: bool,
}

impl EngineDescriptor {
    /// Create a ready picture engine descriptor with the given id
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            kind: EngineKind::Picture,
            owner: "stable-diffusion-grpcserver".to_string(),
            ready: true,
            is_default: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_round_trip() {
        for kind in [
            EngineKind::Text,
            EngineKind::Picture,
            EngineKind::Audio,
            EngineKind::Video,
            EngineKind::Classification,
            EngineKind::Storage,
        ] {
            assert_eq!(EngineKind::parse(kind.as_str()), Some(kind));
        }
    }

    #[test]
    fn test_kind_parse_aliases() {
        assert_eq!(EngineKind::parse("IMAGE"), Some(EngineKind::Picture));
        assert_eq!(EngineKind::parse("hologram"), None);
    }

    #[test]
    fn test_descriptor_defaults() {
        let engine = EngineDescriptor::new("sd-v1-5", "Stable Diffusion v1.5");
        assert!(engine.ready);
        assert!(!engine.is_default);
        assert_eq!(engine.kind, EngineKind::Picture);
    }
}

//! Derived artifact types and the creation parameters each one is requested with.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactType {
    MindMap,
    BriefingDoc,
    StudyGuide,
    AudioOverview,
    Infographic,
    Flashcards,
    Quiz,
}

/// Default regeneration set, in creation order.
pub const STANDARD_ARTIFACTS: [ArtifactType; 7] = [
    ArtifactType::MindMap,
    ArtifactType::BriefingDoc,
    ArtifactType::StudyGuide,
    ArtifactType::AudioOverview,
    ArtifactType::Infographic,
    ArtifactType::Flashcards,
    ArtifactType::Quiz,
];

impl ArtifactType {
    /// Stable snake_case key, used in stored state.
    pub fn key(self) -> &'static str {
        match self {
            ArtifactType::MindMap => "mind_map",
            ArtifactType::BriefingDoc => "briefing_doc",
            ArtifactType::StudyGuide => "study_guide",
            ArtifactType::AudioOverview => "audio_overview",
            ArtifactType::Infographic => "infographic",
            ArtifactType::Flashcards => "flashcards",
            ArtifactType::Quiz => "quiz",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            ArtifactType::MindMap => "Mind Map",
            ArtifactType::BriefingDoc => "Briefing Doc",
            ArtifactType::StudyGuide => "Study Guide",
            ArtifactType::AudioOverview => "Audio Overview",
            ArtifactType::Infographic => "Infographic",
            ArtifactType::Flashcards => "Flashcards",
            ArtifactType::Quiz => "Quiz",
        }
    }

    /// Case-insensitive lookup of a name or alias.
    pub fn from_alias(name: &str) -> Option<Self> {
        let t = match name.trim().to_lowercase().as_str() {
            "audio" | "audio_overview" => ArtifactType::AudioOverview,
            "mind_map" | "mindmap" => ArtifactType::MindMap,
            "briefing" | "briefing_doc" => ArtifactType::BriefingDoc,
            "study" | "study_guide" => ArtifactType::StudyGuide,
            "infographic" => ArtifactType::Infographic,
            "flashcards" => ArtifactType::Flashcards,
            "quiz" => ArtifactType::Quiz,
            _ => return None,
        };
        Some(t)
    }

    /// Single-call creation request, or `None` for the two-step mind map.
    pub fn studio_request(self) -> Option<StudioRequest> {
        let req = match self {
            ArtifactType::MindMap => return None,
            ArtifactType::BriefingDoc => StudioRequest::Report {
                format: ReportFormat::BriefingDoc,
            },
            ArtifactType::StudyGuide => StudioRequest::Report {
                format: ReportFormat::StudyGuide,
            },
            ArtifactType::AudioOverview => StudioRequest::Audio {
                format: AudioFormat::DeepDive,
                length: AudioLength::Default,
            },
            ArtifactType::Infographic => StudioRequest::Infographic {
                orientation: Orientation::Landscape,
                detail: DetailLevel::Standard,
            },
            ArtifactType::Flashcards => StudioRequest::Flashcards {
                difficulty: Difficulty::Medium,
            },
            ArtifactType::Quiz => StudioRequest::Quiz {
                question_count: 5,
                difficulty: Difficulty::Medium,
            },
        };
        Some(req)
    }
}

impl fmt::Display for ArtifactType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for ArtifactType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ArtifactType::from_alias(s).ok_or_else(|| format!("unknown artifact type '{s}'"))
    }
}

/// Parse a comma-separated subset. Empty, missing, or wholly unrecognised
/// input yields the standard set; duplicates collapse.
pub fn parse_artifact_list(input: Option<&str>) -> Vec<ArtifactType> {
    let mut parsed: Vec<ArtifactType> = Vec::new();
    for name in input.unwrap_or_default().split(',') {
        match ArtifactType::from_alias(name) {
            Some(t) if !parsed.contains(&t) => parsed.push(t),
            Some(_) => {}
            None if name.trim().is_empty() => {}
            None => tracing::warn!("ignoring unknown artifact type '{}'", name.trim()),
        }
    }
    if parsed.is_empty() {
        STANDARD_ARTIFACTS.to_vec()
    } else {
        parsed
    }
}

// ---------------------------------------------------------------------------
// Creation parameters
// ---------------------------------------------------------------------------

/// Parameters for a single-call artifact creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StudioRequest {
    Report { format: ReportFormat },
    Audio { format: AudioFormat, length: AudioLength },
    Infographic { orientation: Orientation, detail: DetailLevel },
    Flashcards { difficulty: Difficulty },
    Quiz { question_count: u32, difficulty: Difficulty },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReportFormat {
    BriefingDoc,
    StudyGuide,
}

impl ReportFormat {
    pub fn label(self) -> &'static str {
        match self {
            ReportFormat::BriefingDoc => "Briefing Doc",
            ReportFormat::StudyGuide => "Study Guide",
        }
    }
}

/// Generates `code()` (numeric wire code) and `name()` (snake_case) for a
/// parameter enum.
macro_rules! coded_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident = $code:literal => $label:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn code(self) -> u8 {
                match self {
                    $($name::$variant => $code),+
                }
            }

            pub fn name(self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }
        }
    };
}

coded_enum!(AudioFormat {
    DeepDive = 1 => "deep_dive",
    Brief = 2 => "brief",
    Critique = 3 => "critique",
    Debate = 4 => "debate",
});

coded_enum!(AudioLength {
    Short = 1 => "short",
    Default = 2 => "default",
    Long = 3 => "long",
});

coded_enum!(Orientation {
    Landscape = 1 => "landscape",
    Portrait = 2 => "portrait",
    Square = 3 => "square",
});

coded_enum!(DetailLevel {
    Concise = 1 => "concise",
    Standard = 2 => "standard",
    Detailed = 3 => "detailed",
});

coded_enum!(Difficulty {
    Easy = 1 => "easy",
    Medium = 2 => "medium",
    Hard = 3 => "hard",
});

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("audio", ArtifactType::AudioOverview)]
    #[case("Audio_Overview", ArtifactType::AudioOverview)]
    #[case("mindmap", ArtifactType::MindMap)]
    #[case("MIND_MAP", ArtifactType::MindMap)]
    #[case("briefing", ArtifactType::BriefingDoc)]
    #[case("study", ArtifactType::StudyGuide)]
    #[case(" quiz ", ArtifactType::Quiz)]
    fn aliases_resolve(#[case] input: &str, #[case] expected: ArtifactType) {
        assert_eq!(ArtifactType::from_alias(input), Some(expected));
        assert_eq!(input.parse::<ArtifactType>().unwrap(), expected);
    }

    #[test]
    fn subset_parsing_keeps_order_and_dedupes() {
        let parsed = parse_artifact_list(Some("quiz, audio,bogus,QUIZ"));
        assert_eq!(parsed, vec![ArtifactType::Quiz, ArtifactType::AudioOverview]);
    }

    #[rstest]
    #[case(None)]
    #[case(Some(""))]
    #[case(Some("nonsense,,other"))]
    fn unrecognised_input_falls_back_to_standard_set(#[case] input: Option<&str>) {
        assert_eq!(parse_artifact_list(input), STANDARD_ARTIFACTS.to_vec());
    }

    #[test]
    fn only_mind_map_is_two_step() {
        for t in STANDARD_ARTIFACTS {
            assert_eq!(t.studio_request().is_none(), t == ArtifactType::MindMap);
        }
    }

    #[test]
    fn parameter_codes_match_wire_values() {
        assert_eq!(AudioFormat::DeepDive.code(), 1);
        assert_eq!(AudioLength::Default.code(), 2);
        assert_eq!(Orientation::Landscape.code(), 1);
        assert_eq!(DetailLevel::Standard.code(), 2);
        assert_eq!(Difficulty::Medium.code(), 2);
        assert_eq!(Difficulty::Medium.name(), "medium");
        assert_eq!(
            ArtifactType::Quiz.studio_request(),
            Some(StudioRequest::Quiz {
                question_count: 5,
                difficulty: Difficulty::Medium
            })
        );
    }
}

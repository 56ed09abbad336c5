//! Language to voice mapping

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Languages a user can select
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// Russian
    Ru,
    /// English
    En,
}

impl Language {
    /// All supported languages
    pub const ALL: [Self; 2] = [Self::Ru, Self::En];

    /// Short language tag (`ru`, `en`)
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Ru => "ru",
            Self::En => "en",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for Language {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ru" => Ok(Self::Ru),
            "en" => Ok(Self::En),
            other => Err(Error::UnsupportedLanguage(other.to_string())),
        }
    }
}

/// Synthesis engine tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
    /// Concatenative engine, available for every Polly voice
    Standard,
    /// Neural engine
    Neural,
}

impl Engine {
    /// Wire name of the engine
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Neural => "neural",
        }
    }
}

/// Voice and engine used to synthesize one language
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoiceProfile {
    /// Backend voice identifier
    pub voice_id: &'static str,
    /// Synthesis engine
    pub engine: Engine,
}

impl VoiceProfile {
    /// Fixed profile for a language
    ///
    /// Tatyana has no neural variant, so Russian stays on the standard engine.
    #[must_use]
    pub const fn for_language(language: Language) -> Self {
        match language {
            Language::Ru => Self {
                voice_id: "Tatyana",
                engine: Engine::Standard,
            },
            Language::En => Self {
                voice_id: "Matthew",
                engine: Engine::Neural,
            },
        }
    }
}

/// Select the voice profile for a language tag
///
/// # Errors
///
/// Returns `Error::UnsupportedLanguage` for any tag other than `ru` or `en`
pub fn select_voice(tag: &str) -> Result<VoiceProfile> {
    let language: Language = tag.parse()?;
    Ok(VoiceProfile::for_language(language))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_table() {
        let ru = select_voice("ru").unwrap();
        assert_eq!(ru.voice_id, "Tatyana");
        assert_eq!(ru.engine, Engine::Standard);

        let en = select_voice("en").unwrap();
        assert_eq!(en.voice_id, "Matthew");
        assert_eq!(en.engine, Engine::Neural);
    }

    #[test]
    fn test_deterministic() {
        for language in Language::ALL {
            assert_eq!(
                VoiceProfile::for_language(language),
                VoiceProfile::for_language(language)
            );
            assert_eq!(
                select_voice(language.tag()).unwrap(),
                VoiceProfile::for_language(language)
            );
        }
    }

    #[test]
    fn test_unsupported_language() {
        let err = select_voice("fr").unwrap_err();
        assert!(matches!(err, Error::UnsupportedLanguage(tag) if tag == "fr"));
        assert!(matches!(
            select_voice(""),
            Err(Error::UnsupportedLanguage(_))
        ));
    }

    #[test]
    fn test_language_parse_case_insensitive() {
        assert_eq!("RU".parse::<Language>().unwrap(), Language::Ru);
        assert_eq!(" en ".parse::<Language>().unwrap(), Language::En);
    }

    #[test]
    fn test_engine_wire_name() {
        assert_eq!(serde_json::to_string(&Engine::Neural).unwrap(), "\"neural\"");
        assert_eq!(Engine::Standard.as_str(), "standard");
    }
}

//! Read-aloud of the image description.
//!
//! Synthesis itself runs on the user's device; this module decides which of
//! the device's voices to use and tracks whether an utterance is playing so
//! that at most one is active per page.

use crate::{model::Notice, results::has_readable_description};
use serde::{Deserialize, Serialize};

const DEFAULT_LANG: &str = "en-US";
const SYSTEM_VOICE_NAMES: &[&str] = &["Alex", "Samantha", "Daniel", "Fiona"];
const MICROSOFT_VOICE_NAMES: &[&str] = &["david", "zira", "mark"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Voice {
    pub name: String,
    pub lang: String,
    #[serde(default)]
    pub local_service: bool,
    #[serde(default)]
    pub default: bool,
}

impl Voice {
    fn is_english(&self) -> bool {
        self.lang.starts_with("en")
    }

    fn name_contains(&self, needle: &str) -> bool {
        self.name.to_lowercase().contains(needle)
    }
}

type VoicePredicate = fn(&Voice) -> bool;

fn local_google(voice: &Voice) -> bool {
    voice.local_service && voice.name_contains("google")
}

fn local_microsoft_desktop(voice: &Voice) -> bool {
    voice.local_service
        && voice.name_contains("microsoft")
        && MICROSOFT_VOICE_NAMES
            .iter()
            .any(|name| voice.name_contains(name))
}

fn local_system_voice(voice: &Voice) -> bool {
    voice.local_service && SYSTEM_VOICE_NAMES.contains(&voice.name.as_str())
}

fn google_us_english(voice: &Voice) -> bool {
    voice.name_contains("google us english")
}

fn local_us_english(voice: &Voice) -> bool {
    voice.local_service && voice.lang == DEFAULT_LANG
}

fn default_us_english(voice: &Voice) -> bool {
    voice.default && voice.lang == DEFAULT_LANG
}

fn any_default(voice: &Voice) -> bool {
    voice.default
}

fn any(_: &Voice) -> bool {
    true
}

/// Evaluated in order against the English voices, first match wins.
pub const VOICE_PREFERENCES: &[(&str, VoicePredicate)] = &[
    ("local google voice", local_google),
    ("local microsoft desktop voice", local_microsoft_desktop),
    ("local system voice", local_system_voice),
    ("google us english", google_us_english),
    ("local en-US voice", local_us_english),
    ("default en-US voice", default_us_english),
    ("default english voice", any_default),
    ("first english voice", any),
];

pub fn select_voice(voices: &[Voice]) -> Option<&Voice> {
    let english: Vec<&Voice> = voices.iter().filter(|v| v.is_english()).collect();

    VOICE_PREFERENCES.iter().find_map(|(rule, predicate)| {
        let voice = english.iter().copied().find(|v| predicate(v))?;
        tracing::debug!("Selected voice {} via {}", voice.name, rule);
        Some(voice)
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Utterance {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice: Option<Voice>,
    pub lang: String,
    pub pitch: f32,
    pub rate: f32,
    pub volume: f32,
}

impl Utterance {
    pub fn new(text: &str, voices: &[Voice]) -> Self {
        let voice = select_voice(voices).cloned();
        let lang = voice
            .as_ref()
            .map(|v| v.lang.clone())
            .unwrap_or_else(|| DEFAULT_LANG.to_string());

        Self {
            text: text.to_string(),
            voice,
            lang,
            pitch: 1.0,
            rate: 0.95,
            volume: 0.9,
        }
    }
}

/// What the device reported about its synthesis support.
#[derive(Debug, Clone, Deserialize)]
pub struct SpeechEnvironment {
    #[serde(default = "default_supported")]
    pub supported: bool,
    #[serde(default)]
    pub voices: Vec<Voice>,
}

fn default_supported() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum SpeechCommand {
    Speak(Utterance),
    Cancel,
    Notify(Notice),
}

#[derive(Debug, Default)]
pub struct Narrator {
    speaking: bool,
}

impl Narrator {
    pub fn is_speaking(&self) -> bool {
        self.speaking
    }

    /// Starts reading, or cancels when already reading.
    pub fn toggle(&mut self, description: &str, env: &SpeechEnvironment) -> SpeechCommand {
        if !env.supported {
            return SpeechCommand::Notify(Notice::error(
                "Unsupported Feature",
                "Text-to-speech is not supported in your browser.",
            ));
        }

        if self.speaking {
            self.speaking = false;
            return SpeechCommand::Cancel;
        }

        if !has_readable_description(description) {
            return SpeechCommand::Notify(Notice::info(
                "Nothing to read",
                "There is no description available to read aloud.",
            ));
        }

        self.speaking = true;
        SpeechCommand::Speak(Utterance::new(description, &env.voices))
    }

    pub fn finished(&mut self) {
        self.speaking = false;
    }

    pub fn failed(&mut self, error: &str) -> Notice {
        self.speaking = false;
        Notice::error(
            "Speech Error",
            format!(
                "Could not read the description aloud. Error: {}. Ensure your browser has text-to-speech enabled.",
                error
            ),
        )
    }

    /// Called when the description goes away so audio does not outlive it.
    pub fn stop(&mut self) -> Option<SpeechCommand> {
        if std::mem::take(&mut self.speaking) {
            Some(SpeechCommand::Cancel)
        } else {
            None
        }
    }
}

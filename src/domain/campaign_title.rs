use serde::Serialize;
use unicode_segmentation::UnicodeSegmentation;

/// Internal label for a campaign, shown in listings. Not template text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, serde::Deserialize)]
#[serde(try_from = "String")]
pub struct CampaignTitle(String);

impl CampaignTitle {
    pub fn parse(s: String) -> Result<Self, String> {
        let is_empty_or_whitespace = s.trim().is_empty();
        let is_too_long = s.graphemes(true).count() > 256;
        let forbidden_characters = ['/', '(', ')', '"', '<', '>', '\\', '{', '}'];
        let contains_forbidden_characters =
            s.chars().any(|c| forbidden_characters.contains(&c));

        if is_empty_or_whitespace || is_too_long || contains_forbidden_characters {
            Err(format!("{s} is not a valid campaign title."))
        } else {
            Ok(Self(s))
        }
    }
}

impl AsRef<str> for CampaignTitle {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for CampaignTitle {
    type Error = String;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        CampaignTitle::parse(value)
    }
}

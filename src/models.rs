use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Number of hairstyle panels in every report and collage.
pub const HAIRSTYLE_COUNT: usize = 6;
/// Number of complete looks in every report.
pub const OUTFIT_COUNT: usize = 3;

/// Uploaded photo, kept in memory for the lifetime of one request and never
/// written anywhere.
#[derive(Debug, Clone)]
pub struct PhotoUpload {
    pub bytes: Bytes,
    pub mime_type: String,
}

/// Immutable input to the whole generation pipeline, assembled from the
/// multipart form by the inbound boundary.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub photo: PhotoUpload,
    pub height_cm: f32,
    pub weight_kg: Option<f32>,
    pub gender: String,
    pub occasion: String,
    pub style_vibe: Option<String>,
    pub fit_preference: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HairLength {
    Short,
    Medium,
    Long,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HairPart {
    Center,
    Side,
    None,
    Zigzag,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Volume {
    Flat,
    Natural,
    Voluminous,
    Teased,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Texture {
    Straight,
    Wavy,
    Curly,
    Coily,
    Textured,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Silhouette {
    Bob,
    Lob,
    Pixie,
    Crop,
    BuzzCut,
    BluntCut,
    Layers,
    Shag,
    Wolf,
    Mullet,
    CurtainBangs,
    FringeForward,
    SlickBack,
    Pompadour,
    Quiff,
    Undercut,
    Afro,
    Braids,
    Cornrows,
    Twists,
    Locs,
    BunUpdo,
    Ponytail,
    HalfUp,
    BeachWaves,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Down,
    Up,
    PulledBack,
    SideSwept,
}

impl HairLength {
    pub fn as_str(&self) -> &'static str {
        match self {
            HairLength::Short => "short",
            HairLength::Medium => "medium",
            HairLength::Long => "long",
        }
    }
}

impl HairPart {
    pub fn as_str(&self) -> &'static str {
        match self {
            HairPart::Center => "center",
            HairPart::Side => "side",
            HairPart::None => "none",
            HairPart::Zigzag => "zigzag",
        }
    }
}

impl Volume {
    pub fn as_str(&self) -> &'static str {
        match self {
            Volume::Flat => "flat",
            Volume::Natural => "natural",
            Volume::Voluminous => "voluminous",
            Volume::Teased => "teased",
        }
    }
}

impl Texture {
    pub fn as_str(&self) -> &'static str {
        match self {
            Texture::Straight => "straight",
            Texture::Wavy => "wavy",
            Texture::Curly => "curly",
            Texture::Coily => "coily",
            Texture::Textured => "textured",
        }
    }
}

impl Silhouette {
    pub fn as_str(&self) -> &'static str {
        match self {
            Silhouette::Bob => "bob",
            Silhouette::Lob => "lob",
            Silhouette::Pixie => "pixie",
            Silhouette::Crop => "crop",
            Silhouette::BuzzCut => "buzz_cut",
            Silhouette::BluntCut => "blunt_cut",
            Silhouette::Layers => "layers",
            Silhouette::Shag => "shag",
            Silhouette::Wolf => "wolf",
            Silhouette::Mullet => "mullet",
            Silhouette::CurtainBangs => "curtain_bangs",
            Silhouette::FringeForward => "fringe_forward",
            Silhouette::SlickBack => "slick_back",
            Silhouette::Pompadour => "pompadour",
            Silhouette::Quiff => "quiff",
            Silhouette::Undercut => "undercut",
            Silhouette::Afro => "afro",
            Silhouette::Braids => "braids",
            Silhouette::Cornrows => "cornrows",
            Silhouette::Twists => "twists",
            Silhouette::Locs => "locs",
            Silhouette::BunUpdo => "bun_updo",
            Silhouette::Ponytail => "ponytail",
            Silhouette::HalfUp => "half_up",
            Silhouette::BeachWaves => "beach_waves",
        }
    }
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Down => "down",
            Direction::Up => "up",
            Direction::PulledBack => "pulled_back",
            Direction::SideSwept => "side_swept",
        }
    }
}

/// The six categorical axes every hairstyle is described on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HairTraits {
    pub length: HairLength,
    pub part: HairPart,
    pub volume: Volume,
    pub texture: Texture,
    pub silhouette: Silhouette,
    pub direction: Direction,
}

impl HairTraits {
    /// How many of the six axes two hairstyles agree on.
    pub fn shared_with(&self, other: &HairTraits) -> usize {
        [
            self.length == other.length,
            self.part == other.part,
            self.volume == other.volume,
            self.texture == other.texture,
            self.silhouette == other.silhouette,
            self.direction == other.direction,
        ]
        .into_iter()
        .filter(|same| *same)
        .count()
    }
}

/// One of the six hairstyle panels. `traits` is soft so that a model answer
/// missing the block gets rejected by the validator with a readable reason
/// instead of failing the whole JSON parse.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HairstyleCandidate {
    pub index: usize,
    pub name: String,
    pub description: String,
    pub image_query: String,
    #[serde(default)]
    pub traits: Option<HairTraits>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Formality {
    Work,
    Daily,
    DateParty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutfitSilhouette {
    Tailored,
    Relaxed,
    Fitted,
    Flowy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorFamily {
    Neutral,
    Cool,
    Warm,
    Earth,
    Monochrome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShoeType {
    Loafer,
    Sneaker,
    Heel,
    Boot,
    Flat,
}

impl Formality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Formality::Work => "work",
            Formality::Daily => "daily",
            Formality::DateParty => "date_party",
        }
    }
}

impl ShoeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShoeType::Loafer => "loafer",
            ShoeType::Sneaker => "sneaker",
            ShoeType::Heel => "heel",
            ShoeType::Boot => "boot",
            ShoeType::Flat => "flat",
        }
    }
}

/// Categorical axes attached to a look purely for uniqueness checking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiversityTags {
    pub formality: Formality,
    pub silhouette: OutfitSilhouette,
    pub color_family: ColorFamily,
    pub shoe_type: ShoeType,
}

impl DiversityTags {
    /// How many of the four axes two looks agree on.
    pub fn shared_with(&self, other: &DiversityTags) -> usize {
        [
            self.formality == other.formality,
            self.silhouette == other.silhouette,
            self.color_family == other.color_family,
            self.shoe_type == other.shoe_type,
        ]
        .into_iter()
        .filter(|same| *same)
        .count()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutfitItem {
    #[serde(default)]
    pub category: Option<String>,
    pub name: String,
    pub color: String,
    pub image_query: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutfitCandidate {
    pub title: String,
    pub description: String,
    pub why_it_works: String,
    #[serde(default)]
    pub diversity_tags: Option<DiversityTags>,
    pub items: Vec<OutfitItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonalColor {
    pub season: String,
    pub description: String,
    pub palette: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Analysis {
    pub body_shape: String,
    pub face_shape: String,
    pub notes: String,
}

/// One full parsed generation attempt. Ephemeral: dropped unless both
/// validators accept it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StyleReport {
    pub personal_color: PersonalColor,
    pub analysis: Analysis,
    pub styling_rules: Vec<String>,
    pub outfits: Vec<OutfitCandidate>,
    pub hairstyles: Vec<HairstyleCandidate>,
}

pub const COLLAGE_NOTE: &str = "Screenshot and crop any style you like.";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HairCollage {
    pub mime: String,
    pub base64: String,
    pub note: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub result: StyleReport,
    pub hair_collage: Option<HairCollage>,
    pub generated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn hairstyle_tokens_parse_into_typed_traits() {
        let candidate: HairstyleCandidate = serde_json::from_value(json!({
            "index": 2,
            "name": "Glass Slick",
            "description": "High-shine, combed straight back",
            "image_query": "slick back hairstyle",
            "traits": {
                "length": "medium",
                "part": "none",
                "volume": "flat",
                "texture": "straight",
                "silhouette": "slick_back",
                "direction": "pulled_back"
            }
        }))
        .unwrap();
        let traits = candidate.traits.unwrap();
        assert_eq!(traits.part, HairPart::None);
        assert_eq!(traits.silhouette, Silhouette::SlickBack);
        assert_eq!(traits.direction, Direction::PulledBack);
    }

    #[test]
    fn unknown_trait_tokens_are_a_parse_error() {
        let result: Result<HairTraits, _> = serde_json::from_value(json!({
            "length": "gigantic",
            "part": "side",
            "volume": "flat",
            "texture": "straight",
            "silhouette": "bob",
            "direction": "down"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn missing_traits_block_still_parses() {
        let candidate: HairstyleCandidate = serde_json::from_value(json!({
            "index": 0,
            "name": "Classic Taper",
            "description": "Clean and short",
            "image_query": "classic taper"
        }))
        .unwrap();
        assert!(candidate.traits.is_none());
    }

    #[test]
    fn outfit_tag_tokens_parse() {
        let tags: DiversityTags = serde_json::from_value(json!({
            "formality": "date_party",
            "silhouette": "flowy",
            "color_family": "monochrome",
            "shoe_type": "heel"
        }))
        .unwrap();
        assert_eq!(tags.formality, Formality::DateParty);
        assert_eq!(tags.shoe_type, ShoeType::Heel);
    }

    #[test]
    fn shared_trait_count_matches_field_agreement() {
        let a = HairTraits {
            length: HairLength::Short,
            part: HairPart::Side,
            volume: Volume::Natural,
            texture: Texture::Straight,
            silhouette: Silhouette::Crop,
            direction: Direction::Down,
        };
        let b = HairTraits {
            silhouette: Silhouette::Lob,
            length: HairLength::Long,
            ..a
        };
        assert_eq!(a.shared_with(&b), 4);
        assert_eq!(a.shared_with(&a), 6);
    }

    #[test]
    fn response_without_a_collage_serializes_to_null() {
        let response = GenerateResponse {
            result: StyleReport {
                personal_color: PersonalColor {
                    season: "Cool Summer".to_string(),
                    description: "Soft, cool undertones".to_string(),
                    palette: vec!["#A3B8CC".to_string()],
                },
                analysis: Analysis {
                    body_shape: "hourglass".to_string(),
                    face_shape: "heart".to_string(),
                    notes: "Soft features, light contrast.".to_string(),
                },
                styling_rules: vec![],
                outfits: vec![],
                hairstyles: vec![],
            },
            hair_collage: None,
            generated_at: Utc::now(),
        };
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["hair_collage"], serde_json::Value::Null);
        assert_eq!(value["result"]["personal_color"]["season"], "Cool Summer");
    }
}

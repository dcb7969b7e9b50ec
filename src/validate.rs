use std::collections::{HashMap, HashSet};

use crate::models::{
    HairLength, HairTraits, HairstyleCandidate, OutfitCandidate, Silhouette,
    HAIRSTYLE_COUNT, OUTFIT_COUNT,
};

/// Accept/reject decision with the first violated rule as the reason.
/// Checks run in a fixed order, so the same input always produces the same
/// verdict and reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub ok: bool,
    pub reason: Option<String>,
}

impl Verdict {
    fn pass() -> Self {
        Self { ok: true, reason: None }
    }

    fn fail(reason: impl Into<String>) -> Self {
        Self {
            ok: false,
            reason: Some(reason.into()),
        }
    }
}

/// Pairwise-similarity rejection thresholds. These are tuning values, not
/// derivable constants: a pair of hairstyles is rejected when it shares at
/// least `hair_shared_traits` of the six trait axes, a pair of outfits when
/// it shares at least `outfit_shared_tags` of the four tag axes.
#[derive(Debug, Clone, Copy)]
pub struct SimilarityLimits {
    pub hair_shared_traits: usize,
    pub outfit_shared_tags: usize,
}

impl Default for SimilarityLimits {
    fn default() -> Self {
        Self {
            hair_shared_traits: 4,
            outfit_shared_tags: 3,
        }
    }
}

/// Case-insensitive, punctuation-normalized key for duplicate detection:
/// only alphanumerics survive, so "Slick-Back!" and "slick back" collide.
fn normalized(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric())
        .collect::<String>()
        .to_lowercase()
}

pub fn validate_hairstyles(
    hairstyles: &[HairstyleCandidate],
    limits: &SimilarityLimits,
) -> Verdict {
    // 1. Collection size and index/position agreement.
    if hairstyles.len() != HAIRSTYLE_COUNT {
        return Verdict::fail(format!(
            "expected {} hairstyles, got {}",
            HAIRSTYLE_COUNT,
            hairstyles.len()
        ));
    }
    for (position, style) in hairstyles.iter().enumerate() {
        if style.index != position {
            return Verdict::fail(format!(
                "hairstyle at position {} carries index {}",
                position, style.index
            ));
        }
    }

    // 2. Duplicate names.
    let mut names: HashSet<String> = HashSet::new();
    for style in hairstyles {
        if !names.insert(normalized(&style.name)) {
            return Verdict::fail(format!("duplicate hairstyle name: \"{}\"", style.name));
        }
    }

    // 3. Trait blocks must be present.
    let mut traits: Vec<&HairTraits> = Vec::with_capacity(hairstyles.len());
    for style in hairstyles {
        match &style.traits {
            Some(t) => traits.push(t),
            None => {
                return Verdict::fail(format!(
                    "hairstyle \"{}\" is missing its traits block",
                    style.name
                ));
            }
        }
    }

    // 4. Strong signature uniqueness.
    let mut signatures: HashMap<(HairLength, Silhouette), usize> = HashMap::new();
    for (position, t) in traits.iter().enumerate() {
        if let Some(first) = signatures.insert((t.length, t.silhouette), position) {
            return Verdict::fail(format!(
                "duplicate hair signature ({}, {}) shared by \"{}\" and \"{}\"",
                t.length.as_str(),
                t.silhouette.as_str(),
                hairstyles[first].name,
                hairstyles[position].name
            ));
        }
    }

    // 5. Pairwise similarity threshold.
    for i in 0..traits.len() {
        for j in (i + 1)..traits.len() {
            let shared = traits[i].shared_with(traits[j]);
            if shared >= limits.hair_shared_traits {
                return Verdict::fail(format!(
                    "hairstyles \"{}\" and \"{}\" share {} of 6 traits",
                    hairstyles[i].name, hairstyles[j].name, shared
                ));
            }
        }
    }

    Verdict::pass()
}

pub fn validate_outfits(outfits: &[OutfitCandidate], limits: &SimilarityLimits) -> Verdict {
    // 1. Collection size.
    if outfits.len() != OUTFIT_COUNT {
        return Verdict::fail(format!(
            "expected {} outfits, got {}",
            OUTFIT_COUNT,
            outfits.len()
        ));
    }

    // 2. Duplicate titles.
    let mut titles: HashSet<String> = HashSet::new();
    for outfit in outfits {
        if !titles.insert(normalized(&outfit.title)) {
            return Verdict::fail(format!("duplicate outfit title: \"{}\"", outfit.title));
        }
    }

    // 3. Tag blocks and item categories must be present.
    let mut tags = Vec::with_capacity(outfits.len());
    for outfit in outfits {
        match &outfit.diversity_tags {
            Some(t) => tags.push(t),
            None => {
                return Verdict::fail(format!(
                    "outfit \"{}\" is missing its diversity tags",
                    outfit.title
                ));
            }
        }
    }
    for outfit in outfits {
        for item in &outfit.items {
            if item.category.as_deref().map(str::trim).unwrap_or("").is_empty() {
                return Verdict::fail(format!(
                    "item \"{}\" in outfit \"{}\" is missing a category",
                    item.name, outfit.title
                ));
            }
        }
    }

    // 4. Strong signature uniqueness.
    let mut signatures = HashMap::new();
    for (position, t) in tags.iter().enumerate() {
        if let Some(first) = signatures.insert((t.formality, t.shoe_type), position) {
            return Verdict::fail(format!(
                "outfit signature collision ({}, {}) between \"{}\" and \"{}\"",
                t.formality.as_str(),
                t.shoe_type.as_str(),
                outfits[first].title,
                outfits[position].title
            ));
        }
    }

    // 5. Pairwise similarity threshold.
    for i in 0..tags.len() {
        for j in (i + 1)..tags.len() {
            let shared = tags[i].shared_with(tags[j]);
            if shared >= limits.outfit_shared_tags {
                return Verdict::fail(format!(
                    "outfits \"{}\" and \"{}\" share {} of 4 diversity tags",
                    outfits[i].title, outfits[j].title, shared
                ));
            }
        }
    }

    // 6. Item category uniqueness, then cross-outfit (category, name)
    // uniqueness.
    for outfit in outfits {
        let mut categories: HashSet<String> = HashSet::new();
        for item in &outfit.items {
            let category = item.category.as_deref().unwrap_or_default();
            if !categories.insert(normalized(category)) {
                return Verdict::fail(format!(
                    "outfit \"{}\" repeats item category \"{}\"",
                    outfit.title, category
                ));
            }
        }
    }
    let mut pairs: HashSet<(String, String)> = HashSet::new();
    for outfit in outfits {
        for item in &outfit.items {
            let category = item.category.as_deref().unwrap_or_default();
            if !pairs.insert((normalized(category), normalized(&item.name))) {
                return Verdict::fail(format!(
                    "item \"{}\" ({}) appears in more than one outfit",
                    item.name, category
                ));
            }
        }
    }

    Verdict::pass()
}

/// Builders for well-formed sets, shared by the controller tests.
#[cfg(test)]
pub(crate) mod fixtures {
    use crate::models::*;

    pub fn hairstyle(
        index: usize,
        name: &str,
        length: HairLength,
        part: HairPart,
        volume: Volume,
        texture: Texture,
        silhouette: Silhouette,
        direction: Direction,
    ) -> HairstyleCandidate {
        HairstyleCandidate {
            index,
            name: name.to_string(),
            description: format!("{name} kept salon-realistic"),
            image_query: format!("{name} hairstyle reference"),
            traits: Some(HairTraits {
                length,
                part,
                volume,
                texture,
                silhouette,
                direction,
            }),
        }
    }

    /// Six styles with unique signatures and low pairwise overlap.
    pub fn diverse_hairstyles() -> Vec<HairstyleCandidate> {
        vec![
            hairstyle(
                0,
                "Classic Taper",
                HairLength::Short,
                HairPart::Side,
                Volume::Natural,
                Texture::Straight,
                Silhouette::Crop,
                Direction::Down,
            ),
            hairstyle(
                1,
                "Textured Quiff",
                HairLength::Short,
                HairPart::Center,
                Volume::Voluminous,
                Texture::Wavy,
                Silhouette::Quiff,
                Direction::Up,
            ),
            hairstyle(
                2,
                "Glass Slick",
                HairLength::Medium,
                HairPart::None,
                Volume::Flat,
                Texture::Straight,
                Silhouette::SlickBack,
                Direction::PulledBack,
            ),
            hairstyle(
                3,
                "Soft Curl Bob",
                HairLength::Medium,
                HairPart::Center,
                Volume::Natural,
                Texture::Curly,
                Silhouette::Bob,
                Direction::Down,
            ),
            hairstyle(
                4,
                "Swept Layers",
                HairLength::Long,
                HairPart::Side,
                Volume::Voluminous,
                Texture::Wavy,
                Silhouette::Layers,
                Direction::SideSwept,
            ),
            hairstyle(
                5,
                "Sculpted Updo",
                HairLength::Long,
                HairPart::None,
                Volume::Teased,
                Texture::Coily,
                Silhouette::BunUpdo,
                Direction::PulledBack,
            ),
        ]
    }

    pub fn outfit(
        title: &str,
        formality: Formality,
        silhouette: OutfitSilhouette,
        color_family: ColorFamily,
        shoe_type: ShoeType,
        items: &[(&str, &str)],
    ) -> OutfitCandidate {
        OutfitCandidate {
            title: title.to_string(),
            description: format!("{title} built around the occasion"),
            why_it_works: "Balances the proportions seen in the photo".to_string(),
            diversity_tags: Some(DiversityTags {
                formality,
                silhouette,
                color_family,
                shoe_type,
            }),
            items: items
                .iter()
                .map(|(category, name)| OutfitItem {
                    category: Some(category.to_string()),
                    name: name.to_string(),
                    color: "navy".to_string(),
                    image_query: format!("{name} product photo"),
                })
                .collect(),
        }
    }

    /// Three looks with unique signatures and disjoint tags.
    pub fn diverse_outfits() -> Vec<OutfitCandidate> {
        vec![
            outfit(
                "Boardroom Sharp",
                Formality::Work,
                OutfitSilhouette::Tailored,
                ColorFamily::Neutral,
                ShoeType::Loafer,
                &[
                    ("top", "Oxford shirt"),
                    ("bottom", "Pleated trousers"),
                    ("shoes", "Penny loafers"),
                ],
            ),
            outfit(
                "Weekend Layers",
                Formality::Daily,
                OutfitSilhouette::Relaxed,
                ColorFamily::Earth,
                ShoeType::Sneaker,
                &[
                    ("top", "Heavy knit"),
                    ("bottom", "Straight denim"),
                    ("shoes", "Court sneakers"),
                ],
            ),
            outfit(
                "Evening Edge",
                Formality::DateParty,
                OutfitSilhouette::Fitted,
                ColorFamily::Monochrome,
                ShoeType::Heel,
                &[
                    ("top", "Silk blouse"),
                    ("bottom", "Column skirt"),
                    ("shoes", "Block heels"),
                ],
            ),
        ]
    }
}

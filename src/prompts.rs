use std::fmt::Write;

use crate::models::{GenerationRequest, HairstyleCandidate, HAIRSTYLE_COUNT, OUTFIT_COUNT};
use crate::validate::SimilarityLimits;

/// Collage geometry. The grid shape and which panel carries the primary
/// recommendation are configuration: they must match whatever layout the
/// image model is asked to produce, so nothing here computes them.
#[derive(Debug, Clone, Copy)]
pub struct CollageLayout {
    pub rows: usize,
    pub cols: usize,
    pub primary_index: usize,
}

impl Default for CollageLayout {
    fn default() -> Self {
        Self {
            rows: 2,
            cols: 3,
            primary_index: 1,
        }
    }
}

fn height_imperial(height_cm: f32) -> String {
    let feet = (height_cm / 30.48).floor() as i32;
    let inches = ((height_cm % 30.48) / 2.54).round() as i32;
    format!("{feet}'{inches}\"")
}

fn weight_lbs(weight_kg: f32) -> i32 {
    (weight_kg / 0.453592).round() as i32
}

/// Base instruction for the structured styling report, plus the feedback
/// block naming the prior rejection reason (absent on the first attempt).
pub fn style_report_instruction(
    request: &GenerationRequest,
    limits: &SimilarityLimits,
    feedback: Option<&str>,
) -> String {
    let mut prompt = String::with_capacity(4_096);

    let _ = writeln!(
        prompt,
        "You are a world-class personal stylist. Analyze the uploaded photo and the \
         user details below, then generate recommendations that are realistic, \
         flattering, and appropriate for the user's situation.\n"
    );

    let _ = writeln!(prompt, "User details:");
    let _ = writeln!(prompt, "- Gender: {}", request.gender);
    let _ = writeln!(
        prompt,
        "- Height: {} cm ({})",
        request.height_cm,
        height_imperial(request.height_cm)
    );
    let _ = writeln!(prompt, "- Occasion: {}", request.occasion);
    if let Some(weight) = request.weight_kg {
        let _ = writeln!(prompt, "- Weight: {} kg ({} lbs)", weight, weight_lbs(weight));
    }
    if let Some(vibe) = &request.style_vibe {
        let _ = writeln!(prompt, "- Preferred Vibe: {vibe}");
    }
    if let Some(fit) = &request.fit_preference {
        let _ = writeln!(prompt, "- Fit Preference: {fit}");
    }

    let _ = writeln!(
        prompt,
        "\nCritical rules (must follow):\n\
         1) Do NOT give extreme, costume-like, or niche styles unless the user explicitly asked for it.\n\
         2) Every recommendation must be justified by visible traits in the photo (proportions, face shape, vibe, contrast).\n\
         3) Prioritize flattering fit, balanced proportions, and clean color harmony. When unsure, choose classic, safe options.\n\
         4) Respect the Occasion strictly: Interview/Work means polished, minimal, low-risk; Daily means practical; Date/Party may be slightly bolder, never extreme.\n\
         5) Respect Preferred Vibe and Fit Preference when provided (\"Slim-No\" means no tight fits, \"Oversized-No\" means no oversized fits)."
    );

    let _ = writeln!(
        prompt,
        "\nHAIRSTYLE RULES (STRICT):\n\
         - Exactly {count} hairstyles, indexed 0 to {last}. The array order MUST match the index order: hairstyles[0] has index 0, hairstyles[{last}] has index {last}.\n\
         - Every hairstyle carries a traits object using ONLY these tokens:\n\
           length: short | medium | long\n\
           part: center | side | none | zigzag\n\
           volume: flat | natural | voluminous | teased\n\
           texture: straight | wavy | curly | coily | textured\n\
           silhouette: bob | lob | pixie | crop | buzz_cut | blunt_cut | layers | shag | wolf | mullet | curtain_bangs | fringe_forward | slick_back | pompadour | quiff | undercut | afro | braids | cornrows | twists | locs | bun_updo | ponytail | half_up | beach_waves\n\
           direction: down | up | pulled_back | side_swept\n\
         - No two hairstyles may share the same (length, silhouette) pair.\n\
         - No two hairstyles may agree on {hair_limit} or more of the six trait fields.\n\
         - No two hairstyles may share a name. Keep every change salon-achievable: natural colors, no wigs.",
        count = HAIRSTYLE_COUNT,
        last = HAIRSTYLE_COUNT - 1,
        hair_limit = limits.hair_shared_traits
    );

    let _ = writeln!(
        prompt,
        "\nOUTFIT RULES (STRICT):\n\
         - Exactly {count} complete looks aligned with the Occasion and Vibe.\n\
         - Every outfit carries a diversity_tags object using ONLY these tokens:\n\
           formality: work | daily | date_party\n\
           silhouette: tailored | relaxed | fitted | flowy\n\
           color_family: neutral | cool | warm | earth | monochrome\n\
           shoe_type: loafer | sneaker | heel | boot | flat\n\
         - No two outfits may share the same (formality, shoe_type) pair.\n\
         - No two outfits may agree on {tag_limit} or more of the four tag fields.\n\
         - No two outfits may share a title.\n\
         - Within one outfit every item has a distinct category; across all outfits no (category, name) pair repeats.",
        count = OUTFIT_COUNT,
        tag_limit = limits.outfit_shared_tags
    );

    let _ = writeln!(
        prompt,
        "\nAlso perform internally: personal color guidance with a 5-color HEX palette; \
         ONE body shape keyword and ONE face shape keyword; short actionable styling rules."
    );

    let _ = writeln!(
        prompt,
        "\nOutput ONLY valid JSON with EXACTLY this schema. No markdown, comments, or extra text.\n\
         {{\n\
           \"personal_color\": {{\"season\": \"String\", \"description\": \"String\", \"palette\": [\"#Hex\", \"#Hex\", \"#Hex\", \"#Hex\", \"#Hex\"]}},\n\
           \"analysis\": {{\"body_shape\": \"KEYWORD_ONLY\", \"face_shape\": \"KEYWORD_ONLY\", \"notes\": \"2-4 sentences tied to visible traits\"}},\n\
           \"styling_rules\": [\"String\", \"String\", \"String\", \"String\"],\n\
           \"outfits\": [\n\
             {{\"title\": \"String\", \"description\": \"String\", \"why_it_works\": \"String\",\n\
               \"diversity_tags\": {{\"formality\": \"token\", \"silhouette\": \"token\", \"color_family\": \"token\", \"shoe_type\": \"token\"}},\n\
               \"items\": [{{\"category\": \"top\", \"name\": \"Item Name\", \"color\": \"Color\", \"image_query\": \"search keywords\"}}]}}\n\
           ],\n\
           \"hairstyles\": [\n\
             {{\"index\": 0, \"name\": \"String\", \"description\": \"String\", \"image_query\": \"search keywords\",\n\
               \"traits\": {{\"length\": \"token\", \"part\": \"token\", \"volume\": \"token\", \"texture\": \"token\", \"silhouette\": \"token\", \"direction\": \"token\"}}}}\n\
           ]\n\
         }}"
    );

    if let Some(reason) = feedback {
        let _ = writeln!(
            prompt,
            "\nPREVIOUS ATTEMPT REJECTED: {reason}\n\
             Regenerate the complete JSON from scratch and fix this specific problem \
             while keeping every rule above satisfied."
        );
    }

    prompt
}

/// Per-panel spec lines in strict index order, one per accepted hairstyle.
fn panel_specs(hairstyles: &[HairstyleCandidate]) -> String {
    let mut spec = String::new();
    for style in hairstyles {
        match &style.traits {
            Some(t) => {
                let _ = writeln!(
                    spec,
                    "[{}] {} - length: {}, part: {}, volume: {}, texture: {}, silhouette: {}, direction: {}",
                    style.index,
                    style.name,
                    t.length.as_str(),
                    t.part.as_str(),
                    t.volume.as_str(),
                    t.texture.as_str(),
                    t.silhouette.as_str(),
                    t.direction.as_str()
                );
            }
            None => {
                let _ = writeln!(spec, "[{}] {} - {}", style.index, style.name, style.description);
            }
        }
    }
    spec
}

/// Instruction for the collage image derived from an accepted hairstyle set.
/// Pure: panel order, grid shape and the primary panel come from the inputs.
pub fn collage_instruction(hairstyles: &[HairstyleCandidate], layout: &CollageLayout) -> String {
    let panels = layout.rows * layout.cols;
    let mut prompt = String::with_capacity(2_048);

    let _ = writeln!(
        prompt,
        "Using the uploaded photo as the ONLY identity reference, generate ONE single image \
         that is a {rows}x{cols} collage of {panels} hairstyle variations.\n",
        rows = layout.rows,
        cols = layout.cols,
    );
    let _ = writeln!(
        prompt,
        "ABSOLUTE CONSTRAINTS:\n\
         - Output exactly ONE square image, a perfectly aligned {rows}x{cols} grid of evenly sized panels.\n\
         - The person MUST be the exact same individual as the uploaded photo in ALL {panels} panels: same face, \
           skin tone, age, expression, camera distance, lighting, clothing, and neutral background.\n\
         - Only the hair changes between panels. Hair color stays natural and consistent with the photo.\n\
         - Each panel is portrait/upper-body only. Keep everything salon-achievable: no wigs, no fantasy colors.",
        rows = layout.rows,
        cols = layout.cols,
    );
    let _ = writeln!(
        prompt,
        "\nPANEL-BY-PANEL SPEC (apply exactly, left-to-right then top-to-bottom):\n{}",
        panel_specs(hairstyles)
    );
    let _ = writeln!(
        prompt,
        "Panel {primary} is the PRIMARY recommendation; render it with the most care.\n\
         Add a small index label in the bottom-right corner of each panel: 0 through {last}, \
         in reading order. Small simple font, subtle but readable. No other text anywhere.",
        primary = layout.primary_index,
        last = panels.saturating_sub(1),
    );
    let _ = writeln!(
        prompt,
        "\nNEGATIVE: different person, face change, identity drift, altered facial features, \
         duplicated face, blurry, cartoon, illustration, painting."
    );

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::fixtures::diverse_hairstyles;
    use bytes::Bytes;
    use crate::models::{GenerationRequest, PhotoUpload};

    fn request() -> GenerationRequest {
        GenerationRequest {
            photo: PhotoUpload {
                bytes: Bytes::from_static(b"\xff\xd8\xff"),
                mime_type: "image/jpeg".to_string(),
            },
            height_cm: 172.0,
            weight_kg: Some(64.0),
            gender: "female".to_string(),
            occasion: "Interview".to_string(),
            style_vibe: Some("Minimal".to_string()),
            fit_preference: None,
        }
    }

    #[test]
    fn base_instruction_carries_user_details_and_thresholds() {
        let limits = SimilarityLimits::default();
        let prompt = style_report_instruction(&request(), &limits, None);
        assert!(prompt.contains("Occasion: Interview"));
        assert!(prompt.contains("172 cm (5'8\")"));
        assert!(prompt.contains("141 lbs"));
        assert!(prompt.contains("Preferred Vibe: Minimal"));
        assert!(prompt.contains("agree on 4 or more of the six trait fields"));
        assert!(prompt.contains("agree on 3 or more of the four tag fields"));
        assert!(!prompt.contains("PREVIOUS ATTEMPT REJECTED"));
    }

    #[test]
    fn feedback_block_appears_only_when_given() {
        let limits = SimilarityLimits::default();
        let reason = "duplicate hair signature (medium, bob)";
        let prompt = style_report_instruction(&request(), &limits, Some(reason));
        assert!(prompt.contains("PREVIOUS ATTEMPT REJECTED: duplicate hair signature (medium, bob)"));
    }

    #[test]
    fn collage_panels_come_out_in_index_order() {
        let layout = CollageLayout::default();
        let prompt = collage_instruction(&diverse_hairstyles(), &layout);
        let positions: Vec<usize> = (0..6)
            .map(|i| prompt.find(&format!("[{i}] ")).expect("panel line missing"))
            .collect();
        for pair in positions.windows(2) {
            assert!(pair[0] < pair[1], "panel lines out of order");
        }
        assert!(prompt.contains("2x3 collage of 6 hairstyle variations"));
        assert!(prompt.contains("Panel 1 is the PRIMARY recommendation"));
        assert!(prompt.contains("0 through 5"));
    }

    #[test]
    fn collage_spec_lists_the_trait_tuple() {
        let layout = CollageLayout::default();
        let prompt = collage_instruction(&diverse_hairstyles(), &layout);
        assert!(prompt.contains(
            "[0] Classic Taper - length: short, part: side, volume: natural, \
             texture: straight, silhouette: crop, direction: down"
        ));
    }

    #[test]
    fn layout_is_configuration_not_computed() {
        let layout = CollageLayout {
            rows: 3,
            cols: 2,
            primary_index: 4,
        };
        let prompt = collage_instruction(&diverse_hairstyles(), &layout);
        assert!(prompt.contains("3x2 collage"));
        assert!(prompt.contains("Panel 4 is the PRIMARY recommendation"));
    }
}

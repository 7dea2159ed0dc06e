//! Homepage marketing sections: keyed JSON blobs edited from the dashboard.

use serde_json::{json, Map, Value};

pub const HERO_BANNERS: &str = "hero_banners";
pub const ACHIEVEMENTS_TITLE: &str = "achievements_title";
pub const BRAND_INTRO: &str = "brand_intro";
pub const CTA: &str = "cta";
pub const ABOUT_US: &str = "about_us";
pub const TRUSTED_SECTION: &str = "trusted_section";

pub const SECTION_KEYS: &[&str] = &[
    HERO_BANNERS,
    ACHIEVEMENTS_TITLE,
    BRAND_INTRO,
    CTA,
    ABOUT_US,
    TRUSTED_SECTION,
];

const ABOUT_US_TEXT: &str = "We curate colorful and unique ensembles from pre-loved pieces \
inspired by early-2000s Filipino fashion icons. Our mission is to bring Y2K vibes to your \
wardrobe while promoting sustainable fashion through thrifting.";

/// Content shipped with a fresh install, in section-key order.
#[must_use]
pub fn default_sections() -> Vec<(&'static str, Value)> {
    vec![
        (ACHIEVEMENTS_TITLE, json!("Some of Our Achievements")),
        (
            HERO_BANNERS,
            json!([
                {
                    "id": "banner1",
                    "title": "The concept",
                    "subtitle": "Home - The concept",
                    "description": "Dive into the Walang Basagan ng Thrift universe!",
                    "image": "https://images.unsplash.com/photo-1483985988355-763728e1935b?w=1920&h=1080&fit=crop"
                },
                {
                    "id": "banner2",
                    "title": "Y2K Collection",
                    "subtitle": "Home - Collection",
                    "description": "Explore our curated selection of authentic Y2K thrifted pieces.",
                    "image": "https://images.unsplash.com/photo-1441986300917-64674bd600d8?w=1920&h=1080&fit=crop"
                },
                {
                    "id": "banner3",
                    "title": "Vintage Finds",
                    "subtitle": "Home - Vintage",
                    "description": "Discover unique pre-loved clothing from the 90s and 2000s.",
                    "image": "https://images.unsplash.com/photo-1490481651871-ab68de25d43d?w=1920&h=1080&fit=crop"
                }
            ]),
        ),
        (
            BRAND_INTRO,
            json!({
                "title": "Walang Basagan ng Thrift is ...",
                "headline": "The brand that brightens up your wardrobe!",
                "paragraph1": "We curate colorful and unique ensembles...",
                "paragraph2": "What is more, we hunt quality, iconic vintage clothing...",
                "image": ""
            }),
        ),
        (
            CTA,
            json!({ "title": "Shop Y2K Thrift", "buttonText": "Browse Collection" }),
        ),
        (
            ABOUT_US,
            json!({
                "title": "About Us",
                "headline": "Walang Basagan ng Thrift",
                "sub_text": ABOUT_US_TEXT,
                "image": ""
            }),
        ),
        (
            TRUSTED_SECTION,
            json!({ "title": "They Trusted Us", "review_ids": [] }),
        ),
    ]
}

/// Serialize section content for storage.
///
/// Strings are stored verbatim so hand-edited rows stay readable.
#[must_use]
pub fn encode_content(content: &Value) -> String {
    match content {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Decode stored section content. Text that is not valid JSON comes back as a
/// JSON string.
#[must_use]
pub fn decode_content(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// Assemble `(key, stored text)` rows into the object served to clients.
pub fn assemble<I, K, S>(rows: I) -> Map<String, Value>
where
    I: IntoIterator<Item = (K, S)>,
    K: Into<String>,
    S: AsRef<str>,
{
    rows.into_iter()
        .map(|(key, raw)| (key.into(), decode_content(raw.as_ref())))
        .collect()
}

/// Parse a comma-separated id list, dropping anything that is not a positive integer.
#[must_use]
pub fn parse_id_list(raw: &str) -> Vec<i64> {
    raw.split(',')
        .filter_map(|part| part.trim().parse::<i64>().ok())
        .filter(|id| *id > 0)
        .collect()
}

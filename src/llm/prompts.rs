//! Prompts for the shopping assistant and the structured answers parsed
//! out of them, each with the answer used when the model is unavailable.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::aggregates::user::Preferences;
use crate::recommend::{ChatTurn, Keywords};

const CATEGORY_LIST: &str = "shirts, t-shirts, jeans, trousers, chinos, shorts, jackets, blazers, suits, sweaters, hoodies, \
kurtas, sherwanis, ethnic wear, shoes, sneakers, formal shoes, boots, sandals, watches, belts, wallets, sunglasses, ties, bags, accessories";

fn preferences_block(prefs: Option<&Preferences>) -> String {
    let Some(p) = prefs else { return String::new() };
    let or_unset = |s: &str| if s.is_empty() { "Not specified".to_string() } else { s.to_string() };
    let favourites = if p.favorite_categories.is_empty() { "None specified".to_string() } else { p.favorite_categories.join(", ") };
    format!(
        "User preferences:\n- Favorite categories: {favourites}\n- Size preferences: Shirt: {}, Pants: {}, Shoes: {}\n",
        or_unset(&p.size_preferences.shirt), or_unset(&p.size_preferences.pants), or_unset(&p.size_preferences.shoes),
    )
}

/// Human wording of an intent, e.g. "blue shirts".
pub fn describe(keywords: &Keywords) -> String {
    let mut words: Vec<String> = keywords.colors.clone();
    if keywords.categories.is_empty() {
        words.extend(keywords.occasions.iter().map(|o| o.as_str().replace('-', " ")));
        words.push("pieces".into());
    } else {
        let names: Vec<String> = keywords.categories.iter().map(|c| c.as_str().replace('-', " ")).collect();
        words.push(names.join(" and "));
    }
    words.join(" ")
}

pub fn chat_prompt(message: &str, context: &[ChatTurn], prefs: Option<&Preferences>, matches: &[String]) -> String {
    let history: Vec<String> = context.iter().map(|t| format!("{}: {}", t.role, t.content)).collect();
    let catalogue = if matches.is_empty() {
        String::new()
    } else {
        format!("Products from our catalogue that match this request:\n{}\nMention them by name where relevant.\n", matches.join("\n"))
    };
    format!(
        "You are Manvue's AI fashion assistant, an expert in men's fashion and style. You help customers with style advice, \
outfit recommendations, trends, size and fit guidance, product recommendations, colour coordination and garment care.\n\n\
Guidelines:\n- Be friendly, knowledgeable, and concise\n- Focus on men's fashion exclusively\n- Provide specific, actionable advice\n\
- Ask clarifying questions when needed\n- Recommend products from our categories: {CATEGORY_LIST}\n\
- Consider occasions: casual, formal, sport, party, wedding, office, seasonal events\n- Keep responses under 200 words\n\n\
{}{}\nPrevious conversation context:\n{}\n\nCurrent user message: {message}\n\nRespond as Manvue's fashion assistant:",
        preferences_block(prefs), catalogue, history.join("\n"),
    )
}

/// Reply used when the model is unavailable.
pub fn chat_fallback(keywords: &Keywords, found: usize) -> String {
    if !keywords.has_signal() {
        return "I'd love to help you find the perfect outfit! Could you tell me more about what you're looking for? \
For example a colour, a type of clothing or an occasion."
            .into();
    }
    let what = describe(keywords);
    if found == 0 {
        format!("I couldn't find any {what} right now. Would you like to try a different colour or style?")
    } else {
        format!("Here are {found} {what} I found for you. Tap any of them to see sizes and colours.")
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceAnalysis {
    pub categories: Vec<String>,
    pub style: String,
    pub colors: Vec<String>,
    pub occasion: String,
    pub budget_range: String,
    pub query_intent: String,
}

impl VoiceAnalysis {
    pub fn fallback(transcript: &str, keywords: &Keywords, occasion: Option<&str>, budget: Option<Decimal>) -> Self {
        let categories = if keywords.categories.is_empty() {
            vec!["shirts".into(), "trousers".into()]
        } else {
            keywords.categories.iter().map(|c| c.as_str().to_string()).collect()
        };
        let occasion = occasion
            .map(str::to_string)
            .or_else(|| keywords.occasions.first().map(|o| o.as_str().to_string()))
            .unwrap_or_else(|| "general".into());
        Self {
            categories,
            style: "casual".into(),
            colors: keywords.colors.clone(),
            occasion,
            budget_range: budget.map_or_else(|| "medium".into(), |b| b.to_string()),
            query_intent: transcript.to_string(),
        }
    }
}

pub fn voice_analysis_prompt(transcript: &str, occasion: Option<&str>, budget: Option<Decimal>) -> String {
    format!(
        "Analyze this voice request for men's fashion recommendations and extract the product categories, style preference, \
colors, occasion, size preferences and budget range.\n\nVoice request: \"{transcript}\"\nOccasion: {}\nBudget: {}\n\n\
Respond in JSON format:\n{{\"categories\": [\"category1\"], \"style\": \"style_preference\", \"colors\": [\"color1\"], \
\"occasion\": \"extracted_occasion\", \"budget_range\": \"extracted_budget\", \"query_intent\": \"brief description\"}}\n\
Use only these categories: {CATEGORY_LIST}",
        occasion.unwrap_or("Not specified"),
        budget.map_or_else(|| "Not specified".to_string(), |b| b.to_string()),
    )
}

pub fn voice_message_prompt(transcript: &str, analysis: &VoiceAnalysis, titles: &[String]) -> String {
    format!(
        "Based on the user's voice request: \"{transcript}\"\nAnd analysis: {}\nWe found: {}\n\n\
Generate a personalized recommendation message (2-3 sentences) explaining why these products match their request. \
Be conversational and mention specific aspects like style, occasion, or colors if relevant.",
        serde_json::to_string(analysis).unwrap_or_default(),
        if titles.is_empty() { "nothing yet".to_string() } else { titles.join(", ") },
    )
}

pub fn voice_message_fallback(analysis: &VoiceAnalysis, found: usize) -> String {
    if found == 0 {
        return "I couldn't find an exact match for that, but try widening your budget or picking another colour.".into();
    }
    let occasion = if analysis.occasion.is_empty() || analysis.occasion == "general" { String::new() } else { format!(" for {}", analysis.occasion) };
    format!("Based on what you told me, here are {found} picks{occasion} that should suit your style.")
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageAnalysis {
    pub items: Vec<String>,
    pub colors: Vec<String>,
    pub style: String,
    pub categories: Vec<String>,
    pub patterns: Vec<String>,
    pub aesthetic: String,
    pub search_keywords: Vec<String>,
}

impl ImageAnalysis {
    pub fn fallback() -> Self {
        Self {
            items: vec!["clothing".into()],
            colors: vec!["black".into(), "blue".into()],
            style: "casual".into(),
            categories: vec!["shirts".into(), "trousers".into()],
            patterns: vec![],
            aesthetic: "modern".into(),
            search_keywords: vec!["fashion".into(), "style".into()],
        }
    }
}

pub const IMAGE_ANALYSIS_PROMPT: &str = "Analyze this fashion image and identify:\n1. Main clothing items/accessories visible\n\
2. Colors (list primary and secondary colors)\n3. Style category (casual, formal, sporty, ethnic, etc.)\n\
4. Specific product categories (shirts, jeans, shoes, etc.)\n5. Notable patterns or textures\n6. Overall fashion aesthetic\n\n\
Respond in JSON format:\n{\"items\": [\"item1\"], \"colors\": [\"color1\"], \"style\": \"style_category\", \
\"categories\": [\"category1\"], \"patterns\": [\"pattern1\"], \"aesthetic\": \"description\", \"search_keywords\": [\"keyword1\"]}";

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Outfit {
    pub name: String,
    pub items: Vec<String>,
    pub colors: Vec<String>,
    pub accessories: Vec<String>,
    pub estimated_cost: String,
    pub styling_tip: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StyleAdvice {
    pub outfits: Vec<Outfit>,
    pub general_tips: Vec<String>,
    pub color_guide: String,
    pub budget_alternatives: String,
}

impl StyleAdvice {
    pub fn fallback() -> Self {
        Self {
            outfits: vec![Outfit {
                name: "Classic Smart Casual".into(),
                items: vec!["Button-down shirt".into(), "Chinos".into(), "Loafers".into()],
                colors: vec!["Navy".into(), "White".into()],
                accessories: vec!["Leather belt".into(), "Watch".into()],
                estimated_cost: "£30-50".into(),
                styling_tip: "Keep it simple and well-fitted".into(),
            }],
            general_tips: vec!["Focus on fit over fashion".into(), "Invest in quality basics".into()],
            color_guide: "Stick to neutral colors with one accent piece".into(),
            budget_alternatives: "Mix high and low-end pieces strategically".into(),
        }
    }

    /// Every outfit item, in order of appearance.
    pub fn items(&self) -> impl Iterator<Item = &str> { self.outfits.iter().flat_map(|o| o.items.iter().map(String::as_str)) }
}

pub fn style_advice_prompt(occasion: &str, budget: Option<Decimal>, body_type: Option<&str>, preferences: &serde_json::Value, prefs: Option<&Preferences>) -> String {
    format!(
        "As Manvue's AI style advisor, provide comprehensive outfit recommendations for:\n\nOccasion: {occasion}\nBudget: {}\n\
Body type: {}\nPreferences: {preferences}\n{}\nProvide 3 complete outfit suggestions with specific items, colour combinations that work well, \
essential accessories, styling tips specific to the occasion and alternatives for different budget ranges.\n\nFormat as JSON:\n\
{{\"outfits\": [{{\"name\": \"Outfit 1 Name\", \"items\": [\"item1\"], \"colors\": [\"primary_color\"], \"accessories\": [\"accessory1\"], \
\"estimated_cost\": \"price_range\", \"styling_tip\": \"tip\"}}], \"general_tips\": [\"tip1\"], \"color_guide\": \"...\", \"budget_alternatives\": \"...\"}}",
        budget.map_or_else(|| "Flexible".to_string(), |b| format!("£{b}")),
        body_type.unwrap_or("Not specified"),
        preferences_block(prefs),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recommend::extract;

    #[test]
    fn test_chat_fallback() {
        assert!(chat_fallback(&extract("hello"), 0).contains("Could you tell me more about what you're looking for"));
        assert_eq!(chat_fallback(&extract("blue shirt"), 3), "Here are 3 blue shirts I found for you. Tap any of them to see sizes and colours.");
        assert!(chat_fallback(&extract("red formal shoes"), 0).starts_with("I couldn't find any red formal shoes"));
    }

    #[test]
    fn test_style_fallback_items() {
        let advice = StyleAdvice::fallback();
        assert_eq!(advice.items().collect::<Vec<_>>(), vec!["Button-down shirt", "Chinos", "Loafers"]);
        let parsed: StyleAdvice = serde_json::from_str(r#"{"outfits":[{"name":"x"}]}"#).unwrap();
        assert!(parsed.general_tips.is_empty());
    }

    #[test]
    fn test_voice_fallback_uses_keywords() {
        let k = extract("navy blazer for a wedding");
        let analysis = VoiceAnalysis::fallback("navy blazer for a wedding", &k, None, Some(Decimal::new(120, 0)));
        assert_eq!(analysis.categories, vec!["blazers"]);
        assert_eq!(analysis.occasion, "wedding");
        assert_eq!(analysis.budget_range, "120");
        let plain = VoiceAnalysis::fallback("hi", &extract("hi"), Some("party"), None);
        assert_eq!(plain.categories, vec!["shirts", "trousers"]);
        assert_eq!(plain.occasion, "party");
    }

    #[test]
    fn test_prompt_includes_preferences() {
        let prefs = Preferences { favorite_categories: vec!["jeans".into()], ..Preferences::default() };
        let prompt = chat_prompt("hi", &[], Some(&prefs), &[]);
        assert!(prompt.contains("Favorite categories: jeans"));
        assert!(prompt.contains("Shirt: Not specified"));
    }
}

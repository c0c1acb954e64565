//! Shopping intent pulled out of free text: categories, colours, occasions,
//! price bounds and the remaining search terms.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::domain::aggregates::{Category, Occasion};

const STOP_WORDS: &[&str] = &[
    "a", "an", "the", "i", "im", "me", "my", "we", "want", "wanna", "need", "looking", "look", "for", "some", "any",
    "show", "find", "with", "and", "or", "to", "in", "of", "on", "at", "please", "can", "could", "you", "get",
    "something", "like", "would", "is", "are", "be", "do", "have", "has", "what", "which", "good", "nice", "buy",
    "it", "its", "that", "this", "these", "those", "yes", "yeah", "sure", "ok", "okay", "there", "got", "your",
    "men", "mens", "man", "item", "items", "one", "ones", "pair", "under", "below", "less", "than", "over",
    "above", "between", "budget", "max", "maximum", "upto", "up", "within", "around", "more", "from", "gbp", "pounds",
];

const COLORS: &[&str] = &[
    "black", "white", "blue", "navy", "red", "green", "grey", "brown", "beige", "khaki", "maroon", "olive",
    "pink", "purple", "yellow", "orange", "cream", "tan", "charcoal", "burgundy", "teal", "gold", "silver",
];

const CATEGORY_SYNONYMS: &[(&str, Category)] = &[
    ("shirt", Category::Shirts), ("tshirt", Category::Tshirts), ("t-shirt", Category::Tshirts),
    ("t-shirts", Category::Tshirts), ("tee", Category::Tshirts), ("tees", Category::Tshirts),
    ("jean", Category::Jeans), ("denim", Category::Jeans), ("denims", Category::Jeans),
    ("trouser", Category::Trousers), ("pants", Category::Trousers), ("pant", Category::Trousers),
    ("chino", Category::Chinos), ("short", Category::Shorts), ("jacket", Category::Jackets),
    ("coat", Category::Jackets), ("coats", Category::Jackets), ("blazer", Category::Blazers),
    ("suit", Category::Suits), ("sweater", Category::Sweaters), ("jumper", Category::Sweaters),
    ("jumpers", Category::Sweaters), ("pullover", Category::Sweaters), ("hoodie", Category::Hoodies),
    ("sweatshirt", Category::Hoodies), ("sweatshirts", Category::Hoodies), ("kurta", Category::Kurtas),
    ("sherwani", Category::Sherwanis), ("shoe", Category::Shoes), ("footwear", Category::Shoes),
    ("sneaker", Category::Sneakers), ("trainers", Category::Sneakers), ("trainer", Category::Sneakers),
    ("loafer", Category::FormalShoes), ("loafers", Category::FormalShoes), ("oxfords", Category::FormalShoes),
    ("brogues", Category::FormalShoes), ("boot", Category::Boots), ("sandal", Category::Sandals),
    ("slippers", Category::Sandals), ("watch", Category::Watches), ("belt", Category::Belts),
    ("wallet", Category::Wallets), ("sunglass", Category::Sunglasses), ("shades", Category::Sunglasses),
    ("tie", Category::Ties), ("bag", Category::Bags), ("backpack", Category::Bags), ("sock", Category::Socks),
    ("cap", Category::Caps), ("hat", Category::Caps), ("hats", Category::Caps), ("perfume", Category::Perfumes),
    ("fragrance", Category::Perfumes), ("cologne", Category::Perfumes), ("boxers", Category::Underwear),
];

const OCCASION_SYNONYMS: &[(&str, Occasion)] = &[
    ("sports", Occasion::Sport), ("sporty", Occasion::Sport), ("gym", Occasion::Sport), ("workout", Occasion::Sport),
    ("parties", Occasion::Party), ("weddings", Occasion::Wedding), ("work", Occasion::Office),
    ("business", Occasion::Office), ("interview", Occasion::Office), ("rain", Occasion::Monsoon),
    ("rainy", Occasion::Monsoon), ("festive", Occasion::Festival), ("diwali", Occasion::Festival),
    ("eid", Occasion::Festival), ("daily", Occasion::DailyWear), ("everyday", Occasion::DailyWear),
];

const AFFIRMATIVES: &[&str] = &[
    "yes", "yeah", "yep", "yup", "sure", "ok", "okay", "please", "show", "me", "them", "go", "ahead", "definitely",
    "absolutely", "sounds", "good", "great", "perfect", "do", "it", "that", "would", "be", "nice", "let's", "lets", "see",
];

/// Items the style advisor mentions, mapped to the catalogue. Longer,
/// more specific keys come first so `t-shirt` wins over `shirt`.
const ITEM_CATEGORIES: &[(&str, Category)] = &[
    ("t-shirt", Category::Tshirts), ("tee", Category::Tshirts), ("button-down", Category::Shirts),
    ("polo", Category::Shirts), ("shirt", Category::Shirts), ("jeans", Category::Jeans),
    ("trousers", Category::Trousers), ("pants", Category::Trousers), ("chinos", Category::Chinos),
    ("shorts", Category::Shorts), ("jacket", Category::Jackets), ("blazer", Category::Blazers),
    ("suit", Category::Suits), ("sweater", Category::Sweaters), ("hoodie", Category::Hoodies),
    ("kurta", Category::Kurtas), ("sherwani", Category::Sherwanis), ("sneakers", Category::Sneakers),
    ("boots", Category::Boots), ("loafers", Category::FormalShoes), ("shoes", Category::Shoes),
    ("watch", Category::Watches), ("belt", Category::Belts), ("wallet", Category::Wallets),
    ("sunglasses", Category::Sunglasses), ("tie", Category::Ties),
];

/// One message of a chat transcript as the client sends it back.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn { pub role: String, pub content: String }

impl ChatTurn {
    pub fn is_user(&self) -> bool { self.role.eq_ignore_ascii_case("user") }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceRange { pub min: Option<Decimal>, pub max: Option<Decimal> }

impl PriceRange {
    pub fn is_unbounded(&self) -> bool { self.min.is_none() && self.max.is_none() }
    pub fn contains(&self, price: Decimal) -> bool {
        self.min.map_or(true, |m| price >= m) && self.max.map_or(true, |m| price <= m)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Keywords {
    /// Every meaningful token, vocabulary hits included.
    pub terms: Vec<String>,
    pub categories: Vec<Category>,
    pub colors: Vec<String>,
    pub occasions: Vec<Occasion>,
    pub price: PriceRange,
}

impl Keywords {
    /// Whether the text said anything a product search can use.
    pub fn has_signal(&self) -> bool {
        !self.categories.is_empty() || !self.colors.is_empty() || !self.occasions.is_empty()
    }

    /// Text fed to the embedding for this intent.
    pub fn query_text(&self) -> String {
        let mut parts: Vec<&str> = self.terms.iter().map(String::as_str).collect();
        for c in &self.categories { parts.push(c.as_str()); }
        for o in &self.occasions { parts.push(o.as_str()); }
        parts.join(" ")
    }

    fn push_category(&mut self, c: Category) { if !self.categories.contains(&c) { self.categories.push(c); } }
    fn push_occasion(&mut self, o: Occasion) { if !self.occasions.contains(&o) { self.occasions.push(o); } }
}

/// Lowercased words; `-` and `.` survive inside a word (`t-shirt`, `49.99`).
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !(c.is_alphanumeric() || c == '-' || c == '.' || c == '\''))
        .map(|t| t.trim_matches(|c: char| c == '-' || c == '.' || c == '\''))
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn is_stop_word(token: &str) -> bool { STOP_WORDS.contains(&token) }

fn normalize_color(token: &str) -> Option<&'static str> {
    let token = if token == "gray" { "grey" } else { token };
    COLORS.iter().copied().find(|c| *c == token)
}

fn category_of(token: &str) -> Option<Category> {
    if token == "formal" { return None; }
    Category::from_str(token).ok()
        .or_else(|| CATEGORY_SYNONYMS.iter().find(|(k, _)| *k == token).map(|(_, c)| *c))
        .or_else(|| token.strip_suffix('s').and_then(|s| CATEGORY_SYNONYMS.iter().find(|(k, _)| *k == s).map(|(_, c)| *c)))
}

fn occasion_of(token: &str) -> Option<Occasion> {
    Occasion::from_str(token).ok().or_else(|| OCCASION_SYNONYMS.iter().find(|(k, _)| *k == token).map(|(_, o)| *o))
}

fn amount(token: &str) -> Option<Decimal> {
    let digits = token.trim_start_matches('£').trim_end_matches("gbp");
    Decimal::from_str(digits).ok().filter(|d| *d >= Decimal::ZERO)
}

fn parse_price(tokens: &[String]) -> PriceRange {
    let mut range = PriceRange::default();
    let next_amount = |from: usize| tokens.iter().skip(from).take(3).find_map(|t| amount(t));
    for (i, token) in tokens.iter().enumerate() {
        match token.as_str() {
            "under" | "below" | "less" | "cheaper" | "max" | "maximum" | "upto" | "within" | "budget" => {
                if let Some(v) = next_amount(i + 1) { range.max = Some(v); }
            }
            "over" | "above" | "more" | "least" | "min" | "minimum" => {
                if let Some(v) = next_amount(i + 1) { range.min = Some(v); }
            }
            "between" | "from" => {
                let lo = tokens.get(i + 1).and_then(|t| amount(t));
                let hi = tokens.get(i + 3).filter(|_| matches!(tokens.get(i + 2).map(String::as_str), Some("and" | "to"))).and_then(|t| amount(t));
                if let (Some(lo), Some(hi)) = (lo, hi) {
                    range.min = Some(lo.min(hi));
                    range.max = Some(lo.max(hi));
                }
            }
            _ => {}
        }
    }
    range
}

pub fn extract(text: &str) -> Keywords {
    let tokens = tokenize(text);
    let mut out = Keywords { price: parse_price(&tokens), ..Keywords::default() };
    // Words already claimed by a two-word department such as "formal shoes".
    let mut claimed = vec![false; tokens.len()];
    for (i, pair) in tokens.windows(2).enumerate() {
        let joined = format!("{}-{}", pair[0], pair[1]);
        if let Ok(c) = Category::from_str(&joined) {
            out.push_category(c);
            claimed[i] = true;
            claimed[i + 1] = true;
        }
        if let Ok(o) = Occasion::from_str(&joined) { out.push_occasion(o); }
    }
    for (i, token) in tokens.iter().enumerate() {
        if let Some(color) = normalize_color(token) {
            if !out.colors.iter().any(|c| c == color) { out.colors.push(color.to_string()); }
        }
        if !claimed[i] {
            if let Some(c) = category_of(token) { out.push_category(c); }
        }
        if let Some(o) = occasion_of(token) { out.push_occasion(o); }
        if !is_stop_word(token) && amount(token).is_none() && !out.terms.contains(token) { out.terms.push(token.clone()); }
    }
    out
}

/// A bare "yes" / "sure, show me" with nothing else in it.
pub fn is_affirmative(text: &str) -> bool {
    let tokens = tokenize(text);
    !tokens.is_empty() && tokens.iter().all(|t| AFFIRMATIVES.contains(&t.as_str())) && tokens.iter().any(|t| {
        matches!(t.as_str(), "yes" | "yeah" | "yep" | "yup" | "sure" | "ok" | "okay" | "show" | "please" | "definitely" | "absolutely" | "go" | "see")
    })
}

/// Intent for `message`. An affirmative reply with no intent of its own
/// inherits the most recent earlier user turn that had one.
pub fn resolve_follow_up(message: &str, context: &[ChatTurn]) -> Keywords {
    let own = extract(message);
    if own.has_signal() || !is_affirmative(message) { return own; }
    context
        .iter()
        .rev()
        .filter(|t| t.is_user())
        .map(|t| extract(&t.content))
        .find(Keywords::has_signal)
        .unwrap_or(own)
}

/// Catalogue department for an outfit item such as "Slim-fit chinos".
pub fn category_for_item(item: &str) -> Option<Category> {
    let item = item.to_lowercase();
    ITEM_CATEGORIES.iter().find(|(key, _)| item.contains(key)).map(|(_, c)| *c)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_colour_and_category() {
        let k = extract("I want a Blue SHIRT for the office");
        assert_eq!(k.colors, vec!["blue"]);
        assert_eq!(k.categories, vec![Category::Shirts]);
        assert_eq!(k.occasions, vec![Occasion::Office]);
        assert!(k.terms.contains(&"shirt".to_string()));
        assert!(!k.terms.contains(&"the".to_string()));
    }

    #[test]
    fn test_extract_synonyms() {
        let k = extract("grey tees and loafers");
        assert_eq!(k.colors, vec!["grey"]);
        assert_eq!(k.categories, vec![Category::Tshirts, Category::FormalShoes]);
        assert_eq!(extract("formal shoes").categories, vec![Category::FormalShoes]);
        assert_eq!(extract("formal shoes").occasions, vec![Occasion::Formal]);
        assert_eq!(extract("jeans").categories, vec![Category::Jeans]);
    }

    #[test]
    fn test_price_hints() {
        assert_eq!(extract("jackets under £50").price.max, Some(Decimal::new(50, 0)));
        assert_eq!(extract("shirts below 29.99").price.max, Some(Decimal::new(2999, 2)));
        let between = extract("suits between 200 and 120").price;
        assert_eq!((between.min, between.max), (Some(Decimal::new(120, 0)), Some(Decimal::new(200, 0))));
        assert_eq!(extract("something over 80").price.min, Some(Decimal::new(80, 0)));
        assert!(extract("blue shirt").price.is_unbounded());
    }

    #[test]
    fn test_affirmative() {
        assert!(is_affirmative("yes"));
        assert!(is_affirmative("Sure, show me!"));
        assert!(is_affirmative("yes please"));
        assert!(!is_affirmative("no"));
        assert!(!is_affirmative("yes but in red"));
        assert!(!is_affirmative(""));
    }

    #[test]
    fn test_follow_up_inherits_previous_intent() {
        let context = vec![
            ChatTurn { role: "user".into(), content: "blue shirt".into() },
            ChatTurn { role: "assistant".into(), content: "Would you like to see some blue shirts?".into() },
        ];
        let k = resolve_follow_up("yes", &context);
        assert_eq!(k.colors, vec!["blue"]);
        assert_eq!(k.categories, vec![Category::Shirts]);
        let own = resolve_follow_up("red jacket", &context);
        assert_eq!(own.colors, vec!["red"]);
        assert!(!resolve_follow_up("yes", &[]).has_signal());
    }

    #[test]
    fn test_item_category_mapping() {
        assert_eq!(category_for_item("Button-down shirt"), Some(Category::Shirts));
        assert_eq!(category_for_item("White T-shirt"), Some(Category::Tshirts));
        assert_eq!(category_for_item("Loafers"), Some(Category::FormalShoes));
        assert_eq!(category_for_item("Leather belt"), Some(Category::Belts));
        assert_eq!(category_for_item("Pocket square"), None);
    }
}

//! Shopping assistant: chat, voice and image search, style advice.
//!
//! Every handler answers without a model. Product matching always runs
//! locally through [`crate::recommend`]; the model only writes the prose and
//! the structured analysis, and its failures fall back to the canned
//! answers in [`crate::llm::prompts`].

use axum::{extract::State, routing::{get, post}, Json, Router};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};
use validator::{Validate, ValidationError};

use crate::auth::{AdminUser, MaybeUser};
use crate::catalog::{listing, non_negative};
use crate::domain::aggregates::{Category, Occasion, Product};
use crate::error::{ok, ok_message, AppError, AppResult, ValidJson, ValidQuery};
use crate::llm::prompts::{
    chat_fallback, chat_prompt, style_advice_prompt, voice_analysis_prompt, voice_message_fallback, voice_message_prompt, ImageAnalysis,
    StyleAdvice, VoiceAnalysis, IMAGE_ANALYSIS_PROMPT,
};
use crate::llm::{extract_json, GenerateRequest, InlineImage};
use crate::recommend::{category_for_item, embed_product, extract, rank, resolve_follow_up, ChatTurn, Keywords, EMBEDDING_DIMS};
use crate::state::AppState;

use super::modify_product;
use super::users::by_rating_then_sales;

const CHAT_LIMIT: usize = 6;
const VOICE_LIMIT: usize = 8;
const IMAGE_LIMIT: usize = 12;
const STYLE_LIMIT: usize = 6;
const SEARCH_LIMIT: u32 = 12;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/chat", post(chat))
        .route("/voice-recommend", post(voice_recommend))
        .route("/search-image", post(search_image))
        .route("/style-advice", post(style_advice))
        .route("/search", get(semantic_search))
        .route("/generate-embeddings", post(generate_embeddings))
}

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() { return Err(ValidationError::new("blank")); }
    Ok(())
}

/// `data:image/...` payloads or http(s) URLs.
fn image_source(value: &str) -> Result<(), ValidationError> {
    if value.starts_with("data:image/") || validator::validate_url(value) { return Ok(()); }
    Err(ValidationError::new("image_url"))
}

#[derive(Debug, Deserialize, Validate)]
pub struct ChatRequest {
    #[validate(
        length(min = 1, max = 1000, message = "Message must be between 1 and 1000 characters"),
        custom(function = "not_blank", message = "Message must be between 1 and 1000 characters")
    )]
    pub message: String,
    #[serde(default)]
    pub context: Vec<ChatTurn>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct VoiceRequest {
    #[validate(
        length(min = 1, max = 500, message = "Voice transcript must be between 1 and 500 characters"),
        custom(function = "not_blank", message = "Voice transcript must be between 1 and 500 characters")
    )]
    pub transcript: String,
    pub occasion: Option<String>,
    #[validate(custom(function = "non_negative", message = "Budget must be a positive number"))]
    pub budget: Option<Decimal>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchType {
    #[default]
    Similar,
    Color,
    Style,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ImageSearchRequest {
    #[validate(custom(function = "image_source", message = "Valid image URL is required"))]
    pub image_url: String,
    #[serde(default)]
    pub search_type: SearchType,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct StyleAdviceRequest {
    #[validate(custom(function = "not_blank", message = "Occasion is required"))]
    pub occasion: String,
    #[validate(custom(function = "non_negative", message = "Budget must be a positive number"))]
    pub budget: Option<Decimal>,
    pub body_type: Option<String>,
    #[serde(default)]
    pub preferences: Value,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SearchQuery {
    #[validate(length(min = 1, max = 200, message = "Query must be between 1 and 200 characters"))]
    pub q: String,
    #[validate(range(min = 1, max = 50, message = "Limit must be between 1 and 50"))]
    pub limit: Option<u32>,
}

/// Model reply, or `None` when no model is configured or the call failed.
async fn ask(state: &AppState, request: GenerateRequest, purpose: &str) -> Option<String> {
    let model = state.llm.as_ref()?;
    match model.generate(request).await {
        Ok(text) => Some(text),
        Err(e) => {
            tracing::warn!(error = %e, purpose, "Language model call failed, using fallback");
            None
        }
    }
}

/// Structured model answer, or `None` when the reply was missing or unparsable.
async fn ask_json<T: DeserializeOwned>(state: &AppState, request: GenerateRequest, purpose: &str) -> Option<T> {
    let text = ask(state, request, purpose).await?;
    extract_json(&text).map_err(|e| tracing::warn!(error = %e, purpose, "Unparsable model answer, using fallback")).ok()
}

/// Category names as a model writes them ("t-shirts", "Formal Shoes", "polo").
fn parse_categories(names: &[String]) -> Vec<Category> {
    let mut out: Vec<Category> = Vec::new();
    for name in names {
        let slug = name.trim().to_lowercase().replace(' ', "-");
        if let Some(c) = slug.parse().ok().or_else(|| category_for_item(&slug)) {
            if !out.contains(&c) { out.push(c); }
        }
    }
    out
}

fn with_scores(products: &[(&Product, f32)]) -> Vec<Value> {
    products
        .iter()
        .map(|(p, score)| {
            let mut value = listing(p);
            if let Some(map) = value.as_object_mut() { map.insert("score".into(), json!(score)); }
            value
        })
        .collect()
}

/// Active products passing `keep`, best rated and best selling first.
fn top_by_rating<'a>(catalogue: &'a [Product], limit: usize, keep: impl Fn(&Product) -> bool) -> Vec<&'a Product> {
    let mut hits: Vec<&Product> = catalogue.iter().filter(|p| p.is_active && keep(*p)).collect();
    hits.sort_by(|a, b| by_rating_then_sales(a, b));
    hits.truncate(limit);
    hits
}

/// Products for a chat message. Small talk gets none.
pub(crate) fn chat_matches<'a>(catalogue: &'a [Product], keywords: &Keywords) -> Vec<&'a Product> {
    if !keywords.has_signal() { return vec![]; }
    rank(catalogue, keywords, CHAT_LIMIT).into_iter().map(|hit| hit.product).collect()
}

async fn chat(State(s): State<AppState>, MaybeUser(user): MaybeUser, ValidJson(r): ValidJson<ChatRequest>) -> AppResult<Json<Value>> {
    let message = r.message.trim();
    let keywords = resolve_follow_up(message, &r.context);
    let catalogue = s.store.list_products().await?;
    let matches = chat_matches(&catalogue, &keywords);
    tracing::debug!(categories = ?keywords.categories, colors = ?keywords.colors, found = matches.len(), "Chat intent");

    let titles: Vec<String> = matches.iter().map(|p| format!("- {} (£{})", p.title, p.price.selling)).collect();
    let prompt = chat_prompt(message, &r.context, user.as_ref().map(|u| &u.preferences), &titles);
    let reply = match ask(&s, GenerateRequest::text(prompt), "chat").await {
        Some(text) => text,
        None => chat_fallback(&keywords, matches.len()),
    };
    let products: Vec<Value> = matches.iter().map(|p| listing(p)).collect();
    Ok(ok(json!({ "message": reply, "products": products, "keywords": keywords, "timestamp": Utc::now() })))
}

/// Intent for a spoken request: the model's analysis merged with what the
/// transcript says itself, capped by the budget.
pub(crate) fn voice_intent(transcript: &str, analysis: &VoiceAnalysis, budget: Option<Decimal>) -> Keywords {
    let mut intent = extract(transcript);
    for c in parse_categories(&analysis.categories) {
        if !intent.categories.contains(&c) { intent.categories.push(c); }
    }
    for color in &analysis.colors {
        let color = color.trim().to_lowercase();
        if !color.is_empty() && !intent.colors.contains(&color) { intent.colors.push(color); }
    }
    if let Ok(o) = analysis.occasion.trim().to_lowercase().parse::<Occasion>() {
        if !intent.occasions.contains(&o) { intent.occasions.push(o); }
    }
    if let Some(budget) = budget {
        intent.price.max = Some(intent.price.max.map_or(budget, |m| m.min(budget)));
    }
    intent
}

async fn voice_recommend(State(s): State<AppState>, ValidJson(r): ValidJson<VoiceRequest>) -> AppResult<Json<Value>> {
    let transcript = r.transcript.trim();
    let occasion = r.occasion.as_deref().filter(|o| !o.trim().is_empty());
    let prompt = voice_analysis_prompt(transcript, occasion, r.budget);
    let analysis = match ask_json::<VoiceAnalysis>(&s, GenerateRequest::text(prompt), "voice analysis").await {
        Some(analysis) => analysis,
        None => VoiceAnalysis::fallback(transcript, &extract(transcript), occasion, r.budget),
    };

    let intent = voice_intent(transcript, &analysis, r.budget);
    let catalogue = s.store.list_products().await?;
    let mut picks: Vec<&Product> = rank(&catalogue, &intent, VOICE_LIMIT).into_iter().map(|hit| hit.product).collect();
    if picks.is_empty() {
        picks = top_by_rating(&catalogue, VOICE_LIMIT, |p| {
            (intent.categories.is_empty() || intent.categories.contains(&p.category)) && intent.price.contains(p.price.selling)
        });
    }

    let titles: Vec<String> = picks.iter().map(|p| p.title.clone()).collect();
    let message = match ask(&s, GenerateRequest::text(voice_message_prompt(transcript, &analysis, &titles)), "voice message").await {
        Some(text) => text.trim().to_string(),
        None => voice_message_fallback(&analysis, picks.len()),
    };
    let recommendations: Vec<Value> = picks.iter().map(|p| listing(p)).collect();
    Ok(ok(json!({ "analysis": analysis, "recommendations": recommendations, "message": message, "totalFound": picks.len() })))
}

/// Catalogue matches for an analysed image under the requested search mode.
pub(crate) fn image_matches<'a>(catalogue: &'a [Product], analysis: &ImageAnalysis, search_type: SearchType) -> Vec<&'a Product> {
    match search_type {
        SearchType::Color => {
            let colors: Vec<String> = analysis.colors.iter().map(|c| c.trim().to_lowercase()).filter(|c| !c.is_empty()).collect();
            top_by_rating(catalogue, IMAGE_LIMIT, |p| {
                colors.is_empty() || p.colors().any(|pc| colors.iter().any(|c| pc.to_lowercase().contains(c.as_str())))
            })
        }
        SearchType::Style => {
            let style = analysis.style.trim().to_lowercase().parse::<Occasion>().ok();
            top_by_rating(catalogue, IMAGE_LIMIT, |p| style.is_none() || p.sub_category == style)
        }
        SearchType::Similar => {
            let text = analysis.search_keywords.iter().chain(&analysis.items).chain(&analysis.patterns).cloned().collect::<Vec<_>>().join(" ");
            let mut intent = extract(&text);
            for c in parse_categories(&analysis.categories) {
                if !intent.categories.contains(&c) { intent.categories.push(c); }
            }
            rank(catalogue, &intent, IMAGE_LIMIT).into_iter().map(|hit| hit.product).collect()
        }
    }
}

async fn search_image(State(s): State<AppState>, ValidJson(r): ValidJson<ImageSearchRequest>) -> AppResult<Json<Value>> {
    let request = if r.image_url.starts_with("data:") {
        GenerateRequest { prompt: IMAGE_ANALYSIS_PROMPT.to_string(), image: Some(InlineImage::from_data_url(&r.image_url)) }
    } else {
        GenerateRequest::text(format!("{IMAGE_ANALYSIS_PROMPT}\n\nImage URL: {}", r.image_url))
    };
    let analysis = ask_json::<ImageAnalysis>(&s, request, "image analysis").await.unwrap_or_else(ImageAnalysis::fallback);
    let catalogue = s.store.list_products().await?;
    let products: Vec<Value> = image_matches(&catalogue, &analysis, r.search_type).into_iter().map(listing).collect();
    let total = products.len();
    Ok(ok(json!({ "analysis": analysis, "products": products, "searchType": r.search_type, "totalFound": total })))
}

/// Products in the departments the advice mentions, within budget.
pub(crate) fn advice_matches<'a>(catalogue: &'a [Product], advice: &StyleAdvice, budget: Option<Decimal>) -> Vec<&'a Product> {
    let categories: Vec<Category> = advice.items().filter_map(category_for_item).collect();
    if categories.is_empty() { return vec![]; }
    top_by_rating(catalogue, STYLE_LIMIT, |p| categories.contains(&p.category) && budget.map_or(true, |b| p.price.selling <= b))
}

async fn style_advice(State(s): State<AppState>, MaybeUser(user): MaybeUser, ValidJson(r): ValidJson<StyleAdviceRequest>) -> AppResult<Json<Value>> {
    let occasion = r.occasion.trim();
    let prompt = style_advice_prompt(occasion, r.budget, r.body_type.as_deref(), &r.preferences, user.as_ref().map(|u| &u.preferences));
    let advice = ask_json::<StyleAdvice>(&s, GenerateRequest::text(prompt), "style advice").await.unwrap_or_else(StyleAdvice::fallback);
    let catalogue = s.store.list_products().await?;
    let matching: Vec<Value> = advice_matches(&catalogue, &advice, r.budget).into_iter().map(listing).collect();
    Ok(ok(json!({ "advice": advice, "matching_products": matching, "occasion": occasion, "budget": r.budget })))
}

async fn semantic_search(State(s): State<AppState>, ValidQuery(q): ValidQuery<SearchQuery>) -> AppResult<Json<Value>> {
    let keywords = extract(&q.q);
    if keywords.terms.is_empty() && !keywords.has_signal() { return Err(AppError::field("q", "Query must contain a searchable word")); }
    let catalogue = s.store.list_products().await?;
    let hits: Vec<(&Product, f32)> = rank(&catalogue, &keywords, q.limit.unwrap_or(SEARCH_LIMIT) as usize).into_iter().map(|hit| (hit.product, hit.score)).collect();
    Ok(ok(json!({ "products": with_scores(&hits), "keywords": keywords, "totalFound": hits.len() })))
}

async fn generate_embeddings(State(s): State<AppState>, AdminUser(_): AdminUser) -> AppResult<Json<Value>> {
    let mut updated = 0;
    for product in s.store.list_products().await? {
        if !product.is_active || product.embeddings.len() == EMBEDDING_DIMS { continue; }
        modify_product(&s, product.id, |product| {
            product.embeddings = embed_product(product);
            Ok(())
        })
        .await?;
        updated += 1;
    }
    tracing::info!(updated, "Generated product embeddings");
    Ok(ok_message(&format!("Generated embeddings for {updated} products")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seed::demo_products;
    use uuid::Uuid;

    #[test]
    fn test_chat_follow_up_finds_blue_shirts() {
        let catalogue = demo_products(Uuid::nil());
        let context = vec![
            ChatTurn { role: "user".into(), content: "show me blue shirts".into() },
            ChatTurn { role: "assistant".into(), content: "Would you like to see some?".into() },
        ];
        let keywords = resolve_follow_up("yes", &context);
        let hits = chat_matches(&catalogue, &keywords);
        assert!(hits.iter().take(2).all(|p| p.category == Category::Shirts));
        assert!(hits.iter().any(|p| p.title == "Blue Linen Casual Shirt"));
        assert!(chat_matches(&catalogue, &extract("hello there")).is_empty());
    }

    #[test]
    fn test_voice_intent_merges_analysis_and_budget() {
        let analysis = VoiceAnalysis { categories: vec!["T-Shirts".into()], colors: vec!["Black".into()], occasion: "casual".into(), ..Default::default() };
        let intent = voice_intent("something under 40", &analysis, Some(Decimal::new(30, 0)));
        assert_eq!(intent.categories, vec![Category::Tshirts]);
        assert_eq!(intent.colors, vec!["black"]);
        assert_eq!(intent.occasions, vec![Occasion::Casual]);
        assert_eq!(intent.price.max, Some(Decimal::new(30, 0)));
    }

    #[test]
    fn test_image_colour_search() {
        let catalogue = demo_products(Uuid::nil());
        let analysis = ImageAnalysis { colors: vec!["Black".into()], ..ImageAnalysis::fallback() };
        let hits = image_matches(&catalogue, &analysis, SearchType::Color);
        assert!(!hits.is_empty());
        assert!(hits.iter().all(|p| p.colors().any(|c| c.to_lowercase().contains("black"))));
    }

    #[test]
    fn test_style_advice_matches_departments_within_budget() {
        let catalogue = demo_products(Uuid::nil());
        let hits = advice_matches(&catalogue, &StyleAdvice::fallback(), None);
        assert!(hits.iter().all(|p| matches!(p.category, Category::Shirts | Category::Chinos | Category::FormalShoes)));
        assert!(!hits.is_empty());
        assert!(advice_matches(&catalogue, &StyleAdvice::fallback(), Some(Decimal::ONE)).is_empty());
    }

    #[test]
    fn test_parse_categories_accepts_model_spelling() {
        let names = vec!["Formal Shoes".into(), "polo".into(), "shirts".into(), "spaceships".into()];
        assert_eq!(parse_categories(&names), vec![Category::FormalShoes, Category::Shirts]);
    }
}

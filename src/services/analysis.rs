use serde_json::Value;
use std::sync::Arc;

use crate::models::{ HealthImpact, HealthProfile, NutritionalFacts, SearchAnalysis, SearchType };
use super::gemini::TextGenerator;

const ANALYSIS_PLACEHOLDER: &str = "Analysis not available";
const SUMMARY_PLACEHOLDER: &str = "Basic analysis available";
const FACTS_PLACEHOLDER: &str = "Information not available";

const FALLBACK_SERVICE_UNAVAILABLE: &str = "service unavailable";
const FALLBACK_TEXT_PARSING: &str = "text parsing fallback used";

const DEFAULT_SCORE: i64 = 50;
const TEXT_FALLBACK_SCORE: i64 = 60;

#[derive(Clone, Copy)]
enum RuleEffect {
    Benefit,
    Warning,
}

/// Keyword rules for the heuristic text parser, evaluated in order against
/// the lowercased model output.
const TEXT_RULES: &[(&[&str], RuleEffect, &str)] = &[
    (&["good for you", "healthy"], RuleEffect::Benefit, "Good for your health"),
    (&["sugar", "sweet"], RuleEffect::Warning, "High in sugar"),
    (&["salt", "sodium"], RuleEffect::Warning, "High in salt"),
    (&["energy"], RuleEffect::Benefit, "Gives you energy"),
    (&["vitamins", "nutrients"], RuleEffect::Benefit, "Contains vitamins your body needs"),
];

/// Turns a search query plus optional health context into a normalized
/// [`SearchAnalysis`]. Every failure path produces a valid record; callers
/// never see an error.
pub struct AnalysisService {
    generator: Arc<dyn TextGenerator>,
}

impl AnalysisService {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    pub async fn analyze(
        &self,
        query: &str,
        search_type: SearchType,
        profile: Option<&HealthProfile>
    ) -> SearchAnalysis {
        tracing::info!(
            query,
            search_type = search_type.as_str(),
            personalized = profile.is_some(),
            "Starting nutrition analysis"
        );

        let prompt = build_prompt(query, search_type, profile);

        match self.generator.generate(&prompt).await {
            Ok(response_text) => {
                tracing::info!(
                    query,
                    response_length = response_text.len(),
                    "Nutrition analysis completed"
                );
                parse_response(&response_text, query)
            }
            Err(error) => {
                tracing::warn!(query, %error, "Text generation failed, using fallback analysis");
                fallback_analysis(query)
            }
        }
    }
}

// ==================== Prompt construction ====================

fn build_prompt(query: &str, search_type: SearchType, profile: Option<&HealthProfile>) -> String {
    let mut prompt = format!(
        r#"You are a friendly nutrition expert. Analyze this food item: "{query}" ({search_type})

Write your analysis in SIMPLE, EASY-TO-UNDERSTAND language that any normal person can read and understand. Avoid technical jargon and medical terms. Use everyday words.

CRITICAL: Return ONLY a valid JSON object. Do NOT wrap it in markdown code blocks, do NOT add any text before or after the JSON. Start your response directly with {{ and end with }}.

Required JSON format:
{{
  "healthImpact": "positive|negative|neutral|caution",
  "score": 0-100,
  "analysis": "Write a friendly, conversational explanation (2-3 sentences) about what this food is and how it affects your health. Use everyday language that anyone can understand.",
  "recommendations": ["Simple, practical advice like 'Eat in small portions' or 'Great choice for a healthy snack'"],
  "warnings": ["Simple warnings like 'High in sugar' or 'Contains allergens'"],
  "benefits": ["Simple benefits like 'Good for your heart' or 'Helps with energy'"],
  "nutritionalFacts": {{
    "calories": "Simple explanation like 'About 100 calories per serving'",
    "macros": "Simple breakdown like 'Mostly carbs with some protein'",
    "keyNutrients": ["Simple nutrients like 'Vitamin C', 'Fiber', 'Iron'"]
  }},
  "simpleSummary": "One sentence summary that anyone can understand"
}}

IMPORTANT:
- Use simple words like "good for you" instead of "beneficial"
- Use "sugar" instead of "glucose" and "salt" instead of "sodium"
- Make it sound like you're talking to a friend, not a doctor
- The "analysis" field should be a clean, readable paragraph (2-3 sentences)
- Return ONLY the JSON object, no markdown formatting, no code blocks, no extra text
- The JSON must be valid and parseable"#
    );

    if let Some(profile) = profile {
        push_profile_context(&mut prompt, profile);
    }

    prompt
}

fn push_profile_context(prompt: &mut String, profile: &HealthProfile) {
    prompt.push_str(
        "\n\nPERSONALIZED HEALTH CONTEXT:\n\nIMPORTANT: Consider this user's specific health situation when analyzing the food. Make your recommendations personal and relevant to their health needs."
    );

    let mut condition_lines = Vec::new();
    if let Some(conditions) = &profile.health_conditions {
        if let Some(diabetes) = &conditions.diabetes {
            condition_lines.push(
                format!(
                    "- Diabetes ({}): {} severity",
                    diabetes.kind.as_str(),
                    diabetes.severity.as_str()
                )
            );
        }
        if let Some(hypertension) = &conditions.hypertension {
            condition_lines.push(
                format!("- High Blood Pressure: {} severity", hypertension.severity.as_str())
            );
        }
        if let Some(heart) = &conditions.heart_disease {
            condition_lines.push(
                format!(
                    "- Heart Disease: {} ({} severity)",
                    heart.kind.as_str(),
                    heart.severity.as_str()
                )
            );
        }
        if let Some(kidney) = &conditions.kidney_disease {
            condition_lines.push(format!("- Kidney Disease: Stage {}", kidney.stage.as_str()));
        }
        if let Some(digestive) = &conditions.digestive_issues {
            let labels = digestive.labels();
            if !labels.is_empty() {
                condition_lines.push(format!("- Digestive Issues: {}", labels.join(", ")));
            }
        }
    }
    if !condition_lines.is_empty() {
        prompt.push_str("\n\nHEALTH CONDITIONS:");
        for line in condition_lines {
            prompt.push('\n');
            prompt.push_str(&line);
        }
    }

    if let Some(allergies) = profile.allergies.as_ref().filter(|a| !a.food.is_empty()) {
        prompt.push_str("\n\nFOOD ALLERGIES:");
        for allergy in &allergies.food {
            prompt.push_str(
                &format!("\n- {}: {} reaction", allergy.allergen, allergy.severity.as_str())
            );
            if let Some(reaction) = &allergy.reaction {
                prompt.push_str(&format!(" ({})", reaction));
            }
        }
    }

    if let Some(restrictions) = &profile.dietary_restrictions {
        let labels = restrictions.active_labels();
        if !labels.is_empty() {
            prompt.push_str(&format!("\n\nDIETARY RESTRICTIONS: {}", labels.join(", ")));
        }
    }

    let mut goal_lines = Vec::new();
    if let Some(goals) = &profile.health_goals {
        if let Some(weight) = &goals.weight_management {
            let mut line = format!("- Weight Goal: {} weight", weight.goal.as_str());
            if let (Some(current), Some(target)) = (weight.current_weight, weight.target_weight) {
                line.push_str(&format!(" (Current: {}lbs, Target: {}lbs)", current, target));
            }
            goal_lines.push(line);
        }
        if let Some(blood_sugar) = &goals.blood_sugar {
            let mut line = format!("- Blood Sugar: {}", blood_sugar.goal.as_str());
            if
                let (Some(current), Some(target)) = (
                    blood_sugar.current_hba1c,
                    blood_sugar.target_hba1c,
                )
            {
                line.push_str(&format!(" (Current A1C: {}%, Target: {}%)", current, target));
            }
            goal_lines.push(line);
        }
        if let Some(blood_pressure) = &goals.blood_pressure {
            let mut line = format!("- Blood Pressure: {}", blood_pressure.goal.as_str());
            if
                let (Some(systolic), Some(diastolic)) = (
                    blood_pressure.target_systolic,
                    blood_pressure.target_diastolic,
                )
            {
                line.push_str(&format!(" (Target: {}/{})", systolic, diastolic));
            }
            goal_lines.push(line);
        }
    }
    if !goal_lines.is_empty() {
        prompt.push_str("\n\nHEALTH GOALS:");
        for line in goal_lines {
            prompt.push('\n');
            prompt.push_str(&line);
        }
    }

    if let Some(medications) = profile.medications.as_ref().filter(|m| !m.is_empty()) {
        prompt.push_str("\n\nCURRENT MEDICATIONS:");
        for med in medications {
            prompt.push_str(&format!("\n- {} ({}): For {}", med.name, med.dosage, med.purpose));
        }
    }

    prompt.push_str(
        "\n\nPERSONALIZATION INSTRUCTIONS:\n- Consider their specific health conditions when giving advice\n- Mention any relevant warnings based on their conditions\n- Adjust recommendations based on their dietary restrictions\n- Consider their health goals when scoring the food\n- Be extra careful with allergen warnings if they have food allergies\n- Make the analysis feel personal and relevant to their situation"
    );
}

// ==================== Parsing pipeline ====================

fn parse_response(response_text: &str, query: &str) -> SearchAnalysis {
    let clean = strip_code_fences(response_text.trim());

    if let Ok(Value::Object(parsed)) = serde_json::from_str::<Value>(clean) {
        tracing::debug!(query, "Parsed model response directly");
        return normalize_parsed(&parsed, response_text);
    }

    if let Some(repaired) = recover_json(clean) {
        if let Ok(Value::Object(parsed)) = serde_json::from_str::<Value>(&repaired) {
            tracing::debug!(query, "Recovered truncated JSON from model response");
            return normalize_parsed(&parsed, response_text);
        }
    }

    tracing::debug!(query, "Falling back to heuristic text parsing");
    parse_text_response(response_text, query)
}

fn strip_code_fences(text: &str) -> &str {
    let mut s = text;
    if let Some(rest) = s.strip_prefix("```") {
        s = rest.strip_prefix("json").unwrap_or(rest).trim_start();
        if let Some(stripped) = s.strip_suffix("```") {
            s = stripped.trim_end();
        }
    }
    s
}

/// Takes everything from the first `{` and appends any closing braces a
/// truncated response is missing before re-parsing.
fn recover_json(text: &str) -> Option<String> {
    let start = text.find('{')?;
    let mut candidate = text[start..].trim_end().to_string();

    let open = candidate.matches('{').count();
    let close = candidate.matches('}').count();
    if open > close {
        candidate.extend(std::iter::repeat('}').take(open - close));
    }

    Some(candidate)
}

fn parse_text_response(response_text: &str, query: &str) -> SearchAnalysis {
    let lowered = response_text.to_lowercase();
    let mut warnings = Vec::new();
    let mut benefits = Vec::new();

    for (needles, effect, message) in TEXT_RULES {
        if needles.iter().any(|needle| lowered.contains(needle)) {
            match effect {
                RuleEffect::Benefit => benefits.push(message.to_string()),
                RuleEffect::Warning => warnings.push(message.to_string()),
            }
        }
    }

    if benefits.is_empty() {
        benefits.push("Contains nutrients your body needs".to_string());
    }

    let analysis = response_text.trim();
    let analysis = if analysis.is_empty() {
        ANALYSIS_PLACEHOLDER.to_string()
    } else {
        analysis.to_string()
    };

    SearchAnalysis {
        health_impact: HealthImpact::Neutral,
        score: TEXT_FALLBACK_SCORE,
        analysis,
        recommendations: vec![
            "Eat in normal portions".to_string(),
            "Balance with other healthy foods".to_string()
        ],
        warnings,
        benefits,
        nutritional_facts: default_facts(),
        simple_summary: format!("Basic info about {} - check the full analysis for details.", query),
        is_fallback: true,
        fallback_reason: Some(FALLBACK_TEXT_PARSING.to_string()),
        raw_response: Some(response_text.to_string()),
    }
}

/// Static record returned when the generation call itself fails.
fn fallback_analysis(query: &str) -> SearchAnalysis {
    SearchAnalysis {
        health_impact: HealthImpact::Neutral,
        score: DEFAULT_SCORE,
        analysis: format!(
            "We're having trouble getting detailed info about \"{}\" right now. This is a basic analysis - for the best advice, try again in a moment.",
            query
        ),
        recommendations: vec![
            "Eat in normal portions".to_string(),
            "Check if you have any allergies".to_string(),
            "Balance with other healthy foods".to_string()
        ],
        warnings: vec![],
        benefits: vec![
            "Gives your body energy".to_string(),
            "Contains vitamins your body needs".to_string()
        ],
        nutritional_facts: NutritionalFacts {
            calories: "Depends on how much you eat".to_string(),
            macros: "Check the food label for details".to_string(),
            key_nutrients: vec!["Vitamins and minerals your body needs".to_string()],
        },
        simple_summary: "This food gives you energy and nutrients, but we need more info for better advice.".to_string(),
        is_fallback: true,
        fallback_reason: Some(FALLBACK_SERVICE_UNAVAILABLE.to_string()),
        raw_response: None,
    }
}

// ==================== Field normalization ====================

fn normalize_parsed(
    parsed: &serde_json::Map<String, Value>,
    raw_response: &str
) -> SearchAnalysis {
    SearchAnalysis {
        health_impact: normalize_health_impact(parsed.get("healthImpact")),
        score: normalize_score(parsed.get("score")),
        analysis: normalize_text(parsed.get("analysis"), ANALYSIS_PLACEHOLDER),
        recommendations: normalize_list(parsed.get("recommendations")),
        warnings: normalize_list(parsed.get("warnings")),
        benefits: normalize_list(parsed.get("benefits")),
        nutritional_facts: normalize_facts(parsed.get("nutritionalFacts")),
        simple_summary: normalize_text(parsed.get("simpleSummary"), SUMMARY_PLACEHOLDER),
        is_fallback: false,
        fallback_reason: None,
        raw_response: Some(raw_response.to_string()),
    }
}

fn normalize_health_impact(value: Option<&Value>) -> HealthImpact {
    match value.and_then(Value::as_str) {
        Some("positive") => HealthImpact::Positive,
        Some("negative") => HealthImpact::Negative,
        Some("caution") => HealthImpact::Caution,
        _ => HealthImpact::Neutral,
    }
}

fn normalize_score(value: Option<&Value>) -> i64 {
    let parsed = match value {
        Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            trimmed
                .parse::<i64>()
                .ok()
                .or_else(|| trimmed.parse::<f64>().ok().map(|f| f as i64))
        }
        _ => None,
    };
    parsed.unwrap_or(DEFAULT_SCORE).clamp(0, 100)
}

fn normalize_text(value: Option<&Value>, placeholder: &str) -> String {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| placeholder.to_string())
}

fn normalize_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) =>
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        _ => vec![],
    }
}

fn normalize_facts(value: Option<&Value>) -> NutritionalFacts {
    match value {
        Some(Value::Object(facts)) =>
            NutritionalFacts {
                calories: normalize_text(facts.get("calories"), FACTS_PLACEHOLDER),
                macros: normalize_text(facts.get("macros"), FACTS_PLACEHOLDER),
                key_nutrients: normalize_list(facts.get("keyNutrients")),
            },
        _ => default_facts(),
    }
}

fn default_facts() -> NutritionalFacts {
    NutritionalFacts {
        calories: FACTS_PLACEHOLDER.to_string(),
        macros: FACTS_PLACEHOLDER.to_string(),
        key_nutrients: vec![],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::*;
    use anyhow::Result;
    use async_trait::async_trait;
    use mongodb::bson::oid::ObjectId;
    use serde_json::json;

    struct CannedGenerator(String);

    #[async_trait]
    impl TextGenerator for CannedGenerator {
        async fn generate(&self, _prompt: &str) -> Result<String> {
            Ok(self.0.clone())
        }
    }

    struct FailingGenerator;

    #[async_trait]
    impl TextGenerator for FailingGenerator {
        async fn generate(&self, _prompt: &str) -> Result<String> {
            anyhow::bail!("connection timed out")
        }
    }

    fn service_with(text: &str) -> AnalysisService {
        AnalysisService::new(Arc::new(CannedGenerator(text.to_string())))
    }

    fn profile_with_allergies() -> HealthProfile {
        HealthProfile {
            id: None,
            user_id: ObjectId::new(),
            health_conditions: Some(HealthConditions {
                diabetes: Some(DiabetesCondition {
                    kind: DiabetesType::Type2,
                    severity: ConditionSeverity::Moderate,
                }),
                ..Default::default()
            }),
            allergies: Some(Allergies {
                food: vec![FoodAllergy {
                    allergen: "peanuts".to_string(),
                    severity: AllergySeverity::Severe,
                    reaction: Some("hives".to_string()),
                }],
            }),
            dietary_restrictions: Some(DietaryRestrictions {
                vegetarian: true,
                ..Default::default()
            }),
            health_goals: None,
            medications: Some(vec![Medication {
                name: "Metformin".to_string(),
                dosage: "500mg".to_string(),
                purpose: "diabetes".to_string(),
            }]),
            version: 1,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        }
    }

    // ---- prompt construction ----

    #[test]
    fn prompt_requests_fixed_json_shape() {
        let prompt = build_prompt("oat milk", SearchType::ProductName, None);
        assert!(prompt.contains("\"oat milk\" (product_name)"));
        assert!(prompt.contains("\"healthImpact\""));
        assert!(prompt.contains("\"nutritionalFacts\""));
        assert!(!prompt.contains("PERSONALIZED HEALTH CONTEXT"));
    }

    #[test]
    fn prompt_includes_populated_profile_sections() {
        let profile = profile_with_allergies();
        let prompt = build_prompt("ramen", SearchType::ProductName, Some(&profile));

        assert!(prompt.contains("PERSONALIZED HEALTH CONTEXT"));
        assert!(prompt.contains("- Diabetes (type2): moderate severity"));
        assert!(prompt.contains("FOOD ALLERGIES:"));
        assert!(prompt.contains("- peanuts: severe reaction (hives)"));
        assert!(prompt.contains("DIETARY RESTRICTIONS: Vegetarian"));
        assert!(prompt.contains("- Metformin (500mg): For diabetes"));
        // no goals configured, so the section is omitted
        assert!(!prompt.contains("HEALTH GOALS:"));
    }

    #[test]
    fn prompt_omits_empty_subsections() {
        let profile = HealthProfile {
            allergies: Some(Allergies { food: vec![] }),
            health_conditions: None,
            dietary_restrictions: Some(DietaryRestrictions::default()),
            medications: Some(vec![]),
            ..profile_with_allergies()
        };
        let prompt = build_prompt("ramen", SearchType::Ingredient, Some(&profile));

        assert!(prompt.contains("PERSONALIZED HEALTH CONTEXT"));
        assert!(!prompt.contains("HEALTH CONDITIONS:"));
        assert!(!prompt.contains("FOOD ALLERGIES:"));
        assert!(!prompt.contains("DIETARY RESTRICTIONS:"));
        assert!(!prompt.contains("CURRENT MEDICATIONS:"));
    }

    // ---- hard-failure fallback ----

    #[tokio::test]
    async fn generator_failure_yields_static_fallback() {
        let service = AnalysisService::new(Arc::new(FailingGenerator));
        let result = service.analyze("", SearchType::Barcode, None).await;

        assert!(result.is_fallback);
        assert_eq!(result.fallback_reason.as_deref(), Some("service unavailable"));
        assert_eq!(result.health_impact, HealthImpact::Neutral);
        assert_eq!(result.score, 50);
        assert!(!result.recommendations.is_empty());
        assert!(result.raw_response.is_none());
    }

    // ---- direct parse ----

    #[tokio::test]
    async fn well_formed_fenced_response_round_trips() {
        let text = "```json\n{\"healthImpact\":\"positive\",\"score\":82,\"analysis\":\"Greek yogurt is a good protein source.\",\"recommendations\":[\"Pair with fruit\"],\"warnings\":[],\"benefits\":[\"High in protein\"],\"nutritionalFacts\":{\"calories\":\"About 120 per serving\",\"macros\":\"Mostly protein\",\"keyNutrients\":[\"Calcium\",\"Protein\"]},\"simpleSummary\":\"A healthy protein-rich snack.\"}\n```";
        let service = service_with(text);
        let result = service.analyze("greek yogurt", SearchType::ProductName, None).await;

        assert!(!result.is_fallback);
        assert!(result.fallback_reason.is_none());
        assert_eq!(result.health_impact, HealthImpact::Positive);
        assert_eq!(result.score, 82);
        assert_eq!(result.analysis, "Greek yogurt is a good protein source.");
        assert_eq!(result.recommendations, vec!["Pair with fruit"]);
        assert!(result.warnings.is_empty());
        assert_eq!(result.benefits, vec!["High in protein"]);
        assert_eq!(result.nutritional_facts.calories, "About 120 per serving");
        assert_eq!(result.nutritional_facts.macros, "Mostly protein");
        assert_eq!(result.nutritional_facts.key_nutrients, vec!["Calcium", "Protein"]);
        assert_eq!(result.simple_summary, "A healthy protein-rich snack.");
        assert_eq!(result.raw_response.as_deref(), Some(text));
    }

    // ---- brace repair ----

    #[test]
    fn truncated_json_is_repaired() {
        let result = parse_response(
            "Here you go: {\"healthImpact\":\"positive\",\"score\":80",
            "banana"
        );

        assert!(!result.is_fallback);
        assert_eq!(result.health_impact, HealthImpact::Positive);
        assert_eq!(result.score, 80);
        assert_eq!(result.analysis, ANALYSIS_PLACEHOLDER);
    }

    #[test]
    fn truncated_nested_object_is_repaired() {
        let result = parse_response(
            "{\"healthImpact\":\"caution\",\"score\":35,\"nutritionalFacts\":{\"calories\":\"High\"",
            "candy"
        );

        assert!(!result.is_fallback);
        assert_eq!(result.health_impact, HealthImpact::Caution);
        assert_eq!(result.score, 35);
        assert_eq!(result.nutritional_facts.calories, "High");
        assert_eq!(result.nutritional_facts.macros, FACTS_PLACEHOLDER);
    }

    // ---- heuristic text parse ----

    #[test]
    fn non_json_text_uses_keyword_heuristics() {
        let result = parse_response(
            "This snack is high in sugar but gives you plenty of energy.",
            "candy bar"
        );

        assert!(result.is_fallback);
        assert_eq!(result.fallback_reason.as_deref(), Some("text parsing fallback used"));
        assert_eq!(result.health_impact, HealthImpact::Neutral);
        assert_eq!(result.score, 60);
        assert!(result.warnings.contains(&"High in sugar".to_string()));
        assert!(result.benefits.contains(&"Gives you energy".to_string()));
        assert!(result.simple_summary.contains("candy bar"));
    }

    #[test]
    fn heuristic_parse_defaults_benefits_when_no_keyword_matches() {
        let result = parse_response("I could not determine anything useful.", "mystery");

        assert!(result.is_fallback);
        assert_eq!(result.benefits, vec!["Contains nutrients your body needs"]);
        assert_eq!(
            result.recommendations,
            vec!["Eat in normal portions", "Balance with other healthy foods"]
        );
    }

    // ---- field normalization ----

    #[test]
    fn unknown_health_impact_defaults_to_neutral() {
        let result = parse_response(r#"{"healthImpact":"amazing","score":70}"#, "apple");
        assert!(!result.is_fallback);
        assert_eq!(result.health_impact, HealthImpact::Neutral);
    }

    #[test]
    fn score_is_clamped_and_defaulted() {
        assert_eq!(normalize_score(Some(&json!(250))), 100);
        assert_eq!(normalize_score(Some(&json!(-5))), 0);
        assert_eq!(normalize_score(Some(&json!(82.9))), 82);
        assert_eq!(normalize_score(Some(&json!("73"))), 73);
        assert_eq!(normalize_score(Some(&json!("82.9"))), 82);
        assert_eq!(normalize_score(Some(&json!("not a number"))), 50);
        assert_eq!(normalize_score(Some(&json!(null))), 50);
        assert_eq!(normalize_score(None), 50);
    }

    #[test]
    fn lists_drop_blank_and_non_string_entries() {
        let value = json!(["keep", "", "  ", 42, null, "also keep"]);
        assert_eq!(normalize_list(Some(&value)), vec!["keep", "also keep"]);
        assert_eq!(normalize_list(Some(&json!("not an array"))), Vec::<String>::new());
        assert_eq!(normalize_list(None), Vec::<String>::new());
    }

    #[test]
    fn missing_facts_get_placeholders() {
        let facts = normalize_facts(Some(&json!({"calories": "About 90"})));
        assert_eq!(facts.calories, "About 90");
        assert_eq!(facts.macros, FACTS_PLACEHOLDER);
        assert!(facts.key_nutrients.is_empty());

        let absent = normalize_facts(None);
        assert_eq!(absent.calories, FACTS_PLACEHOLDER);

        let wrong_type = normalize_facts(Some(&json!("nope")));
        assert_eq!(wrong_type.macros, FACTS_PLACEHOLDER);
    }

    #[test]
    fn wrong_typed_fields_do_not_set_fallback_flag() {
        // a JSON parse that succeeds is never flagged, even when every field
        // needs a default
        let result = parse_response(r#"{"score":"many","recommendations":7}"#, "toast");
        assert!(!result.is_fallback);
        assert_eq!(result.score, 50);
        assert!(result.recommendations.is_empty());
        assert_eq!(result.analysis, ANALYSIS_PLACEHOLDER);
        assert_eq!(result.simple_summary, SUMMARY_PLACEHOLDER);
    }

    #[test]
    fn non_object_json_falls_through_to_text_parse() {
        let result = parse_response("42", "meaning");
        assert!(result.is_fallback);
        assert_eq!(result.fallback_reason.as_deref(), Some("text parsing fallback used"));
    }

    #[test]
    fn fence_stripping_handles_plain_and_tagged_fences() {
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("{\"a\":1}"), "{\"a\":1}");
    }
}

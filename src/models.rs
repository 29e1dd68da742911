use chrono::{ DateTime, Utc };
use serde::{ Deserialize, Serialize };
use mongodb::bson::oid::ObjectId;
use std::fmt;

mod bson_datetime {
    use chrono::{ DateTime, Utc, TimeZone };
    use serde::{ self, Deserialize, Deserializer, Serializer };

    #[derive(Deserialize)]
    #[serde(untagged)]
    pub(super) enum Wire {
        String(String),
        Extended {
            #[serde(rename = "$date")]
            date: Inner,
        },
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    pub(super) enum Inner {
        String(String),
        Long {
            #[serde(rename = "$numberLong")]
            millis: String,
        },
        Millis(i64),
    }

    pub(super) fn to_datetime(wire: Wire) -> Result<DateTime<Utc>, String> {
        let parse_millis = |ms: i64| {
            Utc.timestamp_millis_opt(ms).single().ok_or_else(|| "Invalid timestamp".to_string())
        };
        match wire {
            Wire::String(s) | Wire::Extended { date: Inner::String(s) } => {
                DateTime::parse_from_rfc3339(&s)
                    .map(|dt| dt.with_timezone(&Utc))
                    .or_else(|_| {
                        s.parse::<i64>()
                            .map_err(|_| "Invalid datetime format".to_string())
                            .and_then(parse_millis)
                    })
            }
            Wire::Extended { date: Inner::Long { millis } } => {
                millis
                    .parse::<i64>()
                    .map_err(|_| "Invalid timestamp".to_string())
                    .and_then(parse_millis)
            }
            Wire::Extended { date: Inner::Millis(ms) } => parse_millis(ms),
        }
    }

    pub fn serialize<S>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
        where S: Serializer
    {
        serializer.serialize_str(&date.to_rfc3339())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
        where D: Deserializer<'de>
    {
        let wire = Wire::deserialize(deserializer)?;
        to_datetime(wire).map_err(serde::de::Error::custom)
    }
}

// ==================== Users ====================

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct User {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    #[serde(with = "bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: String,
    pub username: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        UserResponse {
            id: user.id.map(|id| id.to_hex()).unwrap_or_default(),
            username: user.username,
            email: user.email,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    pub email: String,
    pub exp: i64,
    pub iat: i64,
}

// ==================== Health profile ====================

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct HealthProfile {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub user_id: ObjectId,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub health_conditions: Option<HealthConditions>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub allergies: Option<Allergies>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub dietary_restrictions: Option<DietaryRestrictions>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub health_goals: Option<HealthGoals>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub medications: Option<Vec<Medication>>,

    pub version: i32,
    #[serde(with = "bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct HealthConditions {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub diabetes: Option<DiabetesCondition>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub hypertension: Option<HypertensionCondition>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub heart_disease: Option<HeartDiseaseCondition>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub kidney_disease: Option<KidneyDiseaseCondition>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub digestive_issues: Option<DigestiveIssues>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DiabetesCondition {
    #[serde(rename = "type")]
    pub kind: DiabetesType,
    pub severity: ConditionSeverity,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum DiabetesType {
    Type1,
    Type2,
    Gestational,
    Prediabetes,
}

impl DiabetesType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiabetesType::Type1 => "type1",
            DiabetesType::Type2 => "type2",
            DiabetesType::Gestational => "gestational",
            DiabetesType::Prediabetes => "prediabetes",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum ConditionSeverity {
    Mild,
    Moderate,
    Severe,
}

impl ConditionSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConditionSeverity::Mild => "mild",
            ConditionSeverity::Moderate => "moderate",
            ConditionSeverity::Severe => "severe",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct HypertensionCondition {
    pub severity: ConditionSeverity,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub systolic: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub diastolic: Option<i32>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct HeartDiseaseCondition {
    #[serde(rename = "type")]
    pub kind: HeartDiseaseType,
    pub severity: ConditionSeverity,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum HeartDiseaseType {
    Coronary,
    Arrhythmia,
    HeartFailure,
}

impl HeartDiseaseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            HeartDiseaseType::Coronary => "coronary",
            HeartDiseaseType::Arrhythmia => "arrhythmia",
            HeartDiseaseType::HeartFailure => "heart_failure",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct KidneyDiseaseCondition {
    pub stage: KidneyStage,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub dialysis: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum KidneyStage {
    #[serde(rename = "1")] Stage1,
    #[serde(rename = "2")] Stage2,
    #[serde(rename = "3a")] Stage3a,
    #[serde(rename = "3b")] Stage3b,
    #[serde(rename = "4")] Stage4,
    #[serde(rename = "5")] Stage5,
}

impl KidneyStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            KidneyStage::Stage1 => "1",
            KidneyStage::Stage2 => "2",
            KidneyStage::Stage3a => "3a",
            KidneyStage::Stage3b => "3b",
            KidneyStage::Stage4 => "4",
            KidneyStage::Stage5 => "5",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct DigestiveIssues {
    #[serde(default)]
    pub ibs: bool,
    #[serde(default)]
    pub crohns: bool,
    #[serde(default)]
    pub colitis: bool,
    #[serde(default)]
    pub celiac: bool,
    #[serde(default)]
    pub lactose_intolerant: bool,
}

impl DigestiveIssues {
    pub fn labels(&self) -> Vec<&'static str> {
        let mut out = Vec::new();
        if self.ibs {
            out.push("IBS");
        }
        if self.crohns {
            out.push("Crohn's Disease");
        }
        if self.colitis {
            out.push("Colitis");
        }
        if self.celiac {
            out.push("Celiac Disease");
        }
        if self.lactose_intolerant {
            out.push("Lactose Intolerant");
        }
        out
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Allergies {
    #[serde(default)]
    pub food: Vec<FoodAllergy>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct FoodAllergy {
    pub allergen: String,
    pub severity: AllergySeverity,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub reaction: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum AllergySeverity {
    Mild,
    Moderate,
    Severe,
    LifeThreatening,
}

impl AllergySeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            AllergySeverity::Mild => "mild",
            AllergySeverity::Moderate => "moderate",
            AllergySeverity::Severe => "severe",
            AllergySeverity::LifeThreatening => "life_threatening",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct DietaryRestrictions {
    #[serde(default)]
    pub vegetarian: bool,
    #[serde(default)]
    pub vegan: bool,
    #[serde(default)]
    pub keto: bool,
    #[serde(default)]
    pub paleo: bool,
    #[serde(default)]
    pub low_carb: bool,
    #[serde(default)]
    pub low_sodium: bool,
    #[serde(default)]
    pub low_sugar: bool,
    #[serde(default)]
    pub gluten_free: bool,
    #[serde(default)]
    pub dairy_free: bool,
}

impl DietaryRestrictions {
    fn entries(&self) -> Vec<(&'static str, &'static str)> {
        let flags = [
            (self.vegetarian, "vegetarian", "Vegetarian"),
            (self.vegan, "vegan", "Vegan"),
            (self.keto, "keto", "Keto"),
            (self.paleo, "paleo", "Paleo"),
            (self.low_carb, "low_carb", "Low Carb"),
            (self.low_sodium, "low_sodium", "Low Sodium"),
            (self.low_sugar, "low_sugar", "Low Sugar"),
            (self.gluten_free, "gluten_free", "Gluten Free"),
            (self.dairy_free, "dairy_free", "Dairy Free"),
        ];
        flags
            .into_iter()
            .filter(|(set, _, _)| *set)
            .map(|(_, key, label)| (key, label))
            .collect()
    }

    pub fn active_keys(&self) -> Vec<String> {
        self.entries()
            .into_iter()
            .map(|(key, _)| key.to_string())
            .collect()
    }

    pub fn active_labels(&self) -> Vec<&'static str> {
        self.entries()
            .into_iter()
            .map(|(_, label)| label)
            .collect()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct HealthGoals {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub weight_management: Option<WeightGoal>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub blood_sugar: Option<BloodSugarGoal>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub blood_pressure: Option<BloodPressureGoal>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct WeightGoal {
    pub goal: WeightGoalKind,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub current_weight: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub target_weight: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum WeightGoalKind {
    Lose,
    Maintain,
    Gain,
}

impl WeightGoalKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WeightGoalKind::Lose => "lose",
            WeightGoalKind::Maintain => "maintain",
            WeightGoalKind::Gain => "gain",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BloodSugarGoal {
    pub goal: BloodSugarGoalKind,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub current_hba1c: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub target_hba1c: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum BloodSugarGoalKind {
    Control,
    Prevent,
    Reverse,
}

impl BloodSugarGoalKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BloodSugarGoalKind::Control => "control",
            BloodSugarGoalKind::Prevent => "prevent",
            BloodSugarGoalKind::Reverse => "reverse",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BloodPressureGoal {
    pub goal: BloodPressureGoalKind,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub target_systolic: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub target_diastolic: Option<i32>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum BloodPressureGoalKind {
    Lower,
    Maintain,
}

impl BloodPressureGoalKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BloodPressureGoalKind::Lower => "lower",
            BloodPressureGoalKind::Maintain => "maintain",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Medication {
    pub name: String,
    pub dosage: String,
    pub purpose: String,
}

/// Flattened profile view embedded in search responses and fed to the
/// analysis prompt builder.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct PersonalizationSummary {
    pub conditions: Vec<String>,
    pub allergies: Vec<String>,
    pub restrictions: Vec<String>,
    pub goals: Vec<String>,
    pub medications: Vec<String>,
}

impl HealthProfile {
    pub fn summary(&self) -> PersonalizationSummary {
        let mut summary = PersonalizationSummary::default();

        if let Some(conditions) = &self.health_conditions {
            if let Some(diabetes) = &conditions.diabetes {
                summary.conditions.push(format!("diabetes_{}", diabetes.kind.as_str()));
            }
            if let Some(hypertension) = &conditions.hypertension {
                summary.conditions.push(
                    format!("hypertension_{}", hypertension.severity.as_str())
                );
            }
            if let Some(heart) = &conditions.heart_disease {
                summary.conditions.push(format!("heart_disease_{}", heart.kind.as_str()));
            }
            if let Some(kidney) = &conditions.kidney_disease {
                summary.conditions.push(
                    format!("kidney_disease_stage_{}", kidney.stage.as_str())
                );
            }
        }

        if let Some(allergies) = &self.allergies {
            for allergy in &allergies.food {
                summary.allergies.push(
                    format!("{}_{}", allergy.allergen, allergy.severity.as_str())
                );
            }
        }

        if let Some(restrictions) = &self.dietary_restrictions {
            summary.restrictions = restrictions.active_keys();
        }

        if let Some(goals) = &self.health_goals {
            if let Some(weight) = &goals.weight_management {
                summary.goals.push(format!("weight_{}", weight.goal.as_str()));
            }
            if let Some(blood_sugar) = &goals.blood_sugar {
                summary.goals.push(format!("blood_sugar_{}", blood_sugar.goal.as_str()));
            }
            if let Some(blood_pressure) = &goals.blood_pressure {
                summary.goals.push(format!("blood_pressure_{}", blood_pressure.goal.as_str()));
            }
        }

        if let Some(medications) = &self.medications {
            for med in medications {
                summary.medications.push(format!("{}_{}", med.name, med.purpose));
            }
        }

        summary
    }
}

// ==================== Search ====================

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum SearchType {
    Barcode,
    ProductName,
    Ingredient,
}

impl SearchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchType::Barcode => "barcode",
            SearchType::ProductName => "product_name",
            SearchType::Ingredient => "ingredient",
        }
    }
}

impl fmt::Display for SearchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum HealthImpact {
    Positive,
    Negative,
    Neutral,
    Caution,
}

impl HealthImpact {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthImpact::Positive => "positive",
            HealthImpact::Negative => "negative",
            HealthImpact::Neutral => "neutral",
            HealthImpact::Caution => "caution",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NutritionalFacts {
    pub calories: String,
    pub macros: String,
    pub key_nutrients: Vec<String>,
}

/// Normalized nutrition assessment. Field values are guaranteed well-formed
/// by the analysis service regardless of what the model returned.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SearchAnalysis {
    pub health_impact: HealthImpact,
    pub score: i64,
    pub analysis: String,
    pub recommendations: Vec<String>,
    pub warnings: Vec<String>,
    pub benefits: Vec<String>,
    pub nutritional_facts: NutritionalFacts,
    pub simple_summary: String,
    pub is_fallback: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub fallback_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub raw_response: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SearchHistory {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub user_id: ObjectId,
    pub search_type: SearchType,
    pub search_query: String,
    pub analysis: SearchAnalysis,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub personalization: Option<PersonalizationSummary>,
    #[serde(with = "bson_datetime")]
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_profile() -> HealthProfile {
        HealthProfile {
            id: None,
            user_id: ObjectId::new(),
            health_conditions: Some(HealthConditions {
                diabetes: Some(DiabetesCondition {
                    kind: DiabetesType::Type2,
                    severity: ConditionSeverity::Moderate,
                }),
                hypertension: Some(HypertensionCondition {
                    severity: ConditionSeverity::Mild,
                    systolic: Some(135),
                    diastolic: Some(85),
                }),
                heart_disease: None,
                kidney_disease: Some(KidneyDiseaseCondition {
                    stage: KidneyStage::Stage3a,
                    dialysis: Some(false),
                }),
                digestive_issues: None,
            }),
            allergies: Some(Allergies {
                food: vec![FoodAllergy {
                    allergen: "peanuts".to_string(),
                    severity: AllergySeverity::LifeThreatening,
                    reaction: Some("anaphylaxis".to_string()),
                }],
            }),
            dietary_restrictions: Some(DietaryRestrictions {
                low_sugar: true,
                low_sodium: true,
                ..Default::default()
            }),
            health_goals: Some(HealthGoals {
                weight_management: Some(WeightGoal {
                    goal: WeightGoalKind::Lose,
                    current_weight: Some(190.0),
                    target_weight: Some(170.0),
                }),
                blood_sugar: Some(BloodSugarGoal {
                    goal: BloodSugarGoalKind::Control,
                    current_hba1c: Some(7.1),
                    target_hba1c: Some(6.5),
                }),
                blood_pressure: None,
            }),
            medications: Some(vec![Medication {
                name: "Metformin".to_string(),
                dosage: "500mg".to_string(),
                purpose: "diabetes".to_string(),
            }]),
            version: 1,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn summary_flattens_profile_sections() {
        let summary = sample_profile().summary();

        assert_eq!(
            summary.conditions,
            vec!["diabetes_type2", "hypertension_mild", "kidney_disease_stage_3a"]
        );
        assert_eq!(summary.allergies, vec!["peanuts_life_threatening"]);
        assert_eq!(summary.restrictions, vec!["low_sodium", "low_sugar"]);
        assert_eq!(summary.goals, vec!["weight_lose", "blood_sugar_control"]);
        assert_eq!(summary.medications, vec!["Metformin_diabetes"]);
    }

    #[test]
    fn summary_of_empty_profile_is_empty() {
        let profile = HealthProfile {
            health_conditions: None,
            allergies: None,
            dietary_restrictions: None,
            health_goals: None,
            medications: None,
            ..sample_profile()
        };
        let summary = profile.summary();
        assert!(summary.conditions.is_empty());
        assert!(summary.allergies.is_empty());
        assert!(summary.restrictions.is_empty());
        assert!(summary.goals.is_empty());
        assert!(summary.medications.is_empty());
    }

    #[test]
    fn search_analysis_serializes_camel_case() {
        let analysis = SearchAnalysis {
            health_impact: HealthImpact::Positive,
            score: 82,
            analysis: "Greek yogurt is a good protein source.".to_string(),
            recommendations: vec!["Pair with fruit".to_string()],
            warnings: vec![],
            benefits: vec!["High in protein".to_string()],
            nutritional_facts: NutritionalFacts {
                calories: "About 120 per serving".to_string(),
                macros: "Mostly protein".to_string(),
                key_nutrients: vec!["Calcium".to_string()],
            },
            simple_summary: "A healthy protein-rich snack.".to_string(),
            is_fallback: false,
            fallback_reason: None,
            raw_response: None,
        };

        let value = serde_json::to_value(&analysis).unwrap();
        assert_eq!(value["healthImpact"], "positive");
        assert_eq!(value["nutritionalFacts"]["keyNutrients"][0], "Calcium");
        assert_eq!(value["isFallback"], false);
        assert!(value.get("fallbackReason").is_none());
    }
}

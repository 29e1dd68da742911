use axum::{ extract::State, http::StatusCode, response::IntoResponse, Extension, Json };
use chrono::Utc;
use mongodb::bson::{ doc, oid::ObjectId };
use serde::{ Deserialize, Serialize };

use crate::{ db::AppState, error::{ AppError, Result }, models::* };

#[derive(Debug, Deserialize)]
pub struct HealthProfileInput {
    #[serde(default)]
    pub health_conditions: Option<HealthConditions>,
    #[serde(default)]
    pub allergies: Option<Allergies>,
    #[serde(default)]
    pub dietary_restrictions: Option<DietaryRestrictions>,
    #[serde(default)]
    pub health_goals: Option<HealthGoals>,
    #[serde(default)]
    pub medications: Option<Vec<Medication>>,
}

impl HealthProfileInput {
    fn validate(&self) -> Result<()> {
        if let Some(hypertension) = self.health_conditions
            .as_ref()
            .and_then(|c| c.hypertension.as_ref())
        {
            if let Some(systolic) = hypertension.systolic {
                if !(70..=250).contains(&systolic) {
                    return Err(
                        AppError::ValidationError(
                            "Systolic blood pressure must be between 70-250".to_string()
                        )
                    );
                }
            }
            if let Some(diastolic) = hypertension.diastolic {
                if !(40..=150).contains(&diastolic) {
                    return Err(
                        AppError::ValidationError(
                            "Diastolic blood pressure must be between 40-150".to_string()
                        )
                    );
                }
            }
        }
        Ok(())
    }

    /// Overwrites only the sections present in the request.
    fn apply_to(self, profile: &mut HealthProfile) {
        if self.health_conditions.is_some() {
            profile.health_conditions = self.health_conditions;
        }
        if self.allergies.is_some() {
            profile.allergies = self.allergies;
        }
        if self.dietary_restrictions.is_some() {
            profile.dietary_restrictions = self.dietary_restrictions;
        }
        if self.health_goals.is_some() {
            profile.health_goals = self.health_goals;
        }
        if self.medications.is_some() {
            profile.medications = self.medications;
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub success: bool,
    pub message: String,
    pub profile: HealthProfile,
}

fn user_id_from(claims: &Claims) -> Result<ObjectId> {
    ObjectId::parse_str(&claims.sub).map_err(|_|
        AppError::BadRequest("Invalid user ID".to_string())
    )
}

pub async fn upsert_profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<HealthProfileInput>
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let user_id = user_id_from(&claims)?;

    let collection = state.db.collection::<HealthProfile>("health_profiles");
    let now = Utc::now();

    let existing = collection
        .find_one(doc! { "user_id": user_id }, None).await
        .map_err(|e| AppError::InternalError(e.into()))?;

    if let Some(mut profile) = existing {
        payload.apply_to(&mut profile);
        profile.version += 1;
        profile.updated_at = now;

        collection
            .replace_one(doc! { "user_id": user_id }, &profile, None).await
            .map_err(|e| AppError::InternalError(e.into()))?;

        tracing::info!(user_id = %claims.sub, version = profile.version, "Health profile updated");

        Ok((
            StatusCode::OK,
            Json(ProfileResponse {
                success: true,
                message: "Health profile updated successfully".to_string(),
                profile,
            }),
        ))
    } else {
        let mut profile = HealthProfile {
            id: None,
            user_id,
            health_conditions: payload.health_conditions,
            allergies: payload.allergies,
            dietary_restrictions: payload.dietary_restrictions,
            health_goals: payload.health_goals,
            medications: payload.medications,
            version: 1,
            created_at: now,
            updated_at: now,
        };

        let result = collection
            .insert_one(&profile, None).await
            .map_err(|e| AppError::InternalError(e.into()))?;
        profile.id = result.inserted_id.as_object_id();

        tracing::info!(user_id = %claims.sub, "Health profile created");

        Ok((
            StatusCode::CREATED,
            Json(ProfileResponse {
                success: true,
                message: "Health profile created successfully".to_string(),
                profile,
            }),
        ))
    }
}

pub async fn get_profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>
) -> Result<impl IntoResponse> {
    let user_id = user_id_from(&claims)?;

    let profile = state.db
        .collection::<HealthProfile>("health_profiles")
        .find_one(doc! { "user_id": user_id }, None).await
        .map_err(|e| AppError::InternalError(e.into()))?
        .ok_or_else(|| AppError::NotFound("Health profile not found".to_string()))?;

    Ok(
        Json(ProfileResponse {
            success: true,
            message: "Health profile retrieved successfully".to_string(),
            profile,
        })
    )
}

pub async fn update_profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<HealthProfileInput>
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let user_id = user_id_from(&claims)?;

    let collection = state.db.collection::<HealthProfile>("health_profiles");

    let mut profile = collection
        .find_one(doc! { "user_id": user_id }, None).await
        .map_err(|e| AppError::InternalError(e.into()))?
        .ok_or_else(|| AppError::NotFound("Health profile not found".to_string()))?;

    payload.apply_to(&mut profile);
    profile.version += 1;
    profile.updated_at = Utc::now();

    collection
        .replace_one(doc! { "user_id": user_id }, &profile, None).await
        .map_err(|e| AppError::InternalError(e.into()))?;

    tracing::info!(user_id = %claims.sub, version = profile.version, "Health profile updated");

    Ok(
        Json(ProfileResponse {
            success: true,
            message: "Health profile updated successfully".to_string(),
            profile,
        })
    )
}

pub async fn delete_profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>
) -> Result<impl IntoResponse> {
    let user_id = user_id_from(&claims)?;

    let deleted = state.db
        .collection::<HealthProfile>("health_profiles")
        .find_one_and_delete(doc! { "user_id": user_id }, None).await
        .map_err(|e| AppError::InternalError(e.into()))?;

    if deleted.is_none() {
        return Err(AppError::NotFound("Health profile not found".to_string()));
    }

    tracing::info!(user_id = %claims.sub, "Health profile deleted");

    Ok(
        Json(
            serde_json::json!({
        "success": true,
        "message": "Health profile deleted successfully",
    })
        )
    )
}

pub async fn get_summary(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>
) -> Result<impl IntoResponse> {
    let user_id = user_id_from(&claims)?;

    let profile = state.db
        .collection::<HealthProfile>("health_profiles")
        .find_one(doc! { "user_id": user_id }, None).await
        .map_err(|e| AppError::InternalError(e.into()))?
        .ok_or_else(|| AppError::NotFound("Health profile not found".to_string()))?;

    Ok(
        Json(
            serde_json::json!({
        "success": true,
        "summary": profile.summary(),
    })
        )
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hypertension_ranges_are_validated() {
        let input = HealthProfileInput {
            health_conditions: Some(HealthConditions {
                hypertension: Some(HypertensionCondition {
                    severity: ConditionSeverity::Mild,
                    systolic: Some(300),
                    diastolic: Some(80),
                }),
                ..Default::default()
            }),
            allergies: None,
            dietary_restrictions: None,
            health_goals: None,
            medications: None,
        };
        assert!(input.validate().is_err());
    }

    #[test]
    fn empty_input_validates() {
        let input = HealthProfileInput {
            health_conditions: None,
            allergies: None,
            dietary_restrictions: None,
            health_goals: None,
            medications: None,
        };
        assert!(input.validate().is_ok());
    }
}

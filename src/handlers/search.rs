use axum::{
    extract::{ Query, State },
    http::StatusCode,
    response::IntoResponse,
    Extension,
    Json,
};
use chrono::{ DateTime, Utc };
use futures::TryStreamExt;
use mongodb::{ bson::{ doc, oid::ObjectId }, options::FindOptions };
use serde::{ Deserialize, Serialize };

use crate::{ db::AppState, error::{ AppError, Result }, models::* };

const MAX_QUERY_LENGTH: usize = 200;
const MAX_PAGE_SIZE: i64 = 50;

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub search_query: String,
    pub search_type: SearchType,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub success: bool,
    pub message: String,
    pub search_result: SearchResult,
}

#[derive(Debug, Serialize)]
pub struct SearchResult {
    pub query: String,
    #[serde(rename = "type")]
    pub search_type: SearchType,
    pub analysis: SearchAnalysis,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub personalization: Option<PersonalizationSummary>,
    pub timestamp: DateTime<Utc>,
}

fn user_id_from(claims: &Claims) -> Result<ObjectId> {
    ObjectId::parse_str(&claims.sub).map_err(|_|
        AppError::BadRequest("Invalid user ID".to_string())
    )
}

fn validate_query(query: &str) -> Result<()> {
    let length = query.chars().count();
    if length == 0 || length > MAX_QUERY_LENGTH {
        return Err(
            AppError::ValidationError(
                "Search query must be between 1 and 200 characters".to_string()
            )
        );
    }
    Ok(())
}

pub async fn search(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<SearchRequest>
) -> Result<impl IntoResponse> {
    let query = payload.search_query.trim();
    validate_query(query)?;

    let user_id = user_id_from(&claims)?;

    let profile = state.db
        .collection::<HealthProfile>("health_profiles")
        .find_one(doc! { "user_id": user_id }, None).await
        .map_err(|e| AppError::InternalError(e.into()))?;

    let analysis = state.analysis.analyze(query, payload.search_type, profile.as_ref()).await;
    let personalization = profile.as_ref().map(HealthProfile::summary);

    let now = Utc::now();
    let history = SearchHistory {
        id: None,
        user_id,
        search_type: payload.search_type,
        search_query: query.to_string(),
        analysis: analysis.clone(),
        personalization: personalization.clone(),
        created_at: now,
    };

    state.db
        .collection::<SearchHistory>("search_history")
        .insert_one(&history, None).await
        .map_err(|e| AppError::InternalError(e.into()))?;

    tracing::info!(
        user_id = %claims.sub,
        query,
        search_type = payload.search_type.as_str(),
        is_fallback = analysis.is_fallback,
        "Search completed"
    );

    Ok((
        StatusCode::OK,
        Json(SearchResponse {
            success: true,
            message: "Search completed successfully".to_string(),
            search_result: SearchResult {
                query: query.to_string(),
                search_type: payload.search_type,
                analysis,
                personalization,
                timestamp: now,
            },
        }),
    ))
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub success: bool,
    pub history: Vec<SearchHistory>,
    pub page: i64,
    pub limit: i64,
    pub total: u64,
}

pub async fn get_history(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<HistoryQuery>
) -> Result<impl IntoResponse> {
    let user_id = user_id_from(&claims)?;

    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(20).clamp(1, MAX_PAGE_SIZE);

    let collection = state.db.collection::<SearchHistory>("search_history");
    let filter = doc! { "user_id": user_id };

    let total = collection
        .count_documents(filter.clone(), None).await
        .map_err(|e| AppError::InternalError(e.into()))?;

    let options = FindOptions::builder()
        .sort(doc! { "created_at": -1 })
        .skip(((page - 1) * limit) as u64)
        .limit(limit)
        .build();

    let history: Vec<SearchHistory> = collection
        .find(filter, options).await
        .map_err(|e| AppError::InternalError(e.into()))?
        .try_collect().await
        .map_err(|e| AppError::InternalError(e.into()))?;

    Ok(
        Json(HistoryResponse {
            success: true,
            history,
            page,
            limit,
            total,
        })
    )
}

#[derive(Debug, Serialize)]
pub struct HealthImpactDistribution {
    pub positive: u64,
    pub negative: u64,
    pub neutral: u64,
    pub caution: u64,
}

pub async fn get_analytics(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>
) -> Result<impl IntoResponse> {
    let user_id = user_id_from(&claims)?;

    let collection = state.db.collection::<SearchHistory>("search_history");

    let total = collection
        .count_documents(doc! { "user_id": user_id }, None).await
        .map_err(|e| AppError::InternalError(e.into()))?;

    let impacts = [
        HealthImpact::Positive,
        HealthImpact::Negative,
        HealthImpact::Neutral,
        HealthImpact::Caution,
    ];
    let mut counts = [0u64; 4];
    for (i, impact) in impacts.iter().enumerate() {
        counts[i] = collection
            .count_documents(
                doc! { "user_id": user_id, "analysis.healthImpact": impact.as_str() },
                None
            ).await
            .map_err(|e| AppError::InternalError(e.into()))?;
    }

    Ok(
        Json(
            serde_json::json!({
        "success": true,
        "analytics": {
            "total_searches": total,
            "health_impact_distribution": HealthImpactDistribution {
                positive: counts[0],
                negative: counts[1],
                neutral: counts[2],
                caution: counts[3],
            },
        },
    })
        )
    )
}

pub async fn get_trending() -> impl IntoResponse {
    Json(
        serde_json::json!({
        "success": true,
        "message": "Trending searches",
        "trending": [
            "organic apples",
            "quinoa salad",
            "greek yogurt",
            "avocado toast",
            "green smoothie",
        ],
    })
    )
}

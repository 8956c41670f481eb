use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::{Extension, Json};
use coffee_auth::Claims;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use super::error::ApiError;
use super::AppState;
use crate::domain::entity::drink::Drink;

const INVALID_BODY: &str = "Request does not contain a valid JSON body.";

// --- DTO ---

/// 公開一覧用の短い表現。レシピは含めない。
#[derive(Debug, Serialize)]
pub struct DrinkSummary {
    pub id: i64,
    pub title: String,
}

/// 認可済みクライアント向けの詳細表現。
#[derive(Debug, Serialize)]
pub struct DrinkDetail {
    pub id: i64,
    pub title: String,
    pub recipe: Value,
}

impl From<&Drink> for DrinkSummary {
    fn from(d: &Drink) -> Self {
        Self {
            id: d.id,
            title: d.title.clone(),
        }
    }
}

impl From<&Drink> for DrinkDetail {
    fn from(d: &Drink) -> Self {
        Self {
            id: d.id,
            title: d.title.clone(),
            recipe: d.recipe.clone(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct DrinkRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub recipe: Option<Value>,
}

impl DrinkRequest {
    fn title(&self) -> Option<&str> {
        self.title.as_deref().map(str::trim).filter(|t| !t.is_empty())
    }

    fn recipe(&self) -> Option<&Value> {
        self.recipe.as_ref().filter(|r| !is_blank(r))
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        _ => false,
    }
}

/// レシピは材料の配列か単一の材料オブジェクトに限る。
fn validate_recipe(recipe: &Value) -> Result<(), ApiError> {
    match recipe {
        Value::Array(_) | Value::Object(_) => Ok(()),
        _ => Err(ApiError::Unprocessable),
    }
}

fn parse_body(payload: Result<Json<DrinkRequest>, JsonRejection>) -> Result<DrinkRequest, ApiError> {
    payload
        .map(|Json(body)| body)
        .map_err(|_| ApiError::BadRequest(INVALID_BODY.to_string()))
}

fn parse_id(path: Result<Path<i64>, PathRejection>) -> Result<i64, ApiError> {
    path.map(|Path(id)| id)
        .map_err(|_| ApiError::NotFound("Resource not found".to_string()))
}

async fn find_drink(state: &AppState, id: i64) -> Result<Drink, ApiError> {
    state
        .drink_repo
        .find_by_id(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Drink with ID {id} not found.")))
}

// --- Handlers ---

/// GET /drinks
pub async fn list_drinks(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let drinks = state.drink_repo.find_all().await?;
    let drinks: Vec<DrinkSummary> = drinks.iter().map(DrinkSummary::from).collect();
    Ok(Json(json!({"success": true, "drinks": drinks})))
}

/// GET /drinks-detail
pub async fn list_drink_details(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Value>, ApiError> {
    let drinks = state.drink_repo.find_all().await?;
    let drinks: Vec<DrinkDetail> = drinks.iter().map(DrinkDetail::from).collect();
    tracing::debug!(sub = %claims.sub, count = drinks.len(), "listed drink details");
    Ok(Json(json!({"success": true, "drinks": drinks})))
}

/// POST /drinks
pub async fn create_drink(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    payload: Result<Json<DrinkRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let body = parse_body(payload)?;
    let (Some(title), Some(recipe)) = (body.title(), body.recipe()) else {
        return Err(ApiError::BadRequest(
            "Title and recipe are required.".to_string(),
        ));
    };
    validate_recipe(recipe)?;

    let drink = state.drink_repo.create(title, recipe).await?;
    info!(sub = %claims.sub, drink_id = drink.id, "drink created");

    Ok(Json(
        json!({"success": true, "drinks": [DrinkDetail::from(&drink)]}),
    ))
}

/// PATCH /drinks/{id}
pub async fn update_drink(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    path: Result<Path<i64>, PathRejection>,
    payload: Result<Json<DrinkRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let id = parse_id(path)?;
    let body = parse_body(payload)?;
    if body.title.is_none() && body.recipe.is_none() {
        return Err(ApiError::BadRequest(INVALID_BODY.to_string()));
    }
    if let Some(recipe) = body.recipe() {
        validate_recipe(recipe)?;
    }

    let mut drink = find_drink(&state, id).await?;
    drink.apply(body.title().map(str::to_string), body.recipe().cloned());
    state.drink_repo.update(&drink).await?;
    info!(sub = %claims.sub, drink_id = id, "drink updated");

    Ok(Json(
        json!({"success": true, "drinks": [DrinkDetail::from(&drink)]}),
    ))
}

/// DELETE /drinks/{id}
pub async fn delete_drink(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<Value>, ApiError> {
    let id = parse_id(path)?;
    let drink = find_drink(&state, id).await?;

    if !state.drink_repo.delete(drink.id).await? {
        return Err(ApiError::NotFound(format!("Drink with ID {id} not found.")));
    }
    info!(sub = %claims.sub, drink_id = id, "drink deleted");

    Ok(Json(json!({"success": true, "delete": id})))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::http::StatusCode;
    use coffee_auth::{HttpJwksFetcher, JwksCache, TokenVerifier, VerifierConfig};

    use super::*;
    use crate::domain::repository::drink_repository::MockDrinkRepository;
    use crate::domain::repository::RepositoryError;

    fn make_state(mock: MockDrinkRepository) -> AppState {
        let fetcher = HttpJwksFetcher::new(Duration::from_secs(1)).unwrap();
        let cache = Arc::new(JwksCache::new(
            "http://127.0.0.1:9/.well-known/jwks.json",
            Duration::from_secs(60),
            Arc::new(fetcher),
        ));
        AppState {
            drink_repo: Arc::new(mock),
            verifier: Arc::new(TokenVerifier::new(
                VerifierConfig::new("https://issuer.test/", "drinks"),
                cache,
            )),
        }
    }

    fn claims() -> Extension<Claims> {
        let claims: Claims = serde_json::from_value(json!({
            "sub": "auth0|barista",
            "iss": "https://issuer.test/",
            "aud": "drinks",
            "exp": 4_102_444_800u64,
            "permissions": ["post:drinks", "patch:drinks", "delete:drinks"],
        }))
        .unwrap();
        Extension(claims)
    }

    fn recipe() -> Value {
        json!([{"name": "water", "color": "blue", "parts": 1}])
    }

    #[tokio::test]
    async fn test_list_drinks_returns_short_form() {
        let mut mock = MockDrinkRepository::new();
        mock.expect_find_all()
            .returning(|| Ok(vec![Drink::new(1, "water".into(), recipe())]));

        let Json(body) = list_drinks(State(make_state(mock))).await.unwrap();
        assert_eq!(body["success"], true);
        assert_eq!(body["drinks"][0]["title"], "water");
        assert!(body["drinks"][0].get("recipe").is_none());
    }

    #[tokio::test]
    async fn test_list_drinks_repository_failure_is_internal() {
        let mut mock = MockDrinkRepository::new();
        mock.expect_find_all()
            .returning(|| Err(RepositoryError::Internal(anyhow::anyhow!("disk gone"))));

        let err = list_drinks(State(make_state(mock))).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_create_drink_requires_title_and_recipe() {
        let mut mock = MockDrinkRepository::new();
        mock.expect_create().never();

        let payload = Ok(Json(DrinkRequest {
            title: Some("water".into()),
            recipe: None,
        }));
        let err = create_drink(State(make_state(mock)), claims(), payload)
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "Title and recipe are required.");
    }

    #[tokio::test]
    async fn test_create_drink_rejects_scalar_recipe() {
        let mut mock = MockDrinkRepository::new();
        mock.expect_create().never();

        let payload = Ok(Json(DrinkRequest {
            title: Some("water".into()),
            recipe: Some(json!(42)),
        }));
        let err = create_drink(State(make_state(mock)), claims(), payload)
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_create_drink_returns_long_form() {
        let mut mock = MockDrinkRepository::new();
        mock.expect_create()
            .withf(|title, _| title.to_string() == "water")
            .returning(|title, recipe| Ok(Drink::new(7, title.to_string(), recipe.clone())));

        let payload = Ok(Json(DrinkRequest {
            title: Some("water".into()),
            recipe: Some(recipe()),
        }));
        let Json(body) = create_drink(State(make_state(mock)), claims(), payload)
            .await
            .unwrap();
        assert_eq!(body["drinks"][0]["id"], 7);
        assert_eq!(body["drinks"][0]["recipe"], recipe());
    }

    #[tokio::test]
    async fn test_create_drink_duplicate_title_is_bad_request() {
        let mut mock = MockDrinkRepository::new();
        mock.expect_create()
            .returning(|title, _| Err(RepositoryError::DuplicateTitle(title.to_string())));

        let payload = Ok(Json(DrinkRequest {
            title: Some("water".into()),
            recipe: Some(recipe()),
        }));
        let err = create_drink(State(make_state(mock)), claims(), payload)
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_update_drink_not_found() {
        let mut mock = MockDrinkRepository::new();
        mock.expect_find_by_id().returning(|_| Ok(None));
        mock.expect_update().never();

        let payload = Ok(Json(DrinkRequest {
            title: Some("tea".into()),
            recipe: None,
        }));
        let err = update_drink(State(make_state(mock)), claims(), Ok(Path(99)), payload)
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.to_string(), "Drink with ID 99 not found.");
    }

    #[tokio::test]
    async fn test_update_drink_applies_title_only() {
        let mut mock = MockDrinkRepository::new();
        mock.expect_find_by_id()
            .returning(|id| Ok(Some(Drink::new(id, "water".into(), recipe()))));
        mock.expect_update()
            .withf(|d| d.title == "sparkling water" && d.recipe == recipe())
            .times(1)
            .returning(|_| Ok(()));

        let payload = Ok(Json(DrinkRequest {
            title: Some("sparkling water".into()),
            recipe: None,
        }));
        let Json(body) = update_drink(State(make_state(mock)), claims(), Ok(Path(1)), payload)
            .await
            .unwrap();
        assert_eq!(body["drinks"][0]["title"], "sparkling water");
    }

    #[tokio::test]
    async fn test_update_drink_deleted_concurrently_is_not_found() {
        let mut mock = MockDrinkRepository::new();
        mock.expect_find_by_id()
            .returning(|id| Ok(Some(Drink::new(id, "water".into(), recipe()))));
        mock.expect_update()
            .returning(|d| Err(RepositoryError::NotFound(d.id)));

        let payload = Ok(Json(DrinkRequest {
            title: Some("tea".into()),
            recipe: None,
        }));
        let err = update_drink(State(make_state(mock)), claims(), Ok(Path(4)), payload)
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.to_string(), "Drink with ID 4 not found.");
    }

    #[tokio::test]
    async fn test_update_drink_empty_body_is_bad_request() {
        let mut mock = MockDrinkRepository::new();
        mock.expect_find_by_id().never();

        let payload = Ok(Json(DrinkRequest::default()));
        let err = update_drink(State(make_state(mock)), claims(), Ok(Path(1)), payload)
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_delete_drink_returns_deleted_id() {
        let mut mock = MockDrinkRepository::new();
        mock.expect_find_by_id()
            .returning(|id| Ok(Some(Drink::new(id, "water".into(), recipe()))));
        mock.expect_delete().returning(|_| Ok(true));

        let Json(body) = delete_drink(State(make_state(mock)), claims(), Ok(Path(3)))
            .await
            .unwrap();
        assert_eq!(body, json!({"success": true, "delete": 3}));
    }
}

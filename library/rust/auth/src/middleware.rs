//! 認可ガードと axum 用ミドルウェア。

use std::future::Future;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::{debug, error, info};

use crate::claims::Claims;
use crate::error::AuthError;
use crate::extractor::extract_bearer_token;
use crate::rbac;
use crate::verifier::TokenVerifier;

/// GuardStage は認可処理の段階を表す。失敗時のログに使用する。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardStage {
    ExtractingToken,
    VerifyingToken,
    EnforcingPermission,
}

impl GuardStage {
    pub fn as_str(self) -> &'static str {
        match self {
            GuardStage::ExtractingToken => "extracting_token",
            GuardStage::VerifyingToken => "verifying_token",
            GuardStage::EnforcingPermission => "enforcing_permission",
        }
    }
}

impl std::fmt::Display for GuardStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// AuthGuard は必要な権限を 1 つ束縛した認可ゲート。
///
/// トークン抽出 → 検証 → 権限判定を順に行い、最初の失敗で打ち切る。
/// リクエスト間で状態は持たない。
#[derive(Clone)]
pub struct AuthGuard {
    verifier: Arc<TokenVerifier>,
    permission: Arc<str>,
}

impl AuthGuard {
    /// 新しい AuthGuard を生成する。
    pub fn new(verifier: Arc<TokenVerifier>, permission: &str) -> Self {
        Self {
            verifier,
            permission: Arc::from(permission),
        }
    }

    /// このガードが要求する権限を返す。
    pub fn permission(&self) -> &str {
        &self.permission
    }

    /// Authorization ヘッダー値を認可し、成功時は Claims を返す。
    pub async fn authorize(&self, authorization: Option<&str>) -> Result<Claims, AuthError> {
        let token = extract_bearer_token(authorization)
            .map_err(|e| self.reject(GuardStage::ExtractingToken, e))?;

        let claims = self
            .verifier
            .verify_token(token)
            .await
            .map_err(|e| self.reject(GuardStage::VerifyingToken, e))?;

        rbac::check_permission(&claims, &self.permission)
            .map_err(|e| self.reject(GuardStage::EnforcingPermission, e))?;

        debug!(sub = %claims.sub, permission = %self.permission, "authorized");
        Ok(claims)
    }

    /// 認可に成功した場合のみ operation を Claims 付きで 1 回実行する。
    pub async fn run<F, Fut, T>(
        &self,
        authorization: Option<&str>,
        operation: F,
    ) -> Result<T, AuthError>
    where
        F: FnOnce(Claims) -> Fut,
        Fut: Future<Output = T>,
    {
        let claims = self.authorize(authorization).await?;
        Ok(operation(claims).await)
    }

    fn reject(&self, stage: GuardStage, err: AuthError) -> AuthError {
        if err.is_infrastructure_fault() {
            error!(
                stage = %stage,
                permission = %self.permission,
                code = err.code(),
                error = %err,
                "authorization failed"
            );
        } else {
            info!(
                stage = %stage,
                permission = %self.permission,
                code = err.code(),
                error = %err,
                "authorization rejected"
            );
        }
        err
    }
}

/// require_permission は AuthGuard を状態に持つ axum ミドルウェア。
/// 認可成功時は Claims をリクエストエクステンションに格納する。
///
/// ```ignore
/// let guard = AuthGuard::new(verifier, "post:drinks");
/// post(create_drink).route_layer(axum::middleware::from_fn_with_state(guard, require_permission))
/// ```
pub async fn require_permission(
    State(guard): State<AuthGuard>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AuthErrorResponse> {
    let authorization = match req.headers().get(http::header::AUTHORIZATION) {
        Some(value) => Some(
            value
                .to_str()
                .map_err(|_| AuthErrorResponse::from(AuthError::AuthHeaderMalformed))?,
        ),
        None => None,
    };

    let claims = guard.authorize(authorization).await?;

    req.extensions_mut().insert(claims);

    Ok(next.run(req).await)
}

/// AuthErrorResponse は認可エラーの HTTP レスポンス。
#[derive(Debug)]
pub struct AuthErrorResponse {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: &'static str,
}

impl From<AuthError> for AuthErrorResponse {
    fn from(err: AuthError) -> Self {
        Self {
            status: err.status_code(),
            code: err.code(),
            message: err.description(),
        }
    }
}

impl IntoResponse for AuthErrorResponse {
    fn into_response(self) -> Response {
        let body = json!({
            "success": false,
            "error": self.status.as_u16(),
            "message": self.message,
        });

        (self.status, Json(body)).into_response()
    }
}

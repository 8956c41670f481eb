//! 認可エラーの分類と HTTP ステータスへの対応付け。

use http::StatusCode;

/// AuthError は認可コアが返す型付きの失敗を表す。
///
/// 文字列を持つバリアントの値はログ用の詳細であり、呼び出し元には
/// `description()` の固定文言のみを返す。
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("missing Authorization header")]
    AuthHeaderMissing,

    #[error("invalid Authorization header format")]
    AuthHeaderMalformed,

    #[error("malformed token: {0}")]
    TokenMalformed(String),

    #[error("signing key not found: {0}")]
    SigningKeyNotFound(String),

    #[error("invalid signature: {0}")]
    SignatureInvalid(String),

    #[error("token expired")]
    TokenExpired,

    #[error("issuer mismatch")]
    IssuerMismatch,

    #[error("audience mismatch")]
    AudienceMismatch,

    #[error("permissions claim missing")]
    PermissionsClaimMissing,

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("JWKS unavailable: {0}")]
    KeySetUnavailable(String),
}

impl AuthError {
    /// レスポンスに使う HTTP ステータスを返す。
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::PermissionsClaimMissing => StatusCode::BAD_REQUEST,
            AuthError::PermissionDenied(_) => StatusCode::FORBIDDEN,
            AuthError::KeySetUnavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::UNAUTHORIZED,
        }
    }

    /// 機械可読なエラーコードを返す。
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::AuthHeaderMissing => "authorization_header_missing",
            AuthError::AuthHeaderMalformed => "invalid_header",
            AuthError::TokenMalformed(_) => "invalid_token",
            AuthError::SigningKeyNotFound(_) => "signing_key_not_found",
            AuthError::SignatureInvalid(_) => "invalid_signature",
            AuthError::TokenExpired => "token_expired",
            AuthError::IssuerMismatch => "invalid_issuer",
            AuthError::AudienceMismatch => "invalid_audience",
            AuthError::PermissionsClaimMissing => "invalid_claims",
            AuthError::PermissionDenied(_) => "unauthorized",
            AuthError::KeySetUnavailable(_) => "jwks_unavailable",
        }
    }

    /// 呼び出し元に返す説明文を返す。
    pub fn description(&self) -> &'static str {
        match self {
            AuthError::AuthHeaderMissing => "Authorization header is expected.",
            AuthError::AuthHeaderMalformed => {
                "Authorization header must be of the form \"Bearer <token>\"."
            }
            AuthError::TokenMalformed(_) => "Unable to parse authentication token.",
            AuthError::SigningKeyNotFound(_) => "Unable to find the appropriate key.",
            AuthError::SignatureInvalid(_) => "Token signature is invalid.",
            AuthError::TokenExpired => "Token expired.",
            AuthError::IssuerMismatch => "Incorrect claims. Please, check the issuer.",
            AuthError::AudienceMismatch => "Incorrect claims. Please, check the audience.",
            AuthError::PermissionsClaimMissing => "Permissions not included in JWT.",
            AuthError::PermissionDenied(_) => "Permission not found.",
            AuthError::KeySetUnavailable(_) => "Unable to reach the identity provider.",
        }
    }

    /// 呼び出し元ではなく基盤側の障害かどうかを返す。
    pub fn is_infrastructure_fault(&self) -> bool {
        matches!(self, AuthError::KeySetUnavailable(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AuthError::AuthHeaderMissing.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AuthError::AuthHeaderMalformed.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AuthError::TokenMalformed("x".into()).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AuthError::SigningKeyNotFound("kid".into()).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AuthError::SignatureInvalid("x".into()).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(AuthError::TokenExpired.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(AuthError::IssuerMismatch.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            AuthError::AudienceMismatch.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AuthError::PermissionsClaimMissing.status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AuthError::PermissionDenied("post:drinks".into()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AuthError::KeySetUnavailable("503".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_only_key_set_unavailable_is_infrastructure_fault() {
        assert!(AuthError::KeySetUnavailable("timeout".into()).is_infrastructure_fault());
        assert!(!AuthError::SignatureInvalid("bad".into()).is_infrastructure_fault());
        assert!(!AuthError::TokenExpired.is_infrastructure_fault());
    }

    #[test]
    fn test_description_does_not_leak_detail() {
        let err = AuthError::SigningKeyNotFound("secret-kid".into());
        assert!(!err.description().contains("secret-kid"));
        assert!(err.to_string().contains("secret-kid"));
    }
}

//! トークン検証器: JWKS の公開鍵で署名を検証し、Claims を検査する。

use std::sync::Arc;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Header, Validation};

use crate::claims::Claims;
use crate::error::AuthError;
use crate::jwks::JwksCache;

/// VerifierConfig は信頼する発行者・オーディエンス・署名アルゴリズムの設定。
#[derive(Debug, Clone)]
pub struct VerifierConfig {
    pub issuer: String,
    pub audience: String,
    /// 受け入れる唯一の署名アルゴリズム
    pub algorithm: Algorithm,
    /// exp 判定に加える猶予秒数
    pub leeway_secs: u64,
}

impl VerifierConfig {
    /// RS256・猶予なしの設定を生成する。
    pub fn new(issuer: &str, audience: &str) -> Self {
        Self {
            issuer: issuer.to_string(),
            audience: audience.to_string(),
            algorithm: Algorithm::RS256,
            leeway_secs: 0,
        }
    }

    #[must_use]
    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    #[must_use]
    pub fn with_leeway_secs(mut self, leeway_secs: u64) -> Self {
        self.leeway_secs = leeway_secs;
        self
    }
}

/// TokenVerifier は Bearer トークンを検証し、Claims を返す。
pub struct TokenVerifier {
    config: VerifierConfig,
    keys: Arc<JwksCache>,
}

impl TokenVerifier {
    /// 新しい TokenVerifier を生成する。
    pub fn new(config: VerifierConfig, keys: Arc<JwksCache>) -> Self {
        Self { config, keys }
    }

    pub fn config(&self) -> &VerifierConfig {
        &self.config
    }

    /// 鍵キャッシュを返す。鍵ローテーション時の無効化に使用。
    pub fn keys(&self) -> &JwksCache {
        &self.keys
    }

    /// JWT トークン文字列を検証し、Claims を返す。
    ///
    /// 構造 → kid による鍵検索 → 署名 → exp → iss → aud の順に検査し、
    /// 最初に失敗した検査のエラーを返す。
    pub async fn verify_token(&self, token: &str) -> Result<Claims, AuthError> {
        let header = inspect_structure(token)?;

        let kid = header
            .kid
            .as_deref()
            .ok_or_else(|| AuthError::TokenMalformed("missing kid in header".into()))?;

        let keys = self.keys.keys().await?;
        let key = keys
            .get(kid)
            .ok_or_else(|| AuthError::SigningKeyNotFound(kid.to_string()))?;

        // アルゴリズムの固定は署名検証の一部として鍵検索の後に検査する
        if header.alg != self.config.algorithm {
            return Err(AuthError::SignatureInvalid(format!(
                "unexpected algorithm {:?}",
                header.alg
            )));
        }

        if let Some(alg) = key.algorithm() {
            if alg != self.config.algorithm {
                return Err(AuthError::SignatureInvalid(format!(
                    "key {} is bound to algorithm {:?}",
                    kid, alg
                )));
            }
        }

        let decoding_key = DecodingKey::from_jwk(key.jwk())
            .map_err(|e| AuthError::SignatureInvalid(format!("unusable key {}: {}", kid, e)))?;

        // 時刻・発行者・オーディエンスはここでは検査せず、下の validate_claims で順に検査する
        let mut validation = Validation::new(self.config.algorithm);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        let data = decode::<Claims>(token, &decoding_key, &validation).map_err(map_decode_error)?;

        self.validate_claims(&data.claims, jsonwebtoken::get_current_timestamp())?;

        Ok(data.claims)
    }

    fn validate_claims(&self, claims: &Claims, now: u64) -> Result<(), AuthError> {
        if claims.exp.saturating_add(self.config.leeway_secs) <= now {
            return Err(AuthError::TokenExpired);
        }

        if claims.iss != self.config.issuer {
            return Err(AuthError::IssuerMismatch);
        }

        if !claims.contains_audience(&self.config.audience) {
            return Err(AuthError::AudienceMismatch);
        }

        Ok(())
    }
}

/// 署名を信用する前にトークンの構造を検査し、ヘッダーを返す。
fn inspect_structure(token: &str) -> Result<Header, AuthError> {
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 {
        return Err(AuthError::TokenMalformed(format!(
            "expected 3 segments, got {}",
            segments.len()
        )));
    }

    let payload = URL_SAFE_NO_PAD
        .decode(segments[1])
        .map_err(|e| AuthError::TokenMalformed(format!("payload is not base64url: {}", e)))?;
    let payload: serde_json::Value = serde_json::from_slice(&payload)
        .map_err(|e| AuthError::TokenMalformed(format!("payload is not JSON: {}", e)))?;
    if !payload.is_object() {
        return Err(AuthError::TokenMalformed("payload is not a JSON object".into()));
    }

    decode_header(token).map_err(|e| AuthError::TokenMalformed(e.to_string()))
}

fn map_decode_error(err: jsonwebtoken::errors::Error) -> AuthError {
    match err.kind() {
        ErrorKind::InvalidToken | ErrorKind::Base64(_) | ErrorKind::Json(_) | ErrorKind::Utf8(_) => {
            AuthError::TokenMalformed(err.to_string())
        }
        _ => AuthError::SignatureInvalid(err.to_string()),
    }
}

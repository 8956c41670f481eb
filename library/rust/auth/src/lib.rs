//! coffee-auth: Bearer トークン認可コア
//!
//! Authorization ヘッダーから Bearer トークンを取り出し、JWKS エンドポイントから
//! 取得した公開鍵で署名を検証し、Claims の permissions に必要な権限が含まれるかを判定する。
//!
//! # 使い方
//!
//! ```ignore
//! use coffee_auth::{AuthGuard, HttpJwksFetcher, JwksCache, TokenVerifier, VerifierConfig};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let fetcher = HttpJwksFetcher::new(Duration::from_secs(5))?;
//! let keys = JwksCache::new(
//!     "https://coffee.example.com/.well-known/jwks.json",
//!     Duration::from_secs(3600),
//!     Arc::new(fetcher),
//! );
//! let verifier = Arc::new(TokenVerifier::new(
//!     VerifierConfig::new("https://coffee.example.com/", "drinks"),
//!     Arc::new(keys),
//! ));
//!
//! let guard = AuthGuard::new(verifier, "post:drinks");
//! let claims = guard.authorize(Some("Bearer eyJ...")).await?;
//! ```

pub mod claims;
pub mod error;
pub mod extractor;
pub mod jwks;
pub mod middleware;
pub mod rbac;
pub mod verifier;

pub use claims::{Audience, Claims};
pub use error::AuthError;
pub use extractor::extract_bearer_token;
pub use jsonwebtoken::Algorithm;
pub use jwks::{HttpJwksFetcher, JwksCache, JwksFetcher, KeySet, SigningKey};
pub use middleware::{require_permission, AuthErrorResponse, AuthGuard, GuardStage};
pub use rbac::{check_permission, has_permission};
pub use verifier::{TokenVerifier, VerifierConfig};

use std::sync::LazyLock;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use rand::rngs::OsRng;
use rsa::pkcs1::EncodeRsaPrivateKey;
use rsa::traits::PublicKeyParts;
use rsa::RsaPrivateKey;
use serde::{Deserialize, Serialize};

pub const TEST_ISSUER: &str = "https://coffee.test.example.com/";
pub const TEST_AUDIENCE: &str = "drinks";
pub const TEST_KID: &str = "test-key-1";

/// テスト用 JWT クレーム。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestClaims {
    pub sub: String,
    pub iss: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permissions: Option<Vec<String>>,
}

impl Default for TestClaims {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            sub: "auth0|test-user".to_string(),
            iss: TEST_ISSUER.to_string(),
            aud: TEST_AUDIENCE.to_string(),
            iat: now.timestamp(),
            exp: (now + Duration::hours(1)).timestamp(),
            permissions: Some(Vec::new()),
        }
    }
}

impl TestClaims {
    /// 指定権限を持つ有効なクレームを生成する。
    pub fn with_permissions(permissions: &[&str]) -> Self {
        Self {
            permissions: Some(permissions.iter().map(|p| (*p).to_string()).collect()),
            ..Default::default()
        }
    }

    /// 有効期限切れのクレームを生成する。
    pub fn expired() -> Self {
        let now = Utc::now();
        Self {
            iat: (now - Duration::hours(2)).timestamp(),
            exp: (now - Duration::hours(1)).timestamp(),
            ..Default::default()
        }
    }
}

static SHARED: LazyLock<RsaJwtTestHelper> = LazyLock::new(|| RsaJwtTestHelper::generate(TEST_KID));
static IMPOSTOR: LazyLock<RsaJwtTestHelper> =
    LazyLock::new(|| RsaJwtTestHelper::generate(TEST_KID));

/// テスト用 RS256 JWT 生成ヘルパー。
///
/// 2048 bit の RSA 鍵ペアを生成し、その公開鍵を JWK として公開する。
/// 鍵生成は遅いため、通常は `shared()` を使う。
pub struct RsaJwtTestHelper {
    kid: String,
    encoding_key: EncodingKey,
    n: String,
    e: String,
}

impl RsaJwtTestHelper {
    /// 新しい鍵ペアを生成する。
    pub fn generate(kid: &str) -> Self {
        let private_key = RsaPrivateKey::new(&mut OsRng, 2048).expect("RSA key generation");
        let public_key = private_key.to_public_key();

        let n = URL_SAFE_NO_PAD.encode(public_key.n().to_bytes_be());
        let e = URL_SAFE_NO_PAD.encode(public_key.e().to_bytes_be());

        let pem = private_key
            .to_pkcs1_pem(rsa::pkcs1::LineEnding::LF)
            .expect("PKCS#1 PEM encoding");
        let encoding_key = EncodingKey::from_rsa_pem(pem.as_bytes()).expect("RSA encoding key");

        Self {
            kid: kid.to_string(),
            encoding_key,
            n,
            e,
        }
    }

    /// プロセス内で共有する鍵ペア（kid = `TEST_KID`）。
    pub fn shared() -> &'static Self {
        &SHARED
    }

    /// `shared()` と同じ kid を名乗る別の鍵ペア。署名不一致のテストに使う。
    pub fn impostor() -> &'static Self {
        &IMPOSTOR
    }

    pub fn kid(&self) -> &str {
        &self.kid
    }

    /// 公開鍵を JWK として返す。
    pub fn jwk(&self) -> serde_json::Value {
        serde_json::json!({
            "kid": self.kid,
            "kty": "RSA",
            "alg": "RS256",
            "use": "sig",
            "n": self.n,
            "e": self.e,
        })
    }

    /// この鍵 1 件だけを含む JWKS ドキュメントを返す。
    pub fn jwks(&self) -> serde_json::Value {
        serde_json::json!({ "keys": [self.jwk()] })
    }

    /// クレームに署名したトークンを生成する。
    pub fn create_token(&self, claims: &TestClaims) -> String {
        self.sign(claims)
    }

    /// 指定権限を持つ有効なトークンを生成する。
    pub fn create_permission_token(&self, permissions: &[&str]) -> String {
        self.sign(&TestClaims::with_permissions(permissions))
    }

    /// 任意のシリアライズ可能なクレームに RS256 + kid ヘッダーで署名する。
    pub fn sign<T: Serialize>(&self, claims: &T) -> String {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(self.kid.clone());
        self.sign_with_header(&header, claims)
    }

    /// ヘッダーを指定して署名する。
    pub fn sign_with_header<T: Serialize>(&self, header: &Header, claims: &T) -> String {
        encode(header, claims, &self.encoding_key).expect("JWT encoding")
    }
}

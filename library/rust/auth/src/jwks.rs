//! JWKS キャッシュ: 発行者の公開鍵セットを取得して保持する。

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use jsonwebtoken::jwk::Jwk;
use jsonwebtoken::Algorithm;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::error::AuthError;

/// SigningKey は kid に対応する 1 件の公開鍵。
#[derive(Debug, Clone)]
pub struct SigningKey {
    jwk: Jwk,
    algorithm: Option<Algorithm>,
}

impl SigningKey {
    /// JWK 本体を返す。
    pub fn jwk(&self) -> &Jwk {
        &self.jwk
    }

    /// JWK 自身が宣言するアルゴリズムを返す。`alg` が無い鍵は `None`。
    pub fn algorithm(&self) -> Option<Algorithm> {
        self.algorithm
    }
}

/// KeySet は kid から公開鍵への対応表。
#[derive(Debug, Clone, Default)]
pub struct KeySet {
    keys: HashMap<String, SigningKey>,
}

impl KeySet {
    /// JWKS ドキュメント（`{"keys": [...]}`）を解析する。
    ///
    /// `kid` が無い鍵、暗号化用の鍵、JWK として解釈できない鍵は読み飛ばす。
    /// ドキュメント自体が `keys` 配列を持たない場合はエラーとする。
    pub fn from_document(document: &serde_json::Value) -> Result<Self, AuthError> {
        let entries = document
            .get("keys")
            .and_then(serde_json::Value::as_array)
            .ok_or_else(|| AuthError::KeySetUnavailable("JWKS document has no keys array".into()))?;

        let mut keys = HashMap::new();
        for entry in entries {
            let Some(kid) = entry.get("kid").and_then(serde_json::Value::as_str) else {
                debug!("skipping JWK without kid");
                continue;
            };

            if entry.get("use").and_then(serde_json::Value::as_str) == Some("enc") {
                debug!(kid, "skipping encryption key");
                continue;
            }

            let algorithm = match entry.get("alg").and_then(serde_json::Value::as_str) {
                Some(alg) => match Algorithm::from_str(alg) {
                    Ok(alg) => Some(alg),
                    Err(_) => {
                        debug!(kid, alg, "skipping JWK with unsupported alg");
                        continue;
                    }
                },
                None => None,
            };

            match serde_json::from_value::<Jwk>(entry.clone()) {
                Ok(jwk) => {
                    keys.insert(kid.to_string(), SigningKey { jwk, algorithm });
                }
                Err(e) => debug!(kid, error = %e, "skipping unparseable JWK"),
            }
        }

        Ok(Self { keys })
    }

    /// kid で鍵を検索する。見つからない場合は `None`。
    pub fn get(&self, kid: &str) -> Option<&SigningKey> {
        self.keys.get(kid)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// 保持している kid の一覧を返す。
    pub fn kids(&self) -> impl Iterator<Item = &str> {
        self.keys.keys().map(String::as_str)
    }
}

/// JwksFetcher は JWKS エンドポイントからの鍵取得を抽象化するトレイト。
#[async_trait::async_trait]
pub trait JwksFetcher: Send + Sync {
    async fn fetch_keys(&self, jwks_url: &str) -> Result<KeySet, AuthError>;
}

/// HttpJwksFetcher は HTTP(S) 経由で JWKS を取得するデフォルト実装。
pub struct HttpJwksFetcher {
    client: reqwest::Client,
}

impl HttpJwksFetcher {
    /// 取得タイムアウトを指定して生成する。タイムアウトは `KeySetUnavailable` になる。
    pub fn new(timeout: Duration) -> Result<Self, AuthError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AuthError::KeySetUnavailable(e.to_string()))?;
        Ok(Self { client })
    }

    /// 既存の reqwest クライアントを使って生成する。
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl JwksFetcher for HttpJwksFetcher {
    async fn fetch_keys(&self, jwks_url: &str) -> Result<KeySet, AuthError> {
        let document: serde_json::Value = self
            .client
            .get(jwks_url)
            .send()
            .await
            .map_err(|e| AuthError::KeySetUnavailable(e.to_string()))?
            .error_for_status()
            .map_err(|e| AuthError::KeySetUnavailable(e.to_string()))?
            .json()
            .await
            .map_err(|e| AuthError::KeySetUnavailable(e.to_string()))?;

        KeySet::from_document(&document)
    }
}

/// 取得済みの鍵セットと取得時刻。
#[derive(Clone)]
struct Snapshot {
    keys: Arc<KeySet>,
    fetched_at: Instant,
}

/// 直近の取得失敗。再取得ロックの待機者はこれを共有する。
struct FailedFetch {
    error: AuthError,
    failed_at: Instant,
}

/// JwksCache は取得した鍵セットを TTL 付きで保持する。
///
/// 鍵セットは `Arc<KeySet>` のスナップショットとして差し替える。読み取り側は
/// スナップショットを複製するだけで、ネットワーク取得中に待たされるのは
/// 一度も取得できていない場合に限られる。再取得は同時に 1 件だけ実行し、
/// 実行中の取得を待っていた呼び出しはその失敗をそのまま受け取る。
pub struct JwksCache {
    jwks_url: String,
    ttl: Duration,
    serve_stale_on_error: bool,
    fetcher: Arc<dyn JwksFetcher>,
    snapshot: RwLock<Option<Snapshot>>,
    refresh: Mutex<Option<FailedFetch>>,
}

impl JwksCache {
    /// 新しい JwksCache を生成する。鍵は初回利用時に取得する。
    pub fn new(jwks_url: &str, ttl: Duration, fetcher: Arc<dyn JwksFetcher>) -> Self {
        Self {
            jwks_url: jwks_url.to_string(),
            ttl,
            serve_stale_on_error: false,
            fetcher,
            snapshot: RwLock::new(None),
            refresh: Mutex::new(None),
        }
    }

    /// 再取得に失敗したとき、期限切れのスナップショットを使い続けるかを設定する。
    #[must_use]
    pub fn serve_stale_on_error(mut self, enabled: bool) -> Self {
        self.serve_stale_on_error = enabled;
        self
    }

    pub fn jwks_url(&self) -> &str {
        &self.jwks_url
    }

    /// 現在の鍵セットを返す。TTL を超えている場合は再取得する。
    pub async fn keys(&self) -> Result<Arc<KeySet>, AuthError> {
        let current = self.snapshot.read().await.clone();
        if let Some(ref s) = current {
            if self.is_fresh(s) {
                return Ok(s.keys.clone());
            }
        }

        // 他のタスクが再取得中なら、旧スナップショットがある限りそれを返す
        let waiting_since = Instant::now();
        let mut refresh = match self.refresh.try_lock() {
            Ok(guard) => guard,
            Err(_) => match current {
                Some(ref stale) => {
                    debug!(jwks_url = %self.jwks_url, "JWKS refresh in progress, using previous snapshot");
                    return Ok(stale.keys.clone());
                }
                None => self.refresh.lock().await,
            },
        };

        // ダブルチェック
        if let Some(ref s) = *self.snapshot.read().await {
            if self.is_fresh(s) {
                return Ok(s.keys.clone());
            }
        }

        // 待っている間に終わった取得が失敗していれば、再取得せずその結果を返す
        if let Some(ref failed) = *refresh {
            if failed.failed_at >= waiting_since {
                return Err(failed.error.clone());
            }
        }

        match self.fetcher.fetch_keys(&self.jwks_url).await {
            Ok(keys) => {
                *refresh = None;
                let keys = Arc::new(keys);
                info!(jwks_url = %self.jwks_url, key_count = keys.len(), "JWKS fetched");
                *self.snapshot.write().await = Some(Snapshot {
                    keys: keys.clone(),
                    fetched_at: Instant::now(),
                });
                Ok(keys)
            }
            Err(e) => match current {
                Some(stale) if self.serve_stale_on_error => {
                    warn!(
                        jwks_url = %self.jwks_url,
                        error = %e,
                        "JWKS refresh failed, serving stale key set"
                    );
                    Ok(stale.keys)
                }
                _ => {
                    warn!(jwks_url = %self.jwks_url, error = %e, "JWKS fetch failed");
                    *refresh = Some(FailedFetch {
                        error: e.clone(),
                        failed_at: Instant::now(),
                    });
                    Err(e)
                }
            },
        }
    }

    /// kid で鍵を検索する。
    ///
    /// 鍵セットの取得に失敗した場合のみエラーを返し、kid が無い場合は `Ok(None)`。
    pub async fn lookup(&self, kid: &str) -> Result<Option<SigningKey>, AuthError> {
        let keys = self.keys().await?;
        Ok(keys.get(kid).cloned())
    }

    /// キャッシュを無効化する。鍵ローテーション時に使用。
    pub async fn invalidate(&self) {
        *self.snapshot.write().await = None;
    }

    fn is_fresh(&self, snapshot: &Snapshot) -> bool {
        snapshot.fetched_at.elapsed() < self.ttl
    }
}

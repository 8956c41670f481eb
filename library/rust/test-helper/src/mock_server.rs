use std::time::Duration;

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// JWKS エンドポイントのモックサーバー。
///
/// wiremock の HTTP サーバーを起動し、`JWKS_PATH` への GET に固定レスポンスを返す。
pub struct JwksMockServer {
    server: MockServer,
}

impl JwksMockServer {
    pub const JWKS_PATH: &'static str = "/.well-known/jwks.json";

    /// JWKS ドキュメントを 200 で返すサーバーを起動する。
    pub async fn serving(jwks: serde_json::Value) -> Self {
        Self::start(ResponseTemplate::new(200).set_body_json(jwks)).await
    }

    /// 指定ステータスのエラーを返すサーバーを起動する。
    pub async fn failing(status: u16) -> Self {
        Self::start(ResponseTemplate::new(status).set_body_string("unavailable")).await
    }

    /// 指定時間だけ遅延して JWKS を返すサーバーを起動する。
    pub async fn slow(jwks: serde_json::Value, delay: Duration) -> Self {
        Self::start(
            ResponseTemplate::new(200)
                .set_body_json(jwks)
                .set_delay(delay),
        )
        .await
    }

    /// 任意のレスポンスを返すサーバーを起動する。
    pub async fn start(response: ResponseTemplate) -> Self {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(Self::JWKS_PATH))
            .respond_with(response)
            .mount(&server)
            .await;
        Self { server }
    }

    /// JWKS エンドポイントの URL を返す。
    pub fn jwks_url(&self) -> String {
        format!("{}{}", self.server.uri(), Self::JWKS_PATH)
    }

    /// 受信したリクエスト数を返す。
    pub async fn request_count(&self) -> usize {
        self.server
            .received_requests()
            .await
            .map_or(0, |requests| requests.len())
    }
}

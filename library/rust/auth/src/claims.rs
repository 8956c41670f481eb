//! 検証済み JWT の Claims 構造体。

use serde::Deserialize;

/// Claims は署名・有効期限・発行者・オーディエンスの検証を通過したトークンの Claims を表す。
///
/// `permissions` は Claim 自体が無い場合 `None`、空配列の場合 `Some(vec![])` となり、
/// 両者は区別される。
#[derive(Debug, Clone, Deserialize)]
pub struct Claims {
    /// ユーザーの一意識別子
    pub sub: String,

    /// トークン発行者
    pub iss: String,

    /// トークンの対象オーディエンス
    #[serde(default)]
    pub aud: Audience,

    /// トークンの有効期限（Unix タイムスタンプ）
    pub exp: u64,

    /// トークンの発行時刻（Unix タイムスタンプ）
    #[serde(default)]
    pub iat: Option<u64>,

    /// 付与された権限
    #[serde(default)]
    pub permissions: Option<Vec<String>>,
}

/// Audience は JWT の aud Claim を表す。
/// 文字列または文字列配列のどちらも受け付ける。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Audience(pub Vec<String>);

impl Audience {
    /// 指定オーディエンスが含まれるかを判定する。
    pub fn contains(&self, audience: &str) -> bool {
        self.0.iter().any(|a| a == audience)
    }
}

impl<'de> Deserialize<'de> for Audience {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de;

        struct AudienceVisitor;

        impl<'de> de::Visitor<'de> for AudienceVisitor {
            type Value = Audience;

            fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                formatter.write_str("a string or array of strings")
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(Audience(vec![v.to_string()]))
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
            where
                A: de::SeqAccess<'de>,
            {
                let mut values = Vec::new();
                while let Some(v) = seq.next_element::<String>()? {
                    values.push(v);
                }
                Ok(Audience(values))
            }
        }

        deserializer.deserialize_any(AudienceVisitor)
    }
}

impl Claims {
    /// 付与された権限の一覧を返す。Claim が無い場合は空。
    pub fn permissions(&self) -> &[String] {
        self.permissions.as_deref().unwrap_or(&[])
    }

    /// permissions Claim が存在するかを返す。
    pub fn has_permissions_claim(&self) -> bool {
        self.permissions.is_some()
    }

    /// 指定オーディエンスが aud に含まれるかを判定する。
    pub fn contains_audience(&self, audience: &str) -> bool {
        self.aud.contains(audience)
    }
}

impl std::fmt::Display for Claims {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Claims{{sub={}, iss={}, aud={:?}, permissions={:?}}}",
            self.sub, self.iss, self.aud.0, self.permissions,
        )
    }
}

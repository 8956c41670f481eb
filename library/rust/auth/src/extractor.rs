//! Authorization ヘッダーからの Bearer トークン抽出。

use crate::error::AuthError;

/// Bearer トークンを Authorization ヘッダー値から取り出す。
///
/// ヘッダー値はスペース区切りでちょうど 2 要素であり、1 要素目が大文字小文字を問わず
/// `bearer` である必要がある。2 要素目は正規化せずにそのまま返す。
pub fn extract_bearer_token(header: Option<&str>) -> Result<&str, AuthError> {
    let header = header.ok_or(AuthError::AuthHeaderMissing)?;

    let parts: Vec<&str> = header.split(' ').collect();
    if parts.len() != 2 || !parts[0].eq_ignore_ascii_case("bearer") {
        return Err(AuthError::AuthHeaderMalformed);
    }

    // "Bearer " のようにトークン部が空の場合も形式不正とする
    if parts[1].is_empty() {
        return Err(AuthError::AuthHeaderMalformed);
    }

    Ok(parts[1])
}

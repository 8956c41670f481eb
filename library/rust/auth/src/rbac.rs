//! 権限判定: Claims の permissions に必要な権限が含まれるかを検査する。

use crate::claims::Claims;
use crate::error::AuthError;

/// Claims に指定の権限があるかを判定する。
pub fn has_permission(claims: &Claims, permission: &str) -> bool {
    claims.permissions().iter().any(|p| p == permission)
}

/// Claims に指定の権限があることを確認する。
///
/// permissions Claim 自体が無い場合は `PermissionsClaimMissing`、
/// Claim はあるが権限が含まれない場合は `PermissionDenied` を返す。
pub fn check_permission(claims: &Claims, permission: &str) -> Result<(), AuthError> {
    if !claims.has_permissions_claim() {
        return Err(AuthError::PermissionsClaimMissing);
    }

    if !has_permission(claims, permission) {
        return Err(AuthError::PermissionDenied(permission.to_string()));
    }

    Ok(())
}

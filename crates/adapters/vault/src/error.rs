//! Error mapping for the Vault adapter

use errors::VaultError;
use vaultrs::error::ClientError;

/// Convert a vaultrs error into the vault error taxonomy
pub fn map_vault_error(err: ClientError, context: &str) -> VaultError {
    match &err {
        ClientError::APIError { code, .. } => map_status(*code, &format!("{}: {}", context, err)),
        _ => map_message(&err.to_string(), context),
    }
}

/// Map a Vault HTTP status code
pub fn map_status(code: u16, message: &str) -> VaultError {
    match code {
        400 => VaultError::rejected(message),
        401 | 403 => VaultError::denied(message),
        404 => VaultError::not_found(message),
        _ => VaultError::unavailable(message),
    }
}

/// Classify an error that carries no status code
pub fn map_message(err_str: &str, context: &str) -> VaultError {
    let message = format!("{}: {}", context, err_str);
    let lower = err_str.to_lowercase();

    if lower.contains("permission denied") || lower.contains("missing client token") {
        VaultError::denied(message)
    } else if lower.contains("invalid path") || (lower.contains("url") && lower.contains("parse")) {
        VaultError::rejected(message)
    } else {
        // 其余错误（连接、超时、密封状态等）都视为后端不可用
        VaultError::unavailable(message)
    }
}

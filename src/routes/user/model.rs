use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::models::RegisterRequest;

pub const MIN_PASSWORD_LEN: usize = 6;
pub const MAX_PASSWORD_LEN: usize = 72;
pub const MAX_DISPLAY_NAME_LEN: usize = 32;

#[derive(Debug, Serialize, Deserialize)]
pub struct RefreshTokenResponse {
    pub token: String,
    pub expires_at: i64,
}

impl RegisterRequest {
    /// 规范化后的注册信息（邮箱小写，昵称去空白）
    pub fn validated(self) -> Result<RegisterRequest, AppError> {
        let email = self.email.trim().to_lowercase();
        let looks_like_email = email
            .split_once('@')
            .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
        if !looks_like_email {
            return Err(AppError::Validation("Invalid email address".to_string()));
        }

        // bcrypt 只使用前 72 字节
        if self.password.len() < MIN_PASSWORD_LEN || self.password.len() > MAX_PASSWORD_LEN {
            return Err(AppError::Validation(format!(
                "Password must be between {MIN_PASSWORD_LEN} and {MAX_PASSWORD_LEN} characters"
            )));
        }

        let display_name = self.display_name.trim().to_string();
        let name_len = display_name.chars().count();
        if name_len < 2 || name_len > MAX_DISPLAY_NAME_LEN {
            return Err(AppError::Validation(format!(
                "Display name must be between 2 and {MAX_DISPLAY_NAME_LEN} characters"
            )));
        }

        Ok(RegisterRequest {
            email,
            password: self.password,
            display_name,
            photo_url: self.photo_url.filter(|url| !url.trim().is_empty()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(email: &str, password: &str, name: &str) -> RegisterRequest {
        RegisterRequest {
            email: email.into(),
            password: password.into(),
            display_name: name.into(),
            photo_url: Some(" ".into()),
        }
    }

    #[test]
    fn registration_is_normalised() {
        let req = request(" Ana@Capao.App ", "secret1", "  Ana ").validated().unwrap();
        assert_eq!(req.email, "ana@capao.app");
        assert_eq!(req.display_name, "Ana");
        assert_eq!(req.photo_url, None);
    }

    #[test]
    fn bad_registrations_are_rejected() {
        assert!(request("ana", "secret1", "Ana").validated().is_err());
        assert!(request("@capao.app", "secret1", "Ana").validated().is_err());
        assert!(request("ana@capao.app", "short", "Ana").validated().is_err());
        assert!(request("ana@capao.app", "secret1", "A").validated().is_err());
    }
}

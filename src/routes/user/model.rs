use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub user_id: String,
    pub nickname: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateRegisteredUserRequest {
    pub user_id: String,
    pub nickname: String,
}

#[derive(Debug, Serialize)]
pub struct CreateUserResponse {
    pub user_id: String,
    pub nickname: String,
}

impl CreateRegisteredUserRequest {
    pub fn validate(&self) -> Result<(), String> {
        // 用户ID只允许字母、数字和下划线
        if self.user_id.is_empty()
            || !self.user_id.chars().all(|c| c.is_alphanumeric() || c == '_')
        {
            return Err("用户ID格式无效，只允许使用字母、数字和下划线".to_string());
        }
        let len = self.nickname.chars().count();
        if !(2..=24).contains(&len) {
            return Err("昵称长度必须在2到24个字符之间".to_string());
        }
        Ok(())
    }
}

/// 注册用户的进程内存储。用户数据的持久化不在本服务范围内，这里只承载注册接口。
#[derive(Default)]
pub struct UserRegistry {
    users: RwLock<HashMap<String, User>>,
}

impl UserRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 用户已存在时返回 None
    pub async fn create(&self, req: CreateRegisteredUserRequest) -> Option<User> {
        let mut users = self.users.write().await;
        if users.contains_key(&req.user_id) {
            return None;
        }
        let user = User {
            user_id: req.user_id,
            nickname: req.nickname,
        };
        users.insert(user.user_id.clone(), user.clone());
        Some(user)
    }

    pub async fn count(&self) -> usize {
        self.users.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(user_id: &str, nickname: &str) -> CreateRegisteredUserRequest {
        CreateRegisteredUserRequest {
            user_id: user_id.into(),
            nickname: nickname.into(),
        }
    }

    #[test]
    fn test_validate() {
        assert!(request("alice_01", "Alice").validate().is_ok());
        assert!(request("", "Alice").validate().is_err());
        assert!(request("alice-01", "Alice").validate().is_err());
        assert!(request("alice", "A").validate().is_err());
        assert!(request("alice", &"x".repeat(25)).validate().is_err());
    }

    #[tokio::test]
    async fn test_duplicate_registration() {
        let registry = UserRegistry::new();

        assert!(registry.create(request("alice", "Alice")).await.is_some());
        assert!(registry.create(request("alice", "Other")).await.is_none());
        assert_eq!(registry.count().await, 1);
    }
}

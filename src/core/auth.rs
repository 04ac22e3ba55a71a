use crate::config::AuthConfig;
use crate::core::store::Store;
use crate::domain::model::{ApiToken, User, UserProfile};
use crate::utils::error::{AppError, Result};
use crate::utils::validation::{validate_email, validate_length};
use chrono::{Duration, Utc};
use rand::distributions::Alphanumeric;
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    SuperAdmin,
    Admin,
    Editor,
    Author,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::SuperAdmin, Role::Admin, Role::Editor, Role::Author];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::SuperAdmin => "super_admin",
            Role::Admin => "admin",
            Role::Editor => "editor",
            Role::Author => "author",
        }
    }

    /// 此角色涵蓋的其他角色
    pub fn subsumes(&self) -> &'static [Role] {
        match self {
            Role::SuperAdmin => &[Role::Admin, Role::Editor, Role::Author],
            Role::Admin => &[Role::Editor, Role::Author],
            Role::Editor => &[Role::Author],
            Role::Author => &[],
        }
    }

    pub fn satisfies(&self, required: Role) -> bool {
        *self == required || self.subsumes().contains(&required)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| AppError::validation("role", format!("unknown role `{}`", s)))
    }
}

const PASSWORD_ITERATIONS: u32 = 10_000;
const DUMMY_SALT: &str = "00000000000000000000000000000000";
const TOKEN_SECRET_LEN: usize = 40;

fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// 加鹽並重複雜湊的密碼摘要
pub fn hash_password(password: &str, salt: &str) -> String {
    let mut digest = Sha256::new()
        .chain_update(salt.as_bytes())
        .chain_update(password.as_bytes())
        .finalize();
    for _ in 1..PASSWORD_ITERATIONS {
        digest = Sha256::new()
            .chain_update(digest)
            .chain_update(salt.as_bytes())
            .finalize();
    }
    hex::encode(digest)
}

pub fn generate_salt() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// 固定時間比較，避免時序側通道
fn constant_time_eq(a: &str, b: &str) -> bool {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

pub fn verify_password(user: &User, password: &str) -> bool {
    constant_time_eq(&hash_password(password, &user.password_salt), &user.password_hash)
}

#[derive(Debug, Clone, Serialize)]
pub struct IssuedToken {
    /// `<token_id>|<secret>`，只在登入時回傳一次
    pub token: String,
    pub expires_at: Option<chrono::DateTime<Utc>>,
    pub user: UserProfile,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserUpdate {
    pub name: Option<String>,
    pub role: Option<Role>,
    pub is_active: Option<bool>,
    pub password: Option<String>,
}

/// 已驗證的請求者
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user: UserProfile,
    pub token_id: u64,
}

impl AuthContext {
    pub fn require(&self, role: Role) -> Result<()> {
        if self.user.role.satisfies(role) {
            Ok(())
        } else {
            tracing::warn!(
                "🚫 User {} ({}) denied: requires {}",
                self.user.email,
                self.user.role,
                role
            );
            Err(AppError::Forbidden { required: role })
        }
    }
}

pub struct AuthService {
    store: Arc<Store>,
    token_ttl: Option<Duration>,
}

impl AuthService {
    pub fn new(store: Arc<Store>, config: &AuthConfig) -> Self {
        let token_ttl = match config.token_ttl_hours {
            0 => None,
            hours => i64::try_from(hours).ok().and_then(Duration::try_hours),
        };
        Self { store, token_ttl }
    }

    /// 沒有任何使用者時建立初始 super admin
    pub async fn bootstrap(&self, config: &AuthConfig) -> Result<Option<UserProfile>> {
        let Some(bootstrap) = &config.bootstrap else {
            return Ok(None);
        };
        if self.store.read(|data| !data.users.is_empty()).await {
            return Ok(None);
        }

        let user = self
            .create_user(NewUser {
                name: bootstrap.name.clone(),
                email: bootstrap.email.clone(),
                password: bootstrap.password.clone(),
                role: Role::SuperAdmin,
            })
            .await?;
        tracing::info!("👤 Bootstrapped super admin {}", user.email);
        Ok(Some(user))
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<IssuedToken> {
        let email = email.trim().to_lowercase();
        let secret: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(TOKEN_SECRET_LEN)
            .map(char::from)
            .collect();
        let token_hash = sha256_hex(secret.as_bytes());
        let now = Utc::now();
        let expires_at = self.token_ttl.map(|ttl| now + ttl);

        // 帳號不存在或密碼錯誤回傳相同錯誤
        let candidate = self
            .store
            .read(|data| data.users.find(|u| u.email == email).cloned())
            .await;
        let verified = match candidate {
            Some(user) => verify_password(&user, password).then_some(user),
            None => {
                // 不存在的帳號同樣計算一次雜湊
                std::hint::black_box(hash_password(password, DUMMY_SALT));
                None
            }
        };

        let (token_id, user) = self
            .store
            .write(|data| {
                // 驗證期間帳號可能被停用或改密碼
                let user = verified
                    .and_then(|checked| {
                        data.users
                            .get(checked.id)
                            .filter(|u| u.is_active && u.password_hash == checked.password_hash)
                            .cloned()
                    })
                    .ok_or(AppError::Unauthorized)?;

                if let Some(stored) = data.users.get_mut(user.id) {
                    stored.last_login_at = Some(now);
                }
                let token = data.tokens.insert_with(|id| ApiToken {
                    id,
                    user_id: user.id,
                    name: "admin-panel".to_string(),
                    token_hash,
                    created_at: now,
                    last_used_at: None,
                    expires_at,
                });
                Ok((token.id, user))
            })
            .await
            .inspect_err(|_| tracing::warn!("🔐 Failed login attempt for {}", email))?;

        tracing::info!("🔐 {} logged in", user.email);
        let mut profile = UserProfile::from(&user);
        profile.last_login_at = Some(now);
        Ok(IssuedToken {
            token: format!("{}|{}", token_id, secret),
            expires_at,
            user: profile,
        })
    }

    pub async fn authenticate(&self, bearer: &str) -> Result<AuthContext> {
        let (id, secret) = bearer.split_once('|').ok_or(AppError::Unauthorized)?;
        let token_id: u64 = id.parse().map_err(|_| AppError::Unauthorized)?;
        let presented_hash = sha256_hex(secret.as_bytes());
        let now = Utc::now();

        let (token, user) = self
            .store
            .read(|data| {
                let token = data.tokens.get(token_id)?.clone();
                let user = data.users.get(token.user_id)?.clone();
                Some((token, user))
            })
            .await
            .ok_or(AppError::Unauthorized)?;

        if !constant_time_eq(&token.token_hash, &presented_hash) {
            return Err(AppError::Unauthorized);
        }
        if token.expires_at.is_some_and(|at| at <= now) {
            tracing::debug!("🔐 Token {} expired", token_id);
            return Err(AppError::Unauthorized);
        }
        if !user.is_active {
            return Err(AppError::Unauthorized);
        }

        // last_used_at 只需近似值，每分鐘最多寫入一次
        if token
            .last_used_at
            .is_none_or(|at| now - at > Duration::minutes(1))
        {
            self.store
                .write(|data| {
                    if let Some(stored) = data.tokens.get_mut(token_id) {
                        stored.last_used_at = Some(now);
                    }
                    Ok(())
                })
                .await?;
        }

        Ok(AuthContext {
            user: UserProfile::from(&user),
            token_id,
        })
    }

    pub async fn logout(&self, ctx: &AuthContext) -> Result<()> {
        self.store
            .write(|data| {
                data.tokens.remove(ctx.token_id);
                Ok(())
            })
            .await?;
        tracing::info!("🔐 {} logged out", ctx.user.email);
        Ok(())
    }

    pub async fn list_users(&self) -> Vec<UserProfile> {
        self.store
            .read(|data| data.users.iter().map(UserProfile::from).collect())
            .await
    }

    pub async fn get_user(&self, id: u64) -> Result<UserProfile> {
        self.store
            .read(|data| data.users.get(id).map(UserProfile::from))
            .await
            .ok_or_else(|| AppError::not_found("user", id))
    }

    pub async fn create_user(&self, input: NewUser) -> Result<UserProfile> {
        validate_length("name", &input.name, 1, 100)?;
        validate_email("email", &input.email)?;
        validate_length("password", &input.password, 8, 200)?;

        let email = input.email.trim().to_lowercase();
        let salt = generate_salt();
        let password_hash = hash_password(&input.password, &salt);
        let now = Utc::now();

        self.store
            .write(|data| {
                if data.users.find(|u| u.email == email).is_some() {
                    return Err(AppError::conflict(format!(
                        "email `{}` is already registered",
                        email
                    )));
                }
                let user = data.users.insert_with(|id| User {
                    id,
                    name: input.name.trim().to_string(),
                    email: email.clone(),
                    role: input.role,
                    password_hash,
                    password_salt: salt,
                    is_active: true,
                    last_login_at: None,
                    created_at: now,
                    updated_at: now,
                });
                Ok(UserProfile::from(user))
            })
            .await
    }

    pub async fn update_user(
        &self,
        actor: &AuthContext,
        id: u64,
        update: UserUpdate,
    ) -> Result<UserProfile> {
        if let Some(name) = &update.name {
            validate_length("name", name, 1, 100)?;
        }
        if let Some(password) = &update.password {
            validate_length("password", password, 8, 200)?;
        }
        let demotes = update.is_active == Some(false)
            || update.role.is_some_and(|r| r != actor.user.role);
        if actor.user.id == id && demotes {
            return Err(AppError::validation("id", "you cannot demote or deactivate yourself"));
        }

        let new_secret = update.password.as_ref().map(|password| {
            let salt = generate_salt();
            (hash_password(password, &salt), salt)
        });

        self.store
            .write(|data| {
                let user = data.users.get_mut(id).ok_or_else(|| AppError::not_found("user", id))?;
                if let Some(name) = update.name {
                    user.name = name.trim().to_string();
                }
                if let Some(role) = update.role {
                    user.role = role;
                }
                if let Some(is_active) = update.is_active {
                    user.is_active = is_active;
                }
                let revoke = !user.is_active || new_secret.is_some();
                if let Some((hash, salt)) = new_secret {
                    user.password_hash = hash;
                    user.password_salt = salt;
                }
                user.updated_at = Utc::now();
                let profile = UserProfile::from(&*user);

                // 停用或改密碼時撤銷其所有 token
                if revoke {
                    data.tokens.retain(|_, token| token.user_id != id);
                }
                Ok(profile)
            })
            .await
    }

    pub async fn delete_user(&self, actor: &AuthContext, id: u64) -> Result<()> {
        if actor.user.id == id {
            return Err(AppError::validation("id", "you cannot delete yourself"));
        }
        self.store
            .write(|data| {
                data.users.remove(id).ok_or_else(|| AppError::not_found("user", id))?;
                data.tokens.retain(|_, token| token.user_id != id);
                Ok(())
            })
            .await?;
        tracing::info!("👤 {} deleted user {}", actor.user.email, id);
        Ok(())
    }
}

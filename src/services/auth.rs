// src/services/auth.rs

use bcrypt::{hash, verify};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::UserRepository,
    models::auth::{AuthResponse, Claims, CustomClaims, Role, User},
};

#[derive(Clone)]
pub struct AuthService {
    user_repo: UserRepository,
    jwt_secret: String,
    custom_token_secret: Option<String>,
    session_ttl_hours: i64,
}

impl AuthService {
    pub fn new(
        user_repo: UserRepository,
        jwt_secret: String,
        custom_token_secret: Option<String>,
        session_ttl_hours: i64,
    ) -> Self {
        Self { user_repo, jwt_secret, custom_token_secret, session_ttl_hours }
    }

    pub async fn login_user(&self, email: &str, password: &str) -> Result<AuthResponse, AppError> {
        let user = self.user_repo
            .find_by_email(email.trim())
            .await?
            .ok_or(AppError::InvalidCredentials)?;

        let Some(password_hash) = user.password_hash.clone() else {
            return Err(AppError::InvalidCredentials);
        };
        let password_clone = password.to_owned();

        // Executa a verificação em um thread separado
        let is_password_valid = tokio::task::spawn_blocking(move || verify(&password_clone, &password_hash))
            .await
            .map_err(|e| anyhow::anyhow!("Falha na task de verificação de senha: {}", e))??;

        if !is_password_valid {
            return Err(AppError::InvalidCredentials);
        }

        tracing::info!("🔑 Login de {} ({:?})", user.id, user.role);
        self.create_token(&user)
    }

    pub async fn sign_in_anonymously(&self) -> Result<AuthResponse, AppError> {
        let user = self.user_repo.create_anonymous().await?;
        tracing::info!("🔑 Sessão anônima criada: {}", user.id);
        self.create_token(&user)
    }

    /// Troca um token emitido por outro sistema (assinado com CUSTOM_TOKEN_SECRET) por uma sessão.
    pub async fn sign_in_with_custom_token(&self, token: &str) -> Result<AuthResponse, AppError> {
        let secret = self.custom_token_secret.as_deref().ok_or(AppError::CustomTokenDisabled)?;

        let data = decode::<CustomClaims>(token, &DecodingKey::from_secret(secret.as_ref()), &Validation::default())
            .map_err(|_| AppError::InvalidToken)?;

        let user = self.user_repo.find_or_create_by_email(data.claims.email.trim()).await?;
        tracing::info!("🔑 Login por token externo ({}): {}", data.claims.sub, user.id);
        self.create_token(&user)
    }

    pub async fn validate_token(&self, token: &str) -> Result<User, AppError> {
        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_ref()),
            &Validation::default(),
        )
        .map_err(|_| AppError::InvalidToken)?;

        self.user_repo
            .find_by_id(token_data.claims.sub)
            .await?
            .ok_or(AppError::InvalidToken)
    }

    // --- Gestão de usuários (admin) ---

    pub async fn list_users(&self) -> Result<Vec<User>, AppError> {
        self.user_repo.list_all().await
    }

    pub async fn create_user(&self, email: &str, password: &str, role: Role) -> Result<User, AppError> {
        let hashed = hash_password(password).await?;
        let user = self.user_repo
            .create_user(email.trim(), Some(&hashed), role)
            .await?;
        tracing::info!("👤 Usuário criado: {} ({:?})", user.id, role);
        Ok(user)
    }

    pub async fn change_role(&self, id: Uuid, role: Role) -> Result<User, AppError> {
        let user = self.user_repo.update_role(id, role).await?.ok_or(AppError::NotFound("user"))?;
        tracing::info!("👤 Perfil de {} alterado para {:?}", id, role);
        Ok(user)
    }

    /// Cria (ou promove) o administrador inicial quando ainda não há nenhum.
    pub async fn ensure_admin(&self, email: &str, password: &str) -> Result<(), AppError> {
        if self.user_repo.count_admins().await? > 0 {
            return Ok(());
        }

        match self.user_repo.find_by_email(email).await? {
            Some(existing) => {
                self.user_repo.update_role(existing.id, Role::Admin).await?;
                tracing::info!("👑 Usuário {} promovido a administrador.", email);
            }
            None => {
                self.create_user(email, password, Role::Admin).await?;
                tracing::info!("👑 Administrador inicial {} criado.", email);
            }
        }
        Ok(())
    }

    fn create_token(&self, user: &User) -> Result<AuthResponse, AppError> {
        let now = Utc::now();
        let expires_at = now + Duration::hours(self.session_ttl_hours);

        let claims = Claims {
            sub: user.id,
            exp: expires_at.timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(self.jwt_secret.as_ref()))?;
        Ok(AuthResponse { token, role: user.role, expires_at })
    }
}

async fn hash_password(password: &str) -> Result<String, AppError> {
    let password_clone = password.to_owned();
    let hashed = tokio::task::spawn_blocking(move || hash(&password_clone, bcrypt::DEFAULT_COST))
        .await
        .map_err(|e| anyhow::anyhow!("Falha na task de hashing: {}", e))??;
    Ok(hashed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::{postgres::PgPoolOptions, PgPool};

    const SECRET: &str = "segredo";
    const CUSTOM_SECRET: &str = "segredo-externo";

    fn service_with(pool: PgPool, custom_token_secret: Option<&str>) -> AuthService {
        AuthService::new(
            UserRepository::new(pool),
            SECRET.to_string(),
            custom_token_secret.map(String::from),
            12,
        )
    }

    // Pool que nunca conecta: serve para os caminhos que não chegam ao banco
    fn offline_service(custom_token_secret: Option<&str>) -> AuthService {
        let pool = PgPoolOptions::new().connect_lazy("postgres://localhost/almoxarifado_offline").unwrap();
        service_with(pool, custom_token_secret)
    }

    fn user(role: Role) -> User {
        User {
            id: Uuid::new_v4(),
            email: Some("ana@exemplo.com".into()),
            password_hash: None,
            is_anonymous: false,
            role,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn custom_token(secret: &str, email: &str) -> String {
        let claims = CustomClaims {
            sub: "sistema-externo-42".into(),
            email: email.into(),
            exp: (Utc::now() + Duration::minutes(5)).timestamp() as usize,
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_ref())).unwrap()
    }

    #[tokio::test]
    async fn session_token_carries_user_and_ttl() {
        let service = offline_service(None);
        let editor = user(Role::Editor);

        let before = Utc::now();
        let response = service.create_token(&editor).unwrap();
        assert_eq!(response.role, Role::Editor);

        let ttl = response.expires_at - before;
        assert!(ttl >= Duration::hours(12) - Duration::seconds(1) && ttl <= Duration::hours(12) + Duration::seconds(1));

        let decoded =
            decode::<Claims>(&response.token, &DecodingKey::from_secret(SECRET.as_ref()), &Validation::default())
                .unwrap();
        assert_eq!(decoded.claims.sub, editor.id);
        assert_eq!(decoded.claims.exp as i64, response.expires_at.timestamp());
    }

    #[tokio::test]
    async fn foreign_or_expired_sessions_are_rejected() {
        let service = offline_service(None);
        let id = Uuid::new_v4();

        let foreign = encode(
            &Header::default(),
            &Claims { sub: id, exp: (Utc::now() + Duration::hours(1)).timestamp() as usize, iat: 0 },
            &EncodingKey::from_secret(b"outro"),
        )
        .unwrap();
        assert!(matches!(service.validate_token(&foreign).await, Err(AppError::InvalidToken)));

        let expired = encode(
            &Header::default(),
            &Claims { sub: id, exp: (Utc::now() - Duration::hours(2)).timestamp() as usize, iat: 0 },
            &EncodingKey::from_secret(SECRET.as_ref()),
        )
        .unwrap();
        assert!(matches!(service.validate_token(&expired).await, Err(AppError::InvalidToken)));
    }

    #[tokio::test]
    async fn custom_token_needs_a_configured_secret() {
        let token = custom_token(CUSTOM_SECRET, "ana@exemplo.com");
        let disabled = offline_service(None);
        assert!(matches!(
            disabled.sign_in_with_custom_token(&token).await,
            Err(AppError::CustomTokenDisabled)
        ));

        // assinado com outra chave
        let enabled = offline_service(Some(CUSTOM_SECRET));
        let forged = custom_token("chave-errada", "ana@exemplo.com");
        assert!(matches!(enabled.sign_in_with_custom_token(&forged).await, Err(AppError::InvalidToken)));
    }

    #[tokio::test]
    async fn hashed_password_verifies() {
        let hashed = hash_password("senha123").await.unwrap();
        assert!(verify("senha123", &hashed).unwrap());
        assert!(!verify("errada", &hashed).unwrap());
    }

    #[sqlx::test]
    #[ignore = "requer DATABASE_URL apontando para um banco descartável"]
    async fn custom_token_creates_an_anon_user_once(pool: PgPool) {
        let service = service_with(pool, Some(CUSTOM_SECRET));
        let token = custom_token(CUSTOM_SECRET, "novo@exemplo.com");

        let first = service.sign_in_with_custom_token(&token).await.unwrap();
        assert_eq!(first.role, Role::Anon);
        let session_user = service.validate_token(&first.token).await.unwrap();
        assert_eq!(session_user.email.as_deref(), Some("novo@exemplo.com"));
        assert_eq!(session_user.role, Role::Anon);

        // segundo login reaproveita o mesmo usuário
        let second = service.sign_in_with_custom_token(&token).await.unwrap();
        assert_eq!(service.validate_token(&second.token).await.unwrap().id, session_user.id);
    }

    #[sqlx::test]
    #[ignore = "requer DATABASE_URL apontando para um banco descartável"]
    async fn password_login_and_bootstrap_admin(pool: PgPool) {
        let service = service_with(pool, None);
        service.ensure_admin("chefe@exemplo.com", "senha123").await.unwrap();

        let session = service.login_user("chefe@exemplo.com", "senha123").await.unwrap();
        assert_eq!(session.role, Role::Admin);
        assert!(matches!(
            service.login_user("chefe@exemplo.com", "errada").await,
            Err(AppError::InvalidCredentials)
        ));

        // já existe admin: não cria outro
        service.ensure_admin("outro@exemplo.com", "senha123").await.unwrap();
        assert!(matches!(
            service.login_user("outro@exemplo.com", "senha123").await,
            Err(AppError::InvalidCredentials)
        ));
    }
}

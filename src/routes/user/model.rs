use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use validator::{Validate, ValidationError};

use crate::utils::{blank_as_none, not_blank, valid_password, verify_password};

/// 注册时的默认角色
pub const DEFAULT_ROLE: &str = "usuario";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Role {
    pub id: i32,
    pub nombre: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoriaRef {
    pub id: i32,
    pub nombre: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Categoria {
    pub id: i32,
    pub nombre: String,
    pub horas_docencia_base: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: i32,
    pub nombre: String,
    pub apellidos: String,
    pub nombre_usuario: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub rol: Role,
    pub categoria: Option<CategoriaRef>,
    pub aprobado: bool,
    pub miembro_sociedad: bool,
    pub cotizo: bool,
    pub fecha_creacion: DateTime<Utc>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.rol.nombre.eq_ignore_ascii_case(crate::utils::ADMIN_ROLE)
    }

    /// 管理员与学会会员可以查看非公开内容
    pub fn can_view_private(&self) -> bool {
        self.is_admin() || self.miembro_sociedad
    }

    pub fn verify_login(&self, password: &str) -> Result<bool, bcrypt::BcryptError> {
        verify_password(password, &self.password_hash)
    }
}

fn valid_username(value: &str) -> Result<(), ValidationError> {
    let len = value.chars().count();
    if !(3..=50).contains(&len)
        || !value
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '.')
    {
        return Err(ValidationError::new("username").with_message(
            "El nombre de usuario debe tener entre 3 y 50 caracteres (letras, números, '_' o '.')"
                .into(),
        ));
    }
    Ok(())
}

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(custom(function = "not_blank", message = "El nombre es obligatorio"))]
    pub nombre: String,
    #[validate(custom(function = "not_blank", message = "Los apellidos son obligatorios"))]
    pub apellidos: String,
    #[validate(custom(function = "valid_username"))]
    pub nombre_usuario: String,
    #[validate(email(message = "El email no es válido"))]
    pub email: String,
    #[validate(custom(function = "valid_password"))]
    pub password: String,
    pub categoria_id: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    /// 用户名或邮箱均可
    #[serde(alias = "email", alias = "usuario")]
    pub nombre_usuario: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub expires_at: i64,
    pub user: User,
}

#[derive(Debug, Serialize)]
pub struct LogoutResponse {}

/// 管理员编辑用户
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateUserRequest {
    #[validate(custom(function = "not_blank", message = "El nombre es obligatorio"))]
    pub nombre: String,
    #[validate(custom(function = "not_blank", message = "Los apellidos son obligatorios"))]
    pub apellidos: String,
    #[validate(custom(function = "valid_username"))]
    pub nombre_usuario: String,
    #[validate(email(message = "El email no es válido"))]
    pub email: String,
    pub rol_id: i32,
    pub categoria_id: Option<i32>,
    pub aprobado: bool,
    #[serde(default)]
    pub miembro_sociedad: bool,
    #[serde(default)]
    pub cotizo: bool,
    /// 留空则不修改密码
    #[serde(default, deserialize_with = "blank_as_none")]
    #[validate(custom(function = "valid_password"))]
    pub password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UserFilter {
    pub aprobado: Option<bool>,
    pub q: Option<String>,
}

/// 可由管理员切换的布尔标记
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserFlag {
    Cotizo,
    MiembroSociedad,
}

impl UserFlag {
    fn column(self) -> &'static str {
        match self {
            UserFlag::Cotizo => "cotizo",
            UserFlag::MiembroSociedad => "miembro_sociedad",
        }
    }
}

const USER_SELECT: &str = r#"
    SELECT
        u.id, u.nombre, u.apellidos, u.nombre_usuario, u.email, u.password_hash,
        u.aprobado, u.miembro_sociedad, u.cotizo, u.fecha_creacion,
        r.id AS rol_id, r.nombre AS rol_nombre,
        c.id AS categoria_id, c.nombre AS categoria_nombre
    FROM usuarios u
    JOIN roles r ON r.id = u.rol_id
    LEFT JOIN categorias c ON c.id = u.categoria_id
"#;

// 数据库原始行
#[derive(FromRow)]
struct RawUser {
    id: i32,
    nombre: String,
    apellidos: String,
    nombre_usuario: String,
    email: String,
    password_hash: String,
    aprobado: bool,
    miembro_sociedad: bool,
    cotizo: bool,
    fecha_creacion: DateTime<Utc>,
    rol_id: i32,
    rol_nombre: String,
    categoria_id: Option<i32>,
    categoria_nombre: Option<String>,
}

impl From<RawUser> for User {
    fn from(raw: RawUser) -> Self {
        let categoria = match (raw.categoria_id, raw.categoria_nombre) {
            (Some(id), Some(nombre)) => Some(CategoriaRef { id, nombre }),
            _ => None,
        };
        Self {
            id: raw.id,
            nombre: raw.nombre,
            apellidos: raw.apellidos,
            nombre_usuario: raw.nombre_usuario,
            email: raw.email,
            password_hash: raw.password_hash,
            rol: Role {
                id: raw.rol_id,
                nombre: raw.rol_nombre,
            },
            categoria,
            aprobado: raw.aprobado,
            miembro_sociedad: raw.miembro_sociedad,
            cotizo: raw.cotizo,
            fecha_creacion: raw.fecha_creacion,
        }
    }
}

impl User {
    pub async fn create(
        pool: &PgPool,
        req: &RegisterRequest,
        password_hash: &str,
    ) -> Result<Self, sqlx::Error> {
        let id: i32 = sqlx::query_scalar(
            r#"
            INSERT INTO usuarios (nombre, apellidos, nombre_usuario, email, password_hash, rol_id, categoria_id)
            VALUES ($1, $2, $3, $4, $5, (SELECT id FROM roles WHERE nombre = $6), $7)
            RETURNING id
            "#,
        )
        .bind(req.nombre.trim())
        .bind(req.apellidos.trim())
        .bind(req.nombre_usuario.trim())
        .bind(req.email.trim().to_lowercase())
        .bind(password_hash)
        .bind(DEFAULT_ROLE)
        .bind(req.categoria_id)
        .fetch_one(pool)
        .await?;

        tracing::info!("Registered user {} pending approval", id);
        Self::find_by_id(pool, id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)
    }

    pub async fn find_by_id(pool: &PgPool, id: i32) -> Result<Option<Self>, sqlx::Error> {
        let raw = sqlx::query_as::<_, RawUser>(&format!("{} WHERE u.id = $1", USER_SELECT))
            .bind(id)
            .fetch_optional(pool)
            .await?;

        Ok(raw.map(User::from))
    }

    /// 按用户名或邮箱查找
    pub async fn find_by_login(pool: &PgPool, login: &str) -> Result<Option<Self>, sqlx::Error> {
        let raw = sqlx::query_as::<_, RawUser>(&format!(
            "{} WHERE u.nombre_usuario = $1 OR LOWER(u.email) = LOWER($1)",
            USER_SELECT
        ))
        .bind(login.trim())
        .fetch_optional(pool)
        .await?;

        Ok(raw.map(User::from))
    }

    pub async fn list(pool: &PgPool, filter: &UserFilter) -> Result<Vec<Self>, sqlx::Error> {
        let pattern = filter
            .q
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(|q| format!("%{}%", q));

        let rows = sqlx::query_as::<_, RawUser>(&format!(
            r#"{}
            WHERE ($1::boolean IS NULL OR u.aprobado = $1)
              AND ($2::text IS NULL
                   OR u.nombre ILIKE $2 OR u.apellidos ILIKE $2
                   OR u.nombre_usuario ILIKE $2 OR u.email ILIKE $2)
            ORDER BY u.apellidos, u.nombre
            "#,
            USER_SELECT
        ))
        .bind(filter.aprobado)
        .bind(pattern)
        .fetch_all(pool)
        .await?;

        Ok(rows.into_iter().map(User::from).collect())
    }

    /// `password_hash` 为 None 时保留原密码
    pub async fn update(
        pool: &PgPool,
        id: i32,
        req: &UpdateUserRequest,
        password_hash: Option<String>,
    ) -> Result<Self, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE usuarios
            SET nombre = $1, apellidos = $2, nombre_usuario = $3, email = $4,
                rol_id = $5, categoria_id = $6, aprobado = $7,
                miembro_sociedad = $8, cotizo = $9,
                password_hash = COALESCE($10, password_hash)
            WHERE id = $11
            "#,
        )
        .bind(req.nombre.trim())
        .bind(req.apellidos.trim())
        .bind(req.nombre_usuario.trim())
        .bind(req.email.trim().to_lowercase())
        .bind(req.rol_id)
        .bind(req.categoria_id)
        .bind(req.aprobado)
        .bind(req.miembro_sociedad)
        .bind(req.cotizo)
        .bind(password_hash)
        .bind(id)
        .execute(pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(sqlx::Error::RowNotFound);
        }

        Self::find_by_id(pool, id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)
    }

    /// 创建或提升管理员账号；已存在时只保证角色和审核状态，不覆盖密码
    pub async fn upsert_admin(
        pool: &PgPool,
        username: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<i32, sqlx::Error> {
        sqlx::query_scalar(
            r#"
            INSERT INTO usuarios (nombre, apellidos, nombre_usuario, email, password_hash, rol_id, aprobado)
            VALUES ($1, 'Administrador', $1, $2, $3, (SELECT id FROM roles WHERE nombre = $4), TRUE)
            ON CONFLICT (nombre_usuario) DO UPDATE
            SET rol_id = EXCLUDED.rol_id, aprobado = TRUE
            RETURNING id
            "#,
        )
        .bind(username)
        .bind(email.to_lowercase())
        .bind(password_hash)
        .bind(crate::utils::ADMIN_ROLE)
        .fetch_one(pool)
        .await
    }

    pub async fn delete(pool: &PgPool, id: i32) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM usuarios WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn approve(pool: &PgPool, id: i32) -> Result<Self, sqlx::Error> {
        let result = sqlx::query("UPDATE usuarios SET aprobado = TRUE WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(sqlx::Error::RowNotFound);
        }

        tracing::info!("User {} approved", id);
        Self::find_by_id(pool, id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)
    }

    pub async fn toggle_flag(pool: &PgPool, id: i32, flag: UserFlag) -> Result<Self, sqlx::Error> {
        let column = flag.column();
        let result = sqlx::query(&format!(
            "UPDATE usuarios SET {column} = NOT {column} WHERE id = $1"
        ))
        .bind(id)
        .execute(pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(sqlx::Error::RowNotFound);
        }

        Self::find_by_id(pool, id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)
    }
}

impl Role {
    pub async fn list(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Role>("SELECT id, nombre FROM roles ORDER BY nombre")
            .fetch_all(pool)
            .await
    }
}

impl Categoria {
    pub async fn list(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Categoria>(
            "SELECT id, nombre, horas_docencia_base FROM categorias ORDER BY nombre",
        )
        .fetch_all(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn register(nombre_usuario: &str, email: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            nombre: "Ana".into(),
            apellidos: "García".into(),
            nombre_usuario: nombre_usuario.into(),
            email: email.into(),
            password: password.into(),
            categoria_id: None,
        }
    }

    #[test]
    fn register_accepts_valid_payload() {
        assert!(register("ana.garcia", "ana@uni.es", "secreto1").validate().is_ok());
    }

    #[test]
    fn register_rejects_short_password_and_bad_email() {
        let errors = register("ana", "no-es-email", "123").validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("email"));
        assert!(fields.contains_key("password"));
    }

    #[test]
    fn username_rejects_spaces() {
        assert!(valid_username("ana garcia").is_err());
        assert!(valid_username("ab").is_err());
        assert!(valid_username("ana_g.2024").is_ok());
    }

    #[test]
    fn blank_name_is_rejected() {
        let mut req = register("ana", "ana@uni.es", "secreto1");
        req.nombre = "   ".into();
        assert!(req.validate().is_err());
    }

    fn update_body(password: &str) -> String {
        format!(
            r#"{{"nombre":"Ana","apellidos":"García","nombre_usuario":"ana","email":"ana@uni.es","rol_id":2,"categoria_id":null,"aprobado":true,"password":{}}}"#,
            password
        )
    }

    #[test]
    fn blank_password_on_update_keeps_current() {
        let req: UpdateUserRequest = serde_json::from_str(&update_body(r#""""#)).unwrap();
        assert_eq!(req.password, None);
        assert!(req.validate().is_ok());

        let req: UpdateUserRequest = serde_json::from_str(&update_body(r#""   ""#)).unwrap();
        assert_eq!(req.password, None);

        let req: UpdateUserRequest = serde_json::from_str(&update_body("null")).unwrap();
        assert!(req.validate().is_ok());
    }

    #[test]
    fn update_password_still_validated_when_present() {
        let req: UpdateUserRequest = serde_json::from_str(&update_body(r#""123""#)).unwrap();
        assert!(req.validate().is_err());

        let req: UpdateUserRequest = serde_json::from_str(&update_body(r#""nueva123""#)).unwrap();
        assert_eq!(req.password.as_deref(), Some("nueva123"));
        assert!(req.validate().is_ok());
    }

    #[test]
    fn multibyte_password_over_72_bytes_is_rejected() {
        let long = "ñ".repeat(40);
        assert_eq!(long.chars().count(), 40);
        let errors = register("ana", "ana@uni.es", &long).validate().unwrap_err();
        assert!(errors.field_errors().contains_key("password"));
    }

    #[test]
    fn password_hash_never_serialized() {
        let user = User {
            id: 1,
            nombre: "Ana".into(),
            apellidos: "García".into(),
            nombre_usuario: "ana".into(),
            email: "ana@uni.es".into(),
            password_hash: "$2b$secret".into(),
            rol: Role {
                id: 2,
                nombre: "usuario".into(),
            },
            categoria: None,
            aprobado: true,
            miembro_sociedad: false,
            cotizo: false,
            fecha_creacion: Utc::now(),
        };
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password_hash").is_none());
        assert!(json.get("password").is_none());
        assert_eq!(json["rol"]["nombre"], "usuario");
        assert!(!user.can_view_private());
    }
}

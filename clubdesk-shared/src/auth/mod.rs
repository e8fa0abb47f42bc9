/// Authentication and authorization utilities
///
/// # Modules
///
/// - [`password`]: Argon2id password hashing and the password policy
/// - [`jwt`]: JWT access/refresh token generation and validation
/// - [`middleware`]: Bearer-token extraction into an [`middleware::AuthContext`]
/// - [`authorization`]: Role checks against the staff role matrix
///
/// # Example
///
/// ```no_run
/// use clubdesk_shared::auth::password::{hash_password, verify_password};
/// use clubdesk_shared::auth::jwt::{create_token, Claims, TokenType};
/// use clubdesk_shared::models::user::UserRole;
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password("admin123")?;
/// assert!(verify_password("admin123", &hash)?);
///
/// let claims = Claims::new(Uuid::new_v4(), "admin", UserRole::Admin, TokenType::Access);
/// let token = create_token(&claims, "secret-key-at-least-32-bytes-long")?;
/// # Ok(())
/// # }
/// ```

pub mod authorization;
pub mod jwt;
pub mod middleware;
pub mod password;

/// Credentials and request authentication
///
/// # Modules
///
/// - [`password`]: Argon2id password hashing and validation
/// - [`jwt`]: access and refresh JWTs
/// - [`token`]: opaque invite and link tokens, stored as SHA-256 digests
/// - [`middleware`]: Axum bearer-token middleware and the `Actor` extractor
///
/// # Security Features
///
/// - **Password Hashing**: Argon2id with 19 MiB memory, 2 iterations
/// - **JWT Tokens**: HS256 signing, 24h access and 30d refresh tokens
/// - **Capability Tokens**: 190 bits of randomness; only the hash is persisted
///
/// # Example
///
/// ```no_run
/// use warden_shared::auth::password::{hash_password, verify_password};
/// use warden_shared::auth::jwt::{create_token, Claims, TokenType};
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password("user_password")?;
/// assert!(verify_password("user_password", &hash)?);
///
/// let claims = Claims::new(Uuid::new_v4(), "ada@example.com", TokenType::Access);
/// let token = create_token(&claims, "secret-key-at-least-32-characters-long")?;
/// # Ok(())
/// # }
/// ```

pub mod jwt;
pub mod middleware;
pub mod password;
pub mod token;

/// Authentication and authorization utilities
///
/// # Modules
///
/// - [`password`]: Argon2id password hashing and verification
/// - [`jwt`]: Access/refresh JWT generation and validation
/// - [`token`]: Random invite tokens and SHA-256 token digests
/// - [`authorization`]: The family permission matrix
/// - [`middleware`]: Bearer-token authentication and the request `AuthContext`
///
/// # Example
///
/// ```no_run
/// use twocare_shared::auth::authorization::{authorize, Operation};
/// use twocare_shared::auth::password::{hash_password, verify_password};
/// use twocare_shared::models::membership::FamilyRole;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password("user_password")?;
/// assert!(verify_password("user_password", &hash)?);
///
/// authorize(FamilyRole::Caregiver, Operation::CreateActivity, false)?;
/// # Ok(())
/// # }
/// ```

pub mod authorization;
pub mod jwt;
pub mod middleware;
pub mod password;
pub mod token;

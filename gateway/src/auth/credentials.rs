// gateway/src/auth/credentials.rs
use dashmap::DashMap;
use uuid::Uuid;

/// A registered credential holder
#[derive(Clone)]
pub struct User {
    pub id: Uuid,
    /// Lowercase-normalized
    pub email: String,
    password_hash: String,
}

impl std::fmt::Debug for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    /// Unknown email and wrong password are deliberately indistinguishable
    #[error("Not found.")]
    NotFound,

    #[error("unable to hash password: {0}")]
    Hash(#[from] bcrypt::BcryptError),
}

/// Holds users and verifies email/password pairs against bcrypt hashes
pub struct CredentialStore {
    // Keyed by normalized email
    users: DashMap<String, User>,
    cost: u32,
    // Compared against when the email is unknown so both failure paths cost the same
    decoy_hash: String,
}

impl CredentialStore {
    pub fn new() -> Result<Self, CredentialError> {
        Self::with_cost(bcrypt::DEFAULT_COST)
    }

    pub fn with_cost(cost: u32) -> Result<Self, CredentialError> {
        Ok(Self {
            users: DashMap::new(),
            cost,
            decoy_hash: bcrypt::hash("decoy-password", cost)?,
        })
    }

    /// Hash and store a user, replacing any existing user with the same email
    pub fn add_user(&self, email: &str, password: &str) -> Result<User, CredentialError> {
        let user = User {
            id: Uuid::new_v4(),
            email: normalize(email),
            password_hash: bcrypt::hash(password, self.cost)?,
        };
        self.users.insert(user.email.clone(), user.clone());
        tracing::info!(user_id = %user.id, email = %user.email, "Registered user");
        Ok(user)
    }

    pub fn find_user(&self, email: &str, password: &str) -> Result<User, CredentialError> {
        let user = self.users.get(&normalize(email)).map(|entry| entry.value().clone());

        match user {
            Some(user) if verify(password, &user.password_hash) => Ok(user),
            Some(_) => Err(CredentialError::NotFound),
            None => {
                let _ = verify(password, &self.decoy_hash);
                Err(CredentialError::NotFound)
            }
        }
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

fn normalize(email: &str) -> String {
    email.trim().to_lowercase()
}

fn verify(password: &str, hash: &str) -> bool {
    bcrypt::verify(password, hash).unwrap_or(false)
}

use chrono::Utc;
use jsonwebtoken::{ encode, EncodingKey, Header };

use crate::{
    config::Config,
    error::{ AppError, Result },
    models::{ Claims, User },
};

pub fn generate_jwt_token(user: &User, config: &Config) -> Result<String> {
    let user_id = user.id
        .as_ref()
        .ok_or_else(|| AppError::InternalError(anyhow::anyhow!("User has no id")))?;

    let now = Utc::now().timestamp();
    let exp = now + config.jwt.expiration_hours * 3600;

    let claims = Claims {
        sub: user_id.to_hex(),
        email: user.email.clone(),
        exp,
        iat: now,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt.secret.as_bytes())
    ).map_err(|e| AppError::InternalError(e.into()))
}

pub fn hash_password(password: &str) -> Result<String> {
    bcrypt::hash(password, bcrypt::DEFAULT_COST).map_err(|e| AppError::InternalError(e.into()))
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    bcrypt::verify(password, hash).map_err(|e| AppError::InternalError(e.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_round_trip() {
        let hash = hash_password("correct horse battery staple").unwrap();
        assert!(verify_password("correct horse battery staple", &hash).unwrap());
        assert!(!verify_password("wrong password", &hash).unwrap());
    }
}

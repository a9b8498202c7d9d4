use argon2::{
    Argon2, PasswordHasher,
    password_hash::{PasswordHash, PasswordVerifier, SaltString},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use password_hash::rand_core::OsRng;
use sea_orm::ActiveValue::NotSet;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use uuid::Uuid;

use crate::{
    dto::auth::{Claims, CustomerResponse, LoginRequest, LoginResponse, RegisterRequest, UpdateProfileRequest},
    entity::customers::{ActiveModel as CustomerActive, Column as CustomerCol, Entity as Customers},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    response::ApiResponse,
    state::AppState,
};

pub async fn register(
    state: &AppState,
    payload: RegisterRequest,
) -> AppResult<ApiResponse<CustomerResponse>> {
    if payload.username.len() < 3 {
        return Err(AppError::Validation(
            "Username must be at least 3 characters long".into(),
        ));
    }
    if payload.full_name.len() < 2 {
        return Err(AppError::Validation(
            "Full name must be at least 2 characters long".into(),
        ));
    }
    if payload.password.len() < 6 {
        return Err(AppError::Validation(
            "Password must be at least 6 characters long".into(),
        ));
    }
    if !payload.email.contains('@') {
        return Err(AppError::Validation("Invalid email address".into()));
    }

    let username_taken = Customers::find()
        .filter(CustomerCol::Username.eq(payload.username.as_str()))
        .one(&state.orm)
        .await?;
    if username_taken.is_some() {
        return Err(AppError::Conflict("Username is already taken".into()));
    }

    let email_taken = Customers::find()
        .filter(CustomerCol::Email.eq(payload.email.as_str()))
        .one(&state.orm)
        .await?;
    if email_taken.is_some() {
        return Err(AppError::Conflict("Email is already registered".into()));
    }

    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let password_hash = argon2
        .hash_password(payload.password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))?
        .to_string();

    let customer = CustomerActive {
        id: Set(Uuid::new_v4()),
        username: Set(payload.username),
        email: Set(payload.email),
        full_name: Set(payload.full_name),
        phone: Set(payload.phone),
        address: Set(payload.address),
        password_hash: Set(password_hash),
        role: Set("customer".into()),
        is_active: Set(true),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    Ok(ApiResponse::created(
        "Registration successful",
        CustomerResponse::from_entity(customer),
    ))
}

pub async fn login(
    state: &AppState,
    payload: LoginRequest,
) -> AppResult<ApiResponse<LoginResponse>> {
    let customer = Customers::find()
        .filter(CustomerCol::Username.eq(payload.username.as_str()))
        .one(&state.orm)
        .await?;

    let customer = match customer {
        Some(c) => c,
        None => return Err(AppError::Unauthorized("Invalid username or password".into())),
    };

    let parsed_hash = PasswordHash::new(&customer.password_hash)
        .map_err(|_| AppError::Internal(anyhow::anyhow!("Invalid password hash")))?;

    let argon2 = Argon2::default();
    if argon2
        .verify_password(payload.password.as_bytes(), &parsed_hash)
        .is_err()
    {
        return Err(AppError::Unauthorized("Invalid username or password".into()));
    }

    if !customer.is_active {
        return Err(AppError::Unauthorized("Account is disabled".into()));
    }

    let secret = std::env::var("JWT_SECRET")
        .map_err(|_| AppError::Internal(anyhow::anyhow!("JWT_SECRET is not set")))?;

    let expiration = Utc::now()
        .checked_add_signed(Duration::hours(24))
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Failed to set expiration")))?;

    let claims = Claims {
        sub: customer.id.to_string(),
        role: customer.role.clone(),
        exp: expiration.timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))?;

    let resp = LoginResponse {
        token: format!("Bearer {}", token),
        customer: CustomerResponse::from_entity(customer),
    };

    Ok(ApiResponse::success("Login successful", resp))
}

pub async fn get_profile(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<CustomerResponse>> {
    let customer = Customers::find_by_id(user.customer_id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("Customer"))?;

    Ok(ApiResponse::success(
        "Profile retrieved",
        CustomerResponse::from_entity(customer),
    ))
}

pub async fn update_profile(
    state: &AppState,
    user: &AuthUser,
    payload: UpdateProfileRequest,
) -> AppResult<ApiResponse<CustomerResponse>> {
    let customer = Customers::find_by_id(user.customer_id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("Customer"))?;

    let mut active: CustomerActive = customer.into();
    if let Some(full_name) = payload.full_name {
        if full_name.len() < 2 {
            return Err(AppError::Validation(
                "Full name must be at least 2 characters long".into(),
            ));
        }
        active.full_name = Set(full_name);
    }
    if payload.phone.is_some() {
        active.phone = Set(payload.phone);
    }
    if payload.address.is_some() {
        active.address = Set(payload.address);
    }
    active.updated_at = Set(Utc::now().into());

    let customer = active.update(&state.orm).await?;

    Ok(ApiResponse::success(
        "Profile updated",
        CustomerResponse::from_entity(customer),
    ))
}

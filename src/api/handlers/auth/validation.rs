//! Sign-up form validation. Fields are checked in form order and the first
//! failure is reported.

use crate::{provisioning::SignupProfile, store::ProfileType};
use regex::Regex;

use super::{
    types::SignupRequest,
    utils::{normalize_email, valid_email},
};

#[derive(Debug, PartialEq, Eq)]
pub(super) struct FieldError {
    pub(super) field: &'static str,
    pub(super) message: &'static str,
}

impl FieldError {
    fn new(field: &'static str, message: &'static str) -> Self {
        Self { field, message }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub(super) struct ValidSignup {
    pub(super) email: String,
    pub(super) password: String,
    pub(super) profile: SignupProfile,
}

fn check_length(
    value: &str,
    min: usize,
    max: usize,
    field: &'static str,
    too_short: &'static str,
    too_long: &'static str,
) -> Result<(), FieldError> {
    let length = value.chars().count();
    if length < min {
        return Err(FieldError::new(field, too_short));
    }
    if length > max {
        return Err(FieldError::new(field, too_long));
    }
    Ok(())
}

fn valid_phone(phone: &str) -> bool {
    Regex::new(r"^[\d\s+\-()]+$").is_ok_and(|regex| regex.is_match(phone))
}

pub(super) fn validate_signup(request: &SignupRequest) -> Result<ValidSignup, FieldError> {
    let profile_type = match request.profile_type.as_deref() {
        None | Some("") => {
            return Err(FieldError::new(
                "profile_type",
                "Por favor selecciona tu perfil",
            ));
        }
        Some(value) => value
            .parse::<ProfileType>()
            .map_err(|_| FieldError::new("profile_type", "Perfil inválido"))?,
    };

    let merchant_name = request.merchant_name.trim();
    check_length(
        merchant_name,
        2,
        80,
        "merchant_name",
        "El nombre debe tener al menos 2 caracteres",
        "El nombre no puede exceder 80 caracteres",
    )?;

    let full_name = request.full_name.trim();
    check_length(
        full_name,
        2,
        80,
        "full_name",
        "Tu nombre debe tener al menos 2 caracteres",
        "Tu nombre no puede exceder 80 caracteres",
    )?;

    let email = normalize_email(&request.email);
    if !valid_email(&email) {
        return Err(FieldError::new("email", "Email inválido"));
    }

    let phone = request.phone.trim();
    check_length(
        phone,
        7,
        20,
        "phone",
        "Teléfono debe tener al menos 7 dígitos",
        "Teléfono no puede exceder 20 caracteres",
    )?;
    if !valid_phone(phone) {
        return Err(FieldError::new(
            "phone",
            "Teléfono contiene caracteres inválidos",
        ));
    }

    check_length(
        &request.password,
        8,
        100,
        "password",
        "La contraseña debe tener al menos 8 caracteres",
        "La contraseña no puede exceder 100 caracteres",
    )?;

    Ok(ValidSignup {
        email,
        password: request.password.clone(),
        profile: SignupProfile {
            merchant_name: merchant_name.to_string(),
            full_name: full_name.to_string(),
            phone: phone.to_string(),
            profile_type,
        },
    })
}

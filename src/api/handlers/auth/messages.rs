//! User-facing messages. The sign-in pages are in Spanish.

pub(super) const INVALID_PAYLOAD: &str = "Error al procesar la solicitud";
pub(super) const INVALID_EMAIL: &str = "Email inválido";
pub(super) const LOGIN_PASSWORD_TOO_SHORT: &str = "La contraseña debe tener al menos 6 caracteres";
pub(super) const TOO_MANY_LOGIN_ATTEMPTS: &str =
    "Demasiados intentos fallidos. Intenta de nuevo en 15 minutos.";
pub(super) const TOO_MANY_RECOVERY_REQUESTS: &str =
    "Demasiadas solicitudes de recuperación. Intenta de nuevo en 15 minutos.";
pub(super) const INVALID_CREDENTIALS: &str = "Credenciales inválidas";
pub(super) const EMAIL_NOT_VERIFIED_LOGIN: &str = "Tu correo electrónico aún no ha sido verificado. Por favor revisa tu bandeja de entrada y verifica tu correo antes de iniciar sesión.";
pub(super) const EMAIL_NOT_VERIFIED_RECOVERY: &str = "Tu correo electrónico aún no ha sido verificado. Por favor verifica tu correo antes de restablecer tu contraseña.";
pub(super) const EMAIL_NOT_VERIFIED_TYPE: &str = "email_not_verified";
pub(super) const MERCHANT_PROFILE_FAILED: &str = "Error al crear el perfil del comerciante";
pub(super) const USER_PROFILE_FAILED: &str = "Error al actualizar el perfil de usuario";

pub(super) const ALREADY_REGISTERED: &str =
    "Este correo ya está registrado. Por favor inicia sesión o usa otro correo.";
pub(super) const USER_NOT_CREATED: &str = "Failed to create user";
pub(super) const CHECK_EMAIL: &str = "Please check your email to verify your account";

pub(super) const ACCOUNT_NOT_FOUND: &str = "No existe una cuenta con este correo electrónico";
pub(super) const RECOVERY_FAILED: &str =
    "Error al procesar la solicitud. Verifica que tu correo esté verificado.";
pub(super) const RECOVERY_SENT: &str =
    "Si existe una cuenta con este correo, recibirás un enlace de recuperación";

pub(super) const RESET_PASSWORD_TOO_SHORT: &str = "La contraseña debe tener al menos 8 caracteres";
pub(super) const RECOVERY_TOKEN_INVALID: &str = "Token de recuperación inválido o expirado";
pub(super) const PASSWORD_UPDATE_FAILED: &str = "Error al actualizar la contraseña";
pub(super) const PASSWORD_RESET_DONE: &str = "Contraseña restablecida exitosamente";

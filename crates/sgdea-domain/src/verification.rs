// verification.rs
//
// Token de verificación de segundo factor con caducidad explícita.
// Reemplaza la marca global "2FA verificado" de sesión: cada sesión
// guarda un token con instante de verificación y vida útil, y el chequeo
// de vigencia es siempre `now - verified_at <= lifetime`.
use crate::DomainError;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

/// Token efímero emitido al completar la verificación 2FA.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerificationToken {
  verified_at: DateTime<Utc>,
  lifetime: Duration,
}

impl VerificationToken {
  pub fn new(verified_at: DateTime<Utc>, lifetime: Duration) -> Self {
    Self { verified_at, lifetime }
  }

  pub fn verified_at(&self) -> DateTime<Utc> {
    self.verified_at
  }

  /// Vigente si `now` cae dentro de la ventana [verified_at, verified_at + lifetime].
  /// Un `now` anterior a `verified_at` (reloj retrocedido) no es vigente.
  pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
    now >= self.verified_at && now - self.verified_at <= self.lifetime
  }
}

/// Registro de tokens de verificación por sesión.
///
/// Los tokens caducados se eliminan al consultarlos; no hay estado
/// ambiente: la vigencia depende sólo del token y del `now` recibido.
pub struct SessionVerifier {
  lifetime: Duration,
  tokens: Mutex<HashMap<Uuid, VerificationToken>>,
}

impl SessionVerifier {
  pub fn new(lifetime: Duration) -> Self {
    Self { lifetime, tokens: Mutex::new(HashMap::new()) }
  }

  fn lock(&self) -> Result<MutexGuard<'_, HashMap<Uuid, VerificationToken>>, DomainError> {
    self.tokens
        .lock()
        .map_err(|e| DomainError::StorageError(format!("mutex poisoned: {:?}", e)))
  }

  /// Marca la sesión como verificada en el instante `now`.
  pub fn mark_verified(&self, session_id: Uuid, now: DateTime<Utc>) -> Result<VerificationToken, DomainError> {
    let token = VerificationToken::new(now, self.lifetime);
    self.lock()?.insert(session_id, token);
    Ok(token)
  }

  /// Consulta la vigencia de la sesión; un token caducado se purga aquí.
  pub fn is_verified(&self, session_id: &Uuid, now: DateTime<Utc>) -> Result<bool, DomainError> {
    let mut tokens = self.lock()?;
    match tokens.get(session_id) {
      Some(token) if token.is_valid(now) => Ok(true),
      Some(_) => {
        tokens.remove(session_id);
        Ok(false)
      }
      None => Ok(false),
    }
  }

  /// Revoca la verificación de la sesión (logout, cambio de credenciales).
  pub fn revoke(&self, session_id: &Uuid) -> Result<(), DomainError> {
    self.lock()?.remove(session_id);
    Ok(())
  }
}

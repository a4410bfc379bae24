use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::debug_log;
use crate::document::DocumentHandle;
use crate::engine::{EncryptionSpec, OpenSource, Permissions, RenderEngine, SecurityEngine};
use crate::error::ViewerError;
use crate::notify::PasswordPrompt;

/// Validates the password-confirmation pair from a "set password" dialog.
/// Empty passwords and mismatched confirmations are rejected.
pub fn confirm_password(password: &str, confirmation: &str) -> Option<String> {
    if password.is_empty() || password != confirmation {
        return None;
    }
    Some(password.to_string())
}

/// Opens protected documents and produces locked/unlocked copies through
/// the external encryption engine.
pub struct SecurityGateway {
    render: Arc<dyn RenderEngine>,
    security: Arc<dyn SecurityEngine>,
}

impl SecurityGateway {
    pub fn new(render: Arc<dyn RenderEngine>, security: Arc<dyn SecurityEngine>) -> Self {
        Self { render, security }
    }

    pub fn open(&self, path: &Path, password: Option<&str>) -> Result<DocumentHandle, ViewerError> {
        DocumentHandle::open(self.render.as_ref(), self.security.as_ref(), path, password)
    }

    /// Tries to open without a password first; on `PasswordRequired` asks
    /// the prompt collaborator once and retries. `Ok(None)` means the user
    /// cancelled; a second bad password surfaces as `IncorrectPassword`
    /// (callers decide whether to re-invoke).
    pub fn open_with_prompt(
        &self,
        path: &Path,
        prompt: &dyn PasswordPrompt,
    ) -> Result<Option<DocumentHandle>, ViewerError> {
        match self.open(path, None) {
            Ok(document) => Ok(Some(document)),
            Err(ViewerError::PasswordRequired) => {
                let Some(password) = prompt.request_password("Enter PDF password") else {
                    debug_log!("[security] password prompt cancelled for {}", path.display());
                    return Ok(None);
                };
                match self.open(path, Some(&password)) {
                    Ok(document) => Ok(Some(document)),
                    Err(ViewerError::PasswordRequired | ViewerError::IncorrectPassword) => {
                        Err(ViewerError::IncorrectPassword)
                    }
                    Err(err) => Err(err),
                }
            }
            Err(err) => Err(err),
        }
    }

    /// Writes a revision-6 encrypted copy of `src` at `dst`. The source is
    /// left untouched; a source that already needs a password is refused.
    pub fn lock(
        &self,
        src: &Path,
        dst: &Path,
        owner_password: &str,
        user_password: &str,
        permissions: Permissions,
    ) -> Result<PathBuf, ViewerError> {
        match self.render.open(OpenSource::from(src), None) {
            Ok(_) => {}
            Err(ViewerError::PasswordRequired) => {
                return Err(ViewerError::Lock(
                    "document is already password protected".to_string(),
                ));
            }
            Err(err) => return Err(ViewerError::Lock(err.to_string())),
        }

        let spec = EncryptionSpec::revision_6(owner_password, user_password, permissions);
        self.security.encrypt_to(src, dst, &spec)?;
        debug_log!("[security] locked {} -> {}", src.display(), dst.display());
        Ok(dst.to_path_buf())
    }

    /// Writes an unencrypted copy of `src` at `dst`.
    pub fn unlock(&self, src: &Path, password: &str, dst: &Path) -> Result<PathBuf, ViewerError> {
        self.security.decrypt_to(src, password, dst)?;
        debug_log!("[security] unlocked {} -> {}", src.display(), dst.display());
        Ok(dst.to_path_buf())
    }

    /// Unlocks into a fixed location in the system temp directory.
    pub fn unlock_to_temp(&self, src: &Path, password: &str) -> Result<PathBuf, ViewerError> {
        let dst = std::env::temp_dir().join("pdfdeck-unlocked.pdf");
        self.unlock(src, password, &dst)
    }
}

/*============================================================
  Synavera Project: Syn-Mac
  Module: synmac_core::credentials
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Hold the admin username/password needed by license and
    authorization prompts for exactly as long as a submission.

  Security / Safety Notes:
    The password is zeroized on drop, redacted in Debug, has no
    Display or Serialize impl, and is only ever exported as a
    zeroizing stdin payload.

  Dependencies:
    zeroize for memory wiping.

  Operational Scope:
    Created by the CLI, moved into the install driver, dropped
    right after the child process has consumed its stdin.

  Revision History:
    2026-10-16 COD  Added scoped credential holder.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Secrets never logged or echoed
    - Ownership transfer marks the end of a secret's lifetime
============================================================*/

use std::fmt;

use zeroize::Zeroizing;

/// Username plus write-only password.
pub struct Credentials {
    username: String,
    password: Zeroizing<String>,
}

impl Credentials {
    pub fn new<U: Into<String>, P: Into<String>>(username: U, password: P) -> Self {
        Self {
            username: username.into(),
            password: Zeroizing::new(password.into()),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Password line for `--stdinpass`; wiped when the payload drops.
    pub fn stdin_payload(&self) -> Zeroizing<Vec<u8>> {
        let mut payload = Zeroizing::new(Vec::with_capacity(self.password.len() + 1));
        payload.extend_from_slice(self.password.as_bytes());
        payload.push(b'\n');
        payload
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_redacts_password() {
        let creds = Credentials::new("admin", "correct horse");
        let rendered = format!("{creds:?}");
        assert!(rendered.contains("admin"));
        assert!(rendered.contains("<redacted>"));
        assert!(!rendered.contains("correct horse"));
    }

    #[test]
    fn stdin_payload_is_newline_terminated() {
        let creds = Credentials::new("admin", "pw");
        assert_eq!(creds.stdin_payload().as_slice(), b"pw\n");
    }
}

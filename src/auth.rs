use tracing::{info, warn};

/// Upstream credential, sanitized once at startup and shared read-only.
#[derive(Clone, Default)]
pub struct AuthContext {
    cookie: Option<String>,
}

impl AuthContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn from_cookie(raw: Option<&str>) -> Self {
        let cookie = raw.map(sanitize_credential).filter(|value| !value.is_empty());

        match cookie.as_deref() {
            None => {
                warn!("YOUTUBE_COOKIE is not set. Upstream requests will be unauthenticated.");
            }
            Some(value) if !looks_like_cookie_header(value) => {
                warn!(
                    "YOUTUBE_COOKIE does not look like `name=value; ...` pairs. It will be sent anyway."
                );
            }
            Some(value) => {
                info!(
                    "Upstream credential loaded ({} cookie pair(s)).",
                    value.split(';').filter(|pair| !pair.trim().is_empty()).count()
                );
            }
        }

        Self { cookie }
    }

    pub fn is_authenticated(&self) -> bool {
        self.cookie.is_some()
    }

    /// Extractor flags that attach the credential to every upstream request.
    pub fn extractor_args(&self) -> Vec<String> {
        match &self.cookie {
            Some(cookie) => vec!["--add-header".to_string(), format!("Cookie:{cookie}")],
            None => Vec::new(),
        }
    }
}

impl std::fmt::Debug for AuthContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthContext")
            .field("cookie", &self.cookie.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Keeps printable ASCII only; env files and copy-pasted browser cookies often
/// carry newlines, BOMs or zero-width characters.
pub fn sanitize_credential(raw: &str) -> String {
    raw.chars()
        .filter(|character| matches!(character, ' '..='~'))
        .collect::<String>()
        .trim()
        .to_string()
}

fn looks_like_cookie_header(value: &str) -> bool {
    value
        .split(';')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .all(|pair| pair.split_once('=').is_some_and(|(name, _)| !name.trim().is_empty()))
}

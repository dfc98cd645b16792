//! Browser-driven login that yields session cookies.

use std::fmt;

use tracing::{error, info};
#[cfg(feature = "browser")]
use tracing::warn;

use super::config::BrowserEngineConfig;
use crate::config::SelectorSet;
use crate::models::{Credentials, SessionCookies};

/// Steps of the login flow, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginStage {
    Navigate,
    FillForm,
    Submit,
    Verify,
    Extract,
}

impl fmt::Display for LoginStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Navigate => "navigate",
            Self::FillForm => "fill form",
            Self::Submit => "submit",
            Self::Verify => "verify",
            Self::Extract => "extract",
        };
        f.write_str(name)
    }
}

/// Why a login attempt stopped.
#[derive(Debug, thiserror::Error)]
#[error("login failed during {stage}: {reason}")]
struct AuthError {
    stage: LoginStage,
    reason: String,
}

impl AuthError {
    fn new(stage: LoginStage, reason: impl Into<String>) -> Self {
        Self {
            stage,
            reason: reason.into(),
        }
    }

    /// Adapter for `map_err` at a given stage.
    #[cfg(feature = "browser")]
    fn at<E: fmt::Display>(stage: LoginStage) -> impl FnOnce(E) -> Self {
        move |e| Self::new(stage, e.to_string())
    }
}

/// How the post-submit check concluded.
#[cfg(feature = "browser")]
#[derive(Debug, Clone, PartialEq, Eq)]
enum Verification {
    SuccessElement,
    SuccessUrl,
    /// Neither indicator appeared, but no error message either.
    NoErrorFound,
    ErrorMessage(String),
}

#[cfg(feature = "browser")]
impl Verification {
    fn into_result(self) -> Result<(), AuthError> {
        match self {
            Self::SuccessElement => {
                info!("Login verified by success element");
                Ok(())
            }
            Self::SuccessUrl => {
                info!("Login verified by success URL");
                Ok(())
            }
            Self::NoErrorFound => {
                // A slow success page also lands here
                warn!("No login success indicator found and no error shown; assuming logged in");
                Ok(())
            }
            Self::ErrorMessage(text) => Err(AuthError::new(
                LoginStage::Verify,
                format!("site reported login error: {}", text),
            )),
        }
    }
}

/// Logs in through a headless browser and extracts the session cookies.
#[derive(Debug, Clone, Default)]
pub struct SessionAuthenticator {
    config: BrowserEngineConfig,
}

impl SessionAuthenticator {
    pub fn new(config: BrowserEngineConfig) -> Self {
        Self { config }
    }

    /// Log in at `login_url`. Returns `None` on any failure; the cause is logged.
    pub async fn authenticate(
        &self,
        login_url: &str,
        credentials: &Credentials,
        selectors: &SelectorSet,
    ) -> Option<SessionCookies> {
        info!("Logging in at {} as {}", login_url, credentials.username);
        match self.run(login_url, credentials, selectors).await {
            Ok(cookies) => {
                info!("Login succeeded, captured {} cookies", cookies.len());
                Some(cookies)
            }
            Err(e) => {
                error!("{}", e);
                None
            }
        }
    }

    #[cfg(not(feature = "browser"))]
    async fn run(
        &self,
        _login_url: &str,
        _credentials: &Credentials,
        _selectors: &SelectorSet,
    ) -> Result<SessionCookies, AuthError> {
        Err(AuthError::new(
            LoginStage::Navigate,
            "browser support not compiled. Rebuild with: cargo build --features browser",
        ))
    }

    #[cfg(feature = "browser")]
    async fn run(
        &self,
        login_url: &str,
        credentials: &Credentials,
        selectors: &SelectorSet,
    ) -> Result<SessionCookies, AuthError> {
        let session = super::BrowserSession::launch(&self.config)
            .await
            .map_err(|e| AuthError::new(LoginStage::Navigate, format!("{:#}", e)))?;

        let result = self.login(&session, login_url, credentials, selectors).await;
        session.close().await;
        result
    }

    #[cfg(feature = "browser")]
    async fn login(
        &self,
        session: &super::BrowserSession,
        login_url: &str,
        credentials: &Credentials,
        selectors: &SelectorSet,
    ) -> Result<SessionCookies, AuthError> {
        use super::page;
        use LoginStage::*;

        let page_timeout = self.config.page_timeout();

        // NAVIGATE
        let tab = session.new_page().await.map_err(AuthError::at(Navigate))?;
        tab.goto(login_url).await.map_err(AuthError::at(Navigate))?;
        page::wait_for_idle(&tab, page_timeout).await;

        // FILL_FORM: both fields must exist before anything is typed
        let username = page::first_element(&tab, &selectors.username)
            .await
            .ok_or_else(|| {
                let reason = format!("username field '{}' not found", selectors.username);
                AuthError::new(FillForm, reason)
            })?;
        let password = page::first_element(&tab, &selectors.password)
            .await
            .ok_or_else(|| {
                let reason = format!("password field '{}' not found", selectors.password);
                AuthError::new(FillForm, reason)
            })?;

        username
            .click()
            .await
            .map_err(AuthError::at(FillForm))?
            .type_str(&credentials.username)
            .await
            .map_err(AuthError::at(FillForm))?;
        password
            .click()
            .await
            .map_err(AuthError::at(FillForm))?
            .type_str(&credentials.password)
            .await
            .map_err(AuthError::at(FillForm))?;

        // SUBMIT
        let submit = page::first_element(&tab, &selectors.submit)
            .await
            .ok_or_else(|| {
                AuthError::new(Submit, format!("submit control '{}' not found", selectors.submit))
            })?;
        submit.click().await.map_err(AuthError::at(Submit))?;

        // VERIFY
        self.verify(&tab, selectors).await.into_result()?;

        // EXTRACT
        // The tab itself is released by the session
        let cookies = tab.get_cookies().await.map_err(AuthError::at(Extract))?;
        Ok(super::cookies::from_browser(&cookies))
    }

    #[cfg(feature = "browser")]
    async fn verify(&self, tab: &chromiumoxide::Page, selectors: &SelectorSet) -> Verification {
        use super::page;
        use super::pattern::UrlPattern;

        let wait = self.config.selector_wait();

        if page::wait_for_element(tab, &selectors.login_success, wait)
            .await
            .is_some()
        {
            return Verification::SuccessElement;
        }

        if let Some(pattern) = selectors.success_url_pattern.as_deref() {
            match UrlPattern::new(pattern) {
                Ok(pattern) => {
                    if page::wait_for_url(tab, &pattern, wait).await {
                        return Verification::SuccessUrl;
                    }
                }
                Err(e) => warn!("Ignoring invalid success URL pattern '{}': {}", pattern, e),
            }
        }

        page::wait_for_idle(tab, self.config.page_timeout()).await;
        match page::first_text(tab, &selectors.error_selectors).await {
            Some((selector, text)) => {
                warn!("Login error element '{}' present", selector);
                Verification::ErrorMessage(text)
            }
            None => Verification::NoErrorFound,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(feature = "browser")]
    #[test]
    fn test_verification_outcomes() {
        assert!(Verification::SuccessElement.into_result().is_ok());
        assert!(Verification::SuccessUrl.into_result().is_ok());
        assert!(Verification::NoErrorFound.into_result().is_ok());

        let err = Verification::ErrorMessage("Invalid password".into())
            .into_result()
            .unwrap_err();
        assert_eq!(err.stage, LoginStage::Verify);
        assert!(err.to_string().contains("Invalid password"));
    }

    #[test]
    fn test_auth_error_names_stage() {
        let err = AuthError::new(LoginStage::FillForm, "username field '#user' not found");
        assert_eq!(
            err.to_string(),
            "login failed during fill form: username field '#user' not found"
        );
    }

    #[cfg(not(feature = "browser"))]
    #[tokio::test]
    async fn test_without_browser_support_returns_none() {
        let auth = SessionAuthenticator::default();
        let cookies = auth
            .authenticate(
                "https://paper.example.com/login",
                &Credentials::new("reader", "secret"),
                &SelectorSet::default(),
            )
            .await;
        assert!(cookies.is_none());
    }
}

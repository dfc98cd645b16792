//! Conversion between browser cookies and session cookies.

use chromiumoxide::cdp::browser_protocol::network::{Cookie, CookieParam, TimeSinceEpoch};

use crate::models::{SessionCookie, SessionCookies};

/// Convert cookies read from the browser into session cookies.
pub fn from_browser(cookies: &[Cookie]) -> SessionCookies {
    cookies
        .iter()
        .map(|c| SessionCookie {
            name: c.name.clone(),
            value: c.value.clone(),
            domain: c.domain.clone(),
            path: c.path.clone(),
            secure: Some(c.secure),
            http_only: Some(c.http_only),
            // Session cookies report -1
            expires: (c.expires > 0.0).then_some(c.expires),
        })
        .collect()
}

/// Build cookie parameters for injection into a page.
///
/// Cookies without a domain are scoped to `url`.
pub fn to_params(cookies: &SessionCookies, url: &str) -> Vec<CookieParam> {
    cookies
        .iter()
        .map(|cookie| {
            let mut param = CookieParam::new(cookie.name.clone(), cookie.value.clone());
            if cookie.domain.is_empty() {
                param.url = Some(url.to_string());
            } else {
                param.domain = Some(cookie.domain.clone());
            }
            if !cookie.path.is_empty() {
                param.path = Some(cookie.path.clone());
            }
            param.secure = cookie.secure;
            param.http_only = cookie.http_only;
            param.expires = cookie.expires.map(TimeSinceEpoch::new);
            param
        })
        .collect()
}

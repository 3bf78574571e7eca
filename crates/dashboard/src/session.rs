//! Authentication context and shop identity changes.

use serde::Deserialize;
use storesight_core::{ErrorKind, ShopDomain};

use crate::api::{ApiError, SESSION_PATH, Transport};

/// Who the dashboard is acting for.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AuthContext {
    /// Whether the session is valid.
    pub authenticated: bool,
    /// The shop the session belongs to.
    pub shop: Option<ShopDomain>,
    /// Whether the session is still being resolved.
    pub auth_loading: bool,
}

impl AuthContext {
    /// No session.
    #[must_use]
    pub const fn signed_out() -> Self {
        Self {
            authenticated: false,
            shop: None,
            auth_loading: false,
        }
    }

    /// Session resolution in progress.
    #[must_use]
    pub const fn loading() -> Self {
        Self {
            authenticated: false,
            shop: None,
            auth_loading: true,
        }
    }

    /// A valid session for `shop`.
    #[must_use]
    pub const fn signed_in(shop: ShopDomain) -> Self {
        Self {
            authenticated: true,
            shop: Some(shop),
            auth_loading: false,
        }
    }

    /// The shop to fetch for, if the session is settled and valid.
    #[must_use]
    pub fn ready_shop(&self) -> Option<&ShopDomain> {
        if self.authenticated && !self.auth_loading {
            self.shop.as_ref()
        } else {
            None
        }
    }

    /// The same shop with the session revoked.
    ///
    /// The shop is kept so signing back into it does not look like a switch.
    #[must_use]
    pub fn revoked(&self) -> Self {
        Self {
            authenticated: false,
            shop: self.shop.clone(),
            auth_loading: false,
        }
    }
}

/// How the bound shop moved between two contexts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShopChange {
    /// Same shop, or still no shop.
    Unchanged,
    /// First shop after none.
    Bound(ShopDomain),
    /// One shop replaced by a different one.
    Switched { from: ShopDomain, to: ShopDomain },
    /// The shop went away.
    Cleared(ShopDomain),
}

/// Compare the shop of two contexts.
#[must_use]
pub fn shop_change(previous: &AuthContext, next: &AuthContext) -> ShopChange {
    match (&previous.shop, &next.shop) {
        (Some(from), Some(to)) if from != to => ShopChange::Switched {
            from: from.clone(),
            to: to.clone(),
        },
        (None, Some(to)) => ShopChange::Bound(to.clone()),
        (Some(from), None) => ShopChange::Cleared(from.clone()),
        _ => ShopChange::Unchanged,
    }
}

#[derive(Debug, Deserialize)]
struct SessionResponse {
    #[serde(default)]
    authenticated: Option<bool>,
    #[serde(default)]
    shop: Option<String>,
}

/// Resolve the current session from the backend.
///
/// # Errors
///
/// Returns error for failures other than an expired session, and when the
/// backend names a shop that is not a valid domain.
pub async fn resolve_session<T: Transport>(transport: &T) -> Result<AuthContext, ApiError> {
    let value = match transport.get_json(SESSION_PATH, &[]).await {
        Ok(value) => value,
        Err(error) if error.kind == ErrorKind::AuthRequired => {
            tracing::info!("no active session");
            return Ok(AuthContext::signed_out());
        }
        Err(error) => return Err(error),
    };

    let response: SessionResponse =
        serde_json::from_value(value).map_err(|e| ApiError::decode(SESSION_PATH, &e))?;

    let shop = response
        .shop
        .as_deref()
        .filter(|shop| !shop.trim().is_empty())
        .map(ShopDomain::parse)
        .transpose()
        .map_err(|e| ApiError::new(ErrorKind::Unknown, format!("Invalid shop in session: {e}")))?;

    let authenticated = response.authenticated.unwrap_or(shop.is_some()) && shop.is_some();
    Ok(AuthContext {
        authenticated,
        shop,
        auth_loading: false,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn shop(domain: &str) -> ShopDomain {
        ShopDomain::parse(domain).unwrap()
    }

    #[test]
    fn test_ready_shop_requires_settled_session() {
        assert!(AuthContext::loading().ready_shop().is_none());
        assert!(AuthContext::signed_out().ready_shop().is_none());

        let ctx = AuthContext::signed_in(shop("acme.myshopify.com"));
        assert_eq!(ctx.ready_shop(), Some(&shop("acme.myshopify.com")));
        assert!(ctx.revoked().ready_shop().is_none());
        assert_eq!(ctx.revoked().shop, ctx.shop);
    }

    #[test]
    fn test_shop_change() {
        let a = AuthContext::signed_in(shop("a.myshopify.com"));
        let b = AuthContext::signed_in(shop("b.myshopify.com"));

        assert_eq!(
            shop_change(&a, &b),
            ShopChange::Switched {
                from: shop("a.myshopify.com"),
                to: shop("b.myshopify.com"),
            }
        );
        assert_eq!(shop_change(&a, &a.revoked()), ShopChange::Unchanged);
        assert_eq!(
            shop_change(&AuthContext::loading(), &a),
            ShopChange::Bound(shop("a.myshopify.com"))
        );
        assert_eq!(
            shop_change(&a, &AuthContext::signed_out()),
            ShopChange::Cleared(shop("a.myshopify.com"))
        );
    }
}

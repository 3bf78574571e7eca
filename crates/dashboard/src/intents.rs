//! One-shot page intents carried in the dashboard URL.
//!
//! The embedding app redirects back to the dashboard with flags such as
//! `?connected=true` after OAuth. They are read once and stripped so a
//! reload does not replay them.

use std::collections::BTreeSet;

use tracing::{info, warn};
use url::Url;

use crate::api::Transport;
use crate::dashboard::{Dashboard, LoadOptions};
use crate::notice::Notice;
use crate::refresh::{RefreshReport, RefreshTrigger};

/// A recognised URL flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PageIntent {
    Connected,
    SkipLoading,
    Reauth,
    ForceRefresh,
    ClearCache,
}

impl PageIntent {
    pub const ALL: [Self; 5] = [
        Self::Connected,
        Self::SkipLoading,
        Self::Reauth,
        Self::ForceRefresh,
        Self::ClearCache,
    ];

    /// The query parameter name.
    #[must_use]
    pub const fn param(self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::SkipLoading => "skip_loading",
            Self::Reauth => "reauth",
            Self::ForceRefresh => "force_refresh",
            Self::ClearCache => "clear_cache",
        }
    }

    #[must_use]
    pub fn from_param(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|intent| intent.param() == name)
    }
}

impl std::fmt::Display for PageIntent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.param())
    }
}

/// The set of intents found in a URL.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PageIntents(BTreeSet<PageIntent>);

impl PageIntents {
    #[must_use]
    pub fn contains(&self, intent: PageIntent) -> bool {
        self.0.contains(&intent)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = PageIntent> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<PageIntent> for PageIntents {
    fn from_iter<I: IntoIterator<Item = PageIntent>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// `false`, `0` and `no` switch a flag off; anything else, including an
/// empty value, switches it on.
fn is_enabled(value: &str) -> bool {
    !matches!(value.to_ascii_lowercase().as_str(), "false" | "0" | "no")
}

/// Split `url` into its intents and the URL with those parameters removed.
///
/// Unrelated parameters keep their order. Disabled flags are stripped too.
#[must_use]
pub fn parse_intents(url: &Url) -> (PageIntents, Url) {
    let mut intents = BTreeSet::new();
    let mut kept = Vec::new();

    for (name, value) in url.query_pairs() {
        match PageIntent::from_param(&name) {
            Some(intent) if is_enabled(&value) => {
                intents.insert(intent);
            }
            Some(_) => {}
            None => kept.push((name.into_owned(), value.into_owned())),
        }
    }

    let mut cleaned = url.clone();
    if kept.is_empty() {
        cleaned.set_query(None);
    } else {
        cleaned.query_pairs_mut().clear().extend_pairs(kept.iter());
    }

    (PageIntents(intents), cleaned)
}

/// Result of opening the dashboard at a URL.
#[derive(Debug, Clone, PartialEq)]
pub struct Opened {
    /// The URL with intent parameters removed.
    pub url: Url,
    pub intents: PageIntents,
    pub report: RefreshReport,
}

impl<T: Transport> Dashboard<T> {
    /// Act on one-shot intents.
    ///
    /// Returns the refresh report when `force_refresh` ran a refresh.
    pub async fn apply_intents(&self, intents: &PageIntents) -> Option<RefreshReport> {
        if intents.contains(PageIntent::Connected) {
            self.notify(Notice::StoreConnected);
        }
        if intents.contains(PageIntent::Reauth) {
            self.notify(Notice::Reauthenticated);
        }
        if intents.contains(PageIntent::ClearCache)
            && let Err(e) = self.clear_cache()
        {
            warn!(error = %e, "failed to clear cache");
        }

        if !intents.contains(PageIntent::ForceRefresh) {
            return None;
        }

        match self.run_refresh(RefreshTrigger::Intent).await {
            Ok(report) => {
                self.ensure_rate_limit_polling();
                Some(report)
            }
            Err(rejected) => {
                info!(reason = %rejected, "forced refresh skipped");
                None
            }
        }
    }

    /// Open the dashboard at `url`: apply its intents, then load every
    /// metric.
    pub async fn open(&self, url: &Url) -> Opened {
        let (intents, cleaned) = parse_intents(url);
        if !intents.is_empty() {
            info!(intents = ?intents.iter().map(PageIntent::param).collect::<Vec<_>>(), "applying page intents");
        }

        let report = match self.apply_intents(&intents).await {
            Some(report) => report,
            None => {
                self.load(LoadOptions {
                    skip_loading: intents.contains(PageIntent::SkipLoading),
                })
                .await
            }
        };

        Opened {
            url: cleaned,
            intents,
            report,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_strips_intents() {
        let url = Url::parse(
            "https://app.storesight.app/dashboard?shop=acme.myshopify.com&connected=true&force_refresh=1",
        )
        .unwrap();

        let (intents, cleaned) = parse_intents(&url);

        assert!(intents.contains(PageIntent::Connected));
        assert!(intents.contains(PageIntent::ForceRefresh));
        assert!(!intents.contains(PageIntent::ClearCache));
        assert_eq!(
            cleaned.as_str(),
            "https://app.storesight.app/dashboard?shop=acme.myshopify.com"
        );
    }

    #[test]
    fn test_parse_drops_empty_query() {
        let url = Url::parse("https://app.storesight.app/dashboard?skip_loading=&reauth=false").unwrap();

        let (intents, cleaned) = parse_intents(&url);

        assert_eq!(intents.iter().collect::<Vec<_>>(), vec![PageIntent::SkipLoading]);
        assert_eq!(cleaned.as_str(), "https://app.storesight.app/dashboard");
    }

    #[test]
    fn test_param_names_round_trip() {
        for intent in PageIntent::ALL {
            assert_eq!(PageIntent::from_param(intent.param()), Some(intent));
        }
        assert_eq!(PageIntent::from_param("shop"), None);
    }
}

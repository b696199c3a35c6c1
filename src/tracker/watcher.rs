use url::Url;

/// Detects URL changes regardless of how the host feeds them in.
///
/// The host either calls `observe` from its own navigation hook, or runs
/// the tracker's poll driver which calls it on an interval; the rest of the
/// tracker only ever sees the single change notification.
#[derive(Debug, Default)]
pub struct NavigationWatcher {
    current: Option<Url>,
}

impl NavigationWatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the URL when it differs from the last observed one, which is
    /// what makes repeated polling of an unchanged page a no-op.
    pub fn observe(&mut self, url: &Url) -> Option<Url> {
        if self.current.as_ref() == Some(url) {
            return None;
        }
        self.current = Some(url.clone());
        self.current.clone()
    }

    pub fn current(&self) -> Option<&Url> {
        self.current.as_ref()
    }
}

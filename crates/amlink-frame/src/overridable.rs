/// A value that falls back to a context-supplied default until it is set.
///
/// Once [`set`](Self::set), the override is sticky: later reads never see the
/// default again, even if the explicit value equals it. The default itself is
/// kept so packets built from this one inherit it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Overridable<T> {
    default: T,
    explicit: Option<T>,
}

impl<T: Copy> Overridable<T> {
    /// Unset value resolving to `default`.
    pub const fn new(default: T) -> Self {
        Self {
            default,
            explicit: None,
        }
    }

    /// Effective value.
    pub fn get(&self) -> T {
        self.explicit.unwrap_or(self.default)
    }

    /// Override the default.
    pub fn set(&mut self, value: T) {
        self.explicit = Some(value);
    }

    /// Whether an explicit value was stored.
    pub fn is_set(&self) -> bool {
        self.explicit.is_some()
    }

    /// The fallback, regardless of any override.
    pub fn default_value(&self) -> T {
        self.default
    }

    /// The explicit value, if any.
    pub fn explicit(&self) -> Option<T> {
        self.explicit
    }
}

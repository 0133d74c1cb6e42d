//! Supported locales and the fallback chain used by every content read.
//!
//! Content is authored in English first; every other locale may be partial.
//! Reads therefore walk a short, fixed chain of locales and stop at the first
//! one that resolves. The chain is static: there is no negotiation and no
//! region sniffing.
//!
//! # Examples
//! ```
//! use compass_core::{Locale, fallback_chain};
//!
//! let chain = fallback_chain(Locale::Ar);
//! assert_eq!(chain.as_slice(), &[Locale::Ar, Locale::Fr, Locale::En]);
//! ```

wire_enum! {
    /// A locale the guide ships content and interface strings for.
    pub enum Locale: "locale" {
        /// English. Every content record is guaranteed to exist in English.
        En => "en",
        /// French.
        Fr => "fr",
        /// Spanish.
        Es => "es",
        /// German.
        De => "de",
        /// Italian.
        It => "it",
        /// Dutch.
        Nl => "nl",
        /// Arabic, rendered right-to-left.
        Ar => "ar",
    }
}

/// Locale used when the user has not chosen one.
pub const DEFAULT_LOCALE: Locale = Locale::En;

/// Locale that terminates every fallback chain.
pub const FALLBACK_LOCALE: Locale = Locale::En;

const ENGLISH_ONLY: &[Locale] = &[Locale::En];
const FRENCH_CHAIN: &[Locale] = &[Locale::Fr, Locale::En];
const SPANISH_CHAIN: &[Locale] = &[Locale::Es, Locale::En];
const GERMAN_CHAIN: &[Locale] = &[Locale::De, Locale::En];
const ITALIAN_CHAIN: &[Locale] = &[Locale::It, Locale::En];
const DUTCH_CHAIN: &[Locale] = &[Locale::Nl, Locale::En];
// Arabic readers in Marrakech commonly read French as well.
const ARABIC_CHAIN: &[Locale] = &[Locale::Ar, Locale::Fr, Locale::En];

impl Locale {
    /// Parse a persisted or user-supplied locale tag.
    ///
    /// # Errors
    /// Returns [`UnknownVariant`](crate::UnknownVariant) when `code` is not one
    /// of the supported tags.
    pub fn parse(code: &str) -> Result<Self, crate::UnknownVariant> {
        code.parse()
    }

    /// Whether the locale is written right-to-left.
    #[must_use]
    pub const fn is_rtl(self) -> bool {
        matches!(self, Self::Ar)
    }

    /// Ordered locales to try when resolving content for `self`.
    #[must_use]
    pub const fn fallback_chain(self) -> LocaleChain {
        let locales = match self {
            Self::En => ENGLISH_ONLY,
            Self::Fr => FRENCH_CHAIN,
            Self::Es => SPANISH_CHAIN,
            Self::De => GERMAN_CHAIN,
            Self::It => ITALIAN_CHAIN,
            Self::Nl => DUTCH_CHAIN,
            Self::Ar => ARABIC_CHAIN,
        };
        LocaleChain(locales)
    }
}

impl Default for Locale {
    fn default() -> Self {
        DEFAULT_LOCALE
    }
}

/// Ordered sequence of one to three locales ending in English.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocaleChain(&'static [Locale]);

impl LocaleChain {
    /// The chain as a slice, most preferred locale first.
    #[must_use]
    pub const fn as_slice(self) -> &'static [Locale] {
        self.0
    }

    /// Number of locales in the chain.
    #[must_use]
    pub const fn len(self) -> usize {
        self.0.len()
    }

    /// Chains are never empty; provided for API symmetry with slices.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over the chain in resolution order.
    pub fn iter(self) -> impl Iterator<Item = Locale> {
        self.0.iter().copied()
    }
}

impl IntoIterator for LocaleChain {
    type Item = Locale;
    type IntoIter = std::iter::Copied<std::slice::Iter<'static, Locale>>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter().copied()
    }
}

/// Ordered fallback chain for `locale`.
///
/// `ar` resolves through French before English; every other non-English
/// locale falls straight back to English; English stands alone.
#[must_use]
pub const fn fallback_chain(locale: Locale) -> LocaleChain {
    locale.fallback_chain()
}

/// Whether `code` is one of the seven supported locale tags.
///
/// Use this to guard values read from settings storage before they reach the
/// resolver.
///
/// # Examples
/// ```
/// use compass_core::is_valid_locale;
///
/// assert!(is_valid_locale("en"));
/// assert!(!is_valid_locale("pt"));
/// assert!(!is_valid_locale(""));
/// ```
#[must_use]
pub fn is_valid_locale(code: &str) -> bool {
    Locale::parse(code).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    #[rstest]
    #[case(Locale::Ar, &[Locale::Ar, Locale::Fr, Locale::En])]
    #[case(Locale::Fr, &[Locale::Fr, Locale::En])]
    #[case(Locale::De, &[Locale::De, Locale::En])]
    #[case(Locale::Nl, &[Locale::Nl, Locale::En])]
    #[case(Locale::En, &[Locale::En])]
    fn chain_matches_table(#[case] locale: Locale, #[case] expected: &[Locale]) {
        assert_eq!(fallback_chain(locale).as_slice(), expected);
    }

    #[rstest]
    #[case("en", true)]
    #[case("ar", true)]
    #[case("nl", true)]
    #[case("pt", false)]
    #[case("EN", false)]
    #[case("en-GB", false)]
    #[case("", false)]
    fn validates_locale_tags(#[case] code: &str, #[case] valid: bool) {
        assert_eq!(is_valid_locale(code), valid);
    }

    #[rstest]
    fn only_arabic_is_rtl() {
        let rtl: Vec<_> = Locale::ALL.iter().filter(|l| l.is_rtl()).collect();
        assert_eq!(rtl, vec![&Locale::Ar]);
    }

    #[rstest]
    fn parse_reports_the_rejected_tag() {
        let err = Locale::parse("pt").expect_err("pt is unsupported");
        assert_eq!(err.to_string(), "unknown locale 'pt'");
    }

    fn any_locale() -> impl Strategy<Value = Locale> {
        prop::sample::select(Locale::ALL.to_vec())
    }

    proptest! {
        #[test]
        fn chain_starts_with_requested_and_ends_in_english(locale in any_locale()) {
            let chain = fallback_chain(locale);
            prop_assert!(!chain.is_empty());
            prop_assert!(chain.len() <= 3);
            prop_assert_eq!(chain.as_slice().first(), Some(&locale));
            prop_assert_eq!(chain.as_slice().last(), Some(&FALLBACK_LOCALE));
        }

        #[test]
        fn chain_has_no_repeats(locale in any_locale()) {
            let chain = fallback_chain(locale);
            let mut seen: Vec<Locale> = chain.iter().collect();
            seen.sort_unstable();
            seen.dedup();
            prop_assert_eq!(seen.len(), chain.len());
        }

        #[test]
        fn parse_round_trips_wire_text(locale in any_locale()) {
            prop_assert_eq!(Locale::parse(locale.as_str()), Ok(locale));
        }
    }
}

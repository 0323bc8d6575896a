/// The calendar system a zone projects its civil fields onto.
///
/// Calendar math itself is delegated to the calendar engine; this type only
/// selects which system the engine should use. The engine's native system,
/// and the fallback for zones without a registered [`crate::ZoneMap`], is
/// Gregorian.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum CalendarKind {
    #[default]
    Gregorian,
    /// The Persian (Solar Hijri) calendar, as used by e.g. `Asia/Tehran`.
    Persian,
}

impl CalendarKind {
    /// The BCP-47 calendar identifier, as used in locale `ca` extensions.
    pub fn bcp47(self) -> &'static str {
        match self {
            CalendarKind::Gregorian => "gregory",
            CalendarKind::Persian => "persian",
        }
    }
}

impl core::fmt::Display for CalendarKind {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.write_str(self.bcp47())
    }
}

/// A day of the week.
///
/// The discriminants use Sunday-zero numbering, which is what the per-zone
/// configuration surface ([`crate::ZoneMap`]) speaks. Conversions to the
/// engines' weekday types are provided internally.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[repr(u8)]
pub enum Weekday {
    Sunday = 0,
    Monday = 1,
    Tuesday = 2,
    Wednesday = 3,
    Thursday = 4,
    Friday = 5,
    Saturday = 6,
}

/// All weekdays in Sunday-first order.
const SUNDAY_FIRST: [Weekday; 7] = [
    Weekday::Sunday,
    Weekday::Monday,
    Weekday::Tuesday,
    Weekday::Wednesday,
    Weekday::Thursday,
    Weekday::Friday,
    Weekday::Saturday,
];

impl Weekday {
    /// This weekday's offset from Sunday, in `0..=6`.
    pub fn to_sunday_zero_offset(self) -> u8 {
        self as u8
    }

    /// The number of days from `other` forward to `self`, in `0..=6`.
    ///
    /// For example, Friday is 6 days since Saturday.
    pub fn since(self, other: Weekday) -> u8 {
        (7 + self.to_sunday_zero_offset() - other.to_sunday_zero_offset()) % 7
    }

    /// The seven weekdays rotated so that index 0 is `first`.
    ///
    /// This is the only weekday arithmetic this crate performs itself: a
    /// pure index rotation, driven by per-zone data rather than calendar
    /// subclassing.
    pub fn ordering_from(first: Weekday) -> [Weekday; 7] {
        let mut ordered = SUNDAY_FIRST;
        let shift = usize::from(first.to_sunday_zero_offset());
        for (i, slot) in ordered.iter_mut().enumerate() {
            *slot = SUNDAY_FIRST[(i + shift) % 7];
        }
        ordered
    }

    pub(crate) fn from_jiff(weekday: jiff::civil::Weekday) -> Weekday {
        // Sunday-zero offsets are in 0..=6, so the lookup cannot miss.
        SUNDAY_FIRST[usize::from(weekday.to_sunday_zero_offset() as u8)]
    }

    pub(crate) fn from_icu(
        weekday: icu_calendar::types::IsoWeekday,
    ) -> Weekday {
        use icu_calendar::types::IsoWeekday;

        match weekday {
            IsoWeekday::Sunday => Weekday::Sunday,
            IsoWeekday::Monday => Weekday::Monday,
            IsoWeekday::Tuesday => Weekday::Tuesday,
            IsoWeekday::Wednesday => Weekday::Wednesday,
            IsoWeekday::Thursday => Weekday::Thursday,
            IsoWeekday::Friday => Weekday::Friday,
            IsoWeekday::Saturday => Weekday::Saturday,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Weekday::Sunday => "Sunday",
            Weekday::Monday => "Monday",
            Weekday::Tuesday => "Tuesday",
            Weekday::Wednesday => "Wednesday",
            Weekday::Thursday => "Thursday",
            Weekday::Friday => "Friday",
            Weekday::Saturday => "Saturday",
        }
    }
}

impl core::fmt::Display for Weekday {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

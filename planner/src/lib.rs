//! Planner page interpretation library.
//!
//! Turns the unordered text blocks an OCR service returns for a photographed
//! paper planner page into weekday sections carrying dated, timed events and
//! todo items. The pipeline stays pure after the OCR call: QR template decode,
//! section mapping, event/todo extraction, confidence scoring.

mod lex {
    //! Small `nom` helpers shared by the time, QR and header parsers.

    use nom::{
        IResult,
        branch::alt,
        bytes::complete::{tag_no_case, take_while},
        combinator::value,
        error::{VerboseError, VerboseErrorKind},
    };

    use crate::core::Meridian;

    pub(crate) type PResult<'a, T> = IResult<&'a str, T, VerboseError<&'a str>>;

    /// Consume a run of `cond` chars and fail unless its length is within `m..=n`.
    pub(crate) fn take_while_m_n<F>(m: usize, n: usize, cond: F) -> impl Fn(&str) -> PResult<'_, &str>
    where
        F: Fn(char) -> bool + Copy,
    {
        move |i: &str| {
            let (i, out) = take_while(cond)(i)?;
            if out.len() < m || out.len() > n {
                Err(nom::Err::Error(VerboseError {
                    errors: vec![(i, VerboseErrorKind::Context("m_n"))],
                }))
            } else {
                Ok((i, out))
            }
        }
    }

    pub(crate) fn char_is_digit(c: char) -> bool {
        c.is_ascii_digit()
    }

    pub(crate) fn meridian(i: &str) -> PResult<'_, Meridian> {
        alt((
            value(Meridian::Am, tag_no_case("am")),
            value(Meridian::Pm, tag_no_case("pm")),
        ))(i)
    }
}

pub mod core {
    use chrono::{DateTime, Datelike, Days, NaiveDate, NaiveTime, Timelike, Utc, Weekday};
    use serde::{Deserialize, Serialize};
    use serde_with::{DisplayFromStr, serde_as};
    use std::{cmp::Ordering, fmt, str::FromStr};
    use uuid::Uuid;

    /// Confidence assumed for an OCR block that reports none.
    pub const DEFAULT_BLOCK_CONFIDENCE: f64 = 0.8;

    /* ------------------------------- IDs ------------------------------- */

    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct EventId(pub Uuid);

    impl EventId {
        pub fn new() -> Self {
            Self(Uuid::new_v4())
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct TodoId(pub Uuid);

    impl TodoId {
        pub fn new() -> Self {
            Self(Uuid::new_v4())
        }
    }

    /* ------------------------------ OCR input ------------------------------ */

    /// Axis-aligned box in the OCR service's coordinate space (pixels or normalized).
    ///
    /// Accepts either `width`/`height` or `right`/`bottom` on input; always
    /// serializes as `top`/`left`/`width`/`height`.
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    #[serde(try_from = "RawBounding")]
    pub struct BoundingBox {
        pub top: f64,
        pub left: f64,
        pub width: f64,
        pub height: f64,
    }

    impl BoundingBox {
        pub fn new(top: f64, left: f64, width: f64, height: f64) -> Self {
            Self {
                top,
                left,
                width,
                height,
            }
        }

        pub fn right(&self) -> f64 {
            self.left + self.width
        }

        pub fn bottom(&self) -> f64 {
            self.top + self.height
        }

        pub fn center_x(&self) -> f64 {
            self.left + self.width / 2.0
        }
    }

    #[derive(Debug, Deserialize)]
    struct RawBounding {
        top: f64,
        left: f64,
        width: Option<f64>,
        height: Option<f64>,
        right: Option<f64>,
        bottom: Option<f64>,
    }

    impl TryFrom<RawBounding> for BoundingBox {
        type Error = String;

        fn try_from(raw: RawBounding) -> Result<Self, Self::Error> {
            let width = raw
                .width
                .or(raw.right.map(|r| r - raw.left))
                .ok_or("bounding box needs `width` or `right`")?;
            let height = raw
                .height
                .or(raw.bottom.map(|b| b - raw.top))
                .ok_or("bounding box needs `height` or `bottom`")?;
            Ok(Self::new(raw.top, raw.left, width, height))
        }
    }

    /// One OCR-recognized text fragment. Produced once per page and only read afterwards.
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct TextBlock {
        pub text: String,
        #[serde(default = "TextBlock::default_confidence")]
        pub confidence: f64,
        pub bounding: BoundingBox,
    }

    impl TextBlock {
        pub fn new(text: impl Into<String>, bounding: BoundingBox) -> Self {
            Self {
                text: text.into(),
                confidence: DEFAULT_BLOCK_CONFIDENCE,
                bounding,
            }
        }

        pub fn with_confidence(mut self, confidence: f64) -> Self {
            self.confidence = confidence;
            self
        }

        pub fn top(&self) -> f64 {
            self.bounding.top
        }

        fn default_confidence() -> f64 {
            DEFAULT_BLOCK_CONFIDENCE
        }
    }

    /// Page extents used to normalize block positions.
    #[derive(Debug, Clone, Copy, PartialEq)]
    pub struct PageGeometry {
        pub width: f64,
        pub height: f64,
    }

    impl PageGeometry {
        /// Use the configured extents where given, else the furthest block edge.
        pub fn resolve(blocks: &[TextBlock], width: Option<f64>, height: Option<f64>) -> Self {
            let max_right = blocks
                .iter()
                .map(|b| b.bounding.right())
                .fold(0.0_f64, f64::max);
            let max_bottom = blocks
                .iter()
                .map(|b| b.bounding.bottom())
                .fold(0.0_f64, f64::max);
            let positive = |v: f64| if v > 0.0 { v } else { 1.0 };
            Self {
                width: positive(width.unwrap_or(max_right)),
                height: positive(height.unwrap_or(max_bottom)),
            }
        }
    }

    /* ------------------------------ Clock times ------------------------------ */

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(rename_all = "lowercase")]
    pub enum Meridian {
        Am,
        Pm,
    }

    impl Meridian {
        pub fn as_str(self) -> &'static str {
            match self {
                Meridian::Am => "am",
                Meridian::Pm => "pm",
            }
        }
    }

    impl fmt::Display for Meridian {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(self.as_str())
        }
    }

    /// A 12-hour wall-clock time. Displays in the canonical `H:MMam` / `H:MMpm` form.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ClockTime {
        hour: u8,
        minute: u8,
        meridian: Meridian,
    }

    impl ClockTime {
        /// `hour` must be 1..=12 and `minute` 0..=59.
        pub fn new(hour: u8, minute: u8, meridian: Meridian) -> Option<Self> {
            if (1..=12).contains(&hour) && minute <= 59 {
                Some(Self {
                    hour,
                    minute,
                    meridian,
                })
            } else {
                None
            }
        }

        pub fn hour(&self) -> u8 {
            self.hour
        }

        pub fn minute(&self) -> u8 {
            self.minute
        }

        pub fn meridian(&self) -> Meridian {
            self.meridian
        }

        /// 0..=23; 12am is 0 and 12pm is 12.
        pub fn hour24(&self) -> u32 {
            let h = u32::from(self.hour);
            match (self.meridian, h) {
                (Meridian::Am, 12) => 0,
                (Meridian::Am, h) => h,
                (Meridian::Pm, 12) => 12,
                (Meridian::Pm, h) => h + 12,
            }
        }

        pub fn minutes_of_day(&self) -> u32 {
            self.hour24() * 60 + u32::from(self.minute)
        }

        pub fn to_naive_time(&self) -> NaiveTime {
            NaiveTime::from_hms_opt(self.hour24(), u32::from(self.minute), 0)
                .unwrap_or(NaiveTime::MIN)
        }

        pub fn from_naive_time(time: NaiveTime) -> Self {
            let h24 = time.hour();
            let meridian = if h24 >= 12 { Meridian::Pm } else { Meridian::Am };
            let hour = match h24 % 12 {
                0 => 12,
                h => h,
            };
            Self {
                hour: hour as u8,
                minute: time.minute() as u8,
                meridian,
            }
        }
    }

    impl Ord for ClockTime {
        fn cmp(&self, other: &Self) -> Ordering {
            self.minutes_of_day().cmp(&other.minutes_of_day())
        }
    }

    impl PartialOrd for ClockTime {
        fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
            Some(self.cmp(other))
        }
    }

    impl fmt::Display for ClockTime {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{}:{:02}{}", self.hour, self.minute, self.meridian)
        }
    }

    #[derive(Debug, thiserror::Error)]
    #[error("`{0}` is not a canonical H:MMam/H:MMpm time")]
    pub struct ClockTimeParseError(pub String);

    impl FromStr for ClockTime {
        type Err = ClockTimeParseError;

        /// Strict parse of the canonical form only; OCR repair lives in [`crate::time`].
        fn from_str(s: &str) -> Result<Self, Self::Err> {
            let err = || ClockTimeParseError(s.to_string());
            let (clock, meridian) = match (s.strip_suffix("am"), s.strip_suffix("pm")) {
                (Some(c), _) => (c, Meridian::Am),
                (_, Some(c)) => (c, Meridian::Pm),
                _ => return Err(err()),
            };
            let (h, m) = clock.split_once(':').ok_or_else(err)?;
            if h.is_empty() || h.len() > 2 || h.starts_with('0') || m.len() != 2 {
                return Err(err());
            }
            let hour = h.parse::<u8>().map_err(|_| err())?;
            let minute = m.parse::<u8>().map_err(|_| err())?;
            ClockTime::new(hour, minute, meridian).ok_or_else(err)
        }
    }

    /// When an event happens: a single time or a start/end range, never both.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(try_from = "EventTimeFields", into = "EventTimeFields")]
    pub enum EventTime {
        At(ClockTime),
        Range { start: ClockTime, end: ClockTime },
    }

    impl EventTime {
        pub fn start(&self) -> ClockTime {
            match self {
                EventTime::At(t) => *t,
                EventTime::Range { start, .. } => *start,
            }
        }

        pub fn end(&self) -> Option<ClockTime> {
            match self {
                EventTime::At(_) => None,
                EventTime::Range { end, .. } => Some(*end),
            }
        }

        pub fn has_time_range(&self) -> bool {
            matches!(self, EventTime::Range { .. })
        }

        /// Minutes since midnight of the start; ranges sort by their start.
        pub fn sort_key(&self) -> u32 {
            self.start().minutes_of_day()
        }
    }

    impl fmt::Display for EventTime {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self {
                EventTime::At(t) => write!(f, "{t}"),
                EventTime::Range { start, end } => write!(f, "{start}-{end}"),
            }
        }
    }

    /// Wire shape of [`EventTime`]: `time`, or `startTime`/`endTime`/`hasTimeRange`.
    #[serde_as]
    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct EventTimeFields {
        #[serde_as(as = "Option<DisplayFromStr>")]
        #[serde(skip_serializing_if = "Option::is_none")]
        time: Option<ClockTime>,
        #[serde_as(as = "Option<DisplayFromStr>")]
        #[serde(skip_serializing_if = "Option::is_none")]
        start_time: Option<ClockTime>,
        #[serde_as(as = "Option<DisplayFromStr>")]
        #[serde(skip_serializing_if = "Option::is_none")]
        end_time: Option<ClockTime>,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        has_time_range: bool,
    }

    impl From<EventTime> for EventTimeFields {
        fn from(value: EventTime) -> Self {
            match value {
                EventTime::At(t) => Self {
                    time: Some(t),
                    ..Self::default()
                },
                EventTime::Range { start, end } => Self {
                    start_time: Some(start),
                    end_time: Some(end),
                    has_time_range: true,
                    ..Self::default()
                },
            }
        }
    }

    impl TryFrom<EventTimeFields> for EventTime {
        type Error = String;

        fn try_from(f: EventTimeFields) -> Result<Self, Self::Error> {
            match (f.time, f.start_time, f.end_time, f.has_time_range) {
                (Some(t), None, None, false) => Ok(EventTime::At(t)),
                (None, Some(start), Some(end), true) => Ok(EventTime::Range { start, end }),
                _ => Err("event needs either `time` or `startTime`+`endTime` with `hasTimeRange`"
                    .to_string()),
            }
        }
    }

    /* ------------------------------ Page records ------------------------------ */

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Event {
        pub id: EventId,
        pub title: String,
        #[serde(flatten)]
        pub when: EventTime,
        pub confidence: f64,
        pub bounds: BoundingBox,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub date: Option<NaiveDate>,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Todo {
        pub id: TodoId,
        /// Cleaned list text (markers stripped, known misreads corrected).
        pub text: String,
        /// The line as OCR produced it.
        pub original_text: String,
        pub day_date: Option<NaiveDate>,
        pub day_name: String,
        #[serde(with = "hour_minute")]
        pub reminder_time: NaiveTime,
        pub confidence: f64,
        pub bounds: BoundingBox,
    }

    /// Close of business; the due time every extracted todo starts with.
    pub fn default_reminder_time() -> NaiveTime {
        NaiveTime::from_hms_opt(17, 0, 0).unwrap_or(NaiveTime::MIN)
    }

    /// One weekday's worth of page content.
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Section {
        pub day: String,
        pub short_day: String,
        /// Full calendar date when it could be resolved.
        pub date: Option<NaiveDate>,
        pub day_of_month: Option<u32>,
        /// Lowercase month name, e.g. `january`.
        pub month: Option<String>,
        pub year: Option<i32>,
        pub top_position: f64,
        pub bottom_position: Option<f64>,
        #[serde(default)]
        pub events: Vec<Event>,
        #[serde(default)]
        pub todos: Vec<Todo>,
        /// Base confidence used when a list is empty during scoring.
        pub confidence: f64,
    }

    impl Section {
        pub fn new(weekday: Weekday, top_position: f64) -> Self {
            let day = weekday_name(weekday);
            Self {
                day: day.to_string(),
                short_day: day[..3].to_string(),
                date: None,
                day_of_month: None,
                month: None,
                year: None,
                top_position,
                bottom_position: None,
                events: vec![],
                todos: vec![],
                confidence: 0.0,
            }
        }

        /// Set every date field from a resolved calendar date.
        pub fn with_date(mut self, date: NaiveDate) -> Self {
            self.date = Some(date);
            self.day_of_month = Some(date.day());
            self.month = month_name(date.month()).map(str::to_string);
            self.year = Some(date.year());
            self
        }
    }

    /// Decoded page template metadata from the QR payload.
    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct QrData {
        pub template_code: String,
        pub template_name: String,
        /// 0 = left page, 1 = right page.
        pub page_type: u8,
        pub is_left_page: bool,
        pub start_date: NaiveDate,
        pub days_on_page: u32,
        pub sections: Vec<String>,
        /// The 11 payload digits.
        pub raw: String,
    }

    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct PageDay {
        pub date: NaiveDate,
        pub day_name: String,
        pub short_name: String,
    }

    impl QrData {
        pub fn page_dates(&self) -> Vec<NaiveDate> {
            (0..u64::from(self.days_on_page))
                .filter_map(|i| self.start_date.checked_add_days(Days::new(i)))
                .collect()
        }

        pub fn page_days(&self) -> Vec<PageDay> {
            self.page_dates()
                .into_iter()
                .map(|date| {
                    let name = weekday_name(date.weekday());
                    PageDay {
                        date,
                        day_name: name.to_string(),
                        short_name: name[..3].to_string(),
                    }
                })
                .collect()
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct PageMetadata {
        pub processed_at: DateTime<Utc>,
        pub timezone: String,
        pub confidence: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub qr_data: Option<QrData>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub template_code: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub page_type: Option<u8>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub start_date: Option<NaiveDate>,
    }

    /// Everything interpreted from one page.
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct PageResult {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub year: Option<i32>,
        pub sections: Vec<Section>,
        pub metadata: PageMetadata,
    }

    impl PageResult {
        pub fn event_count(&self) -> usize {
            self.sections.iter().map(|s| s.events.len()).sum()
        }

        pub fn todo_count(&self) -> usize {
            self.sections.iter().map(|s| s.todos.len()).sum()
        }

        pub fn events(&self) -> impl Iterator<Item = (&Section, &Event)> {
            self.sections
                .iter()
                .flat_map(|s| s.events.iter().map(move |e| (s, e)))
        }

        pub fn todos(&self) -> impl Iterator<Item = (&Section, &Todo)> {
            self.sections
                .iter()
                .flat_map(|s| s.todos.iter().map(move |t| (s, t)))
        }
    }

    /* --------------------------- Per-block outcomes --------------------------- */

    /// Result of interpreting one block or line. A skip is an expected outcome, not an error.
    #[derive(Debug, Clone, PartialEq)]
    pub enum BlockOutcome<T> {
        Emitted(T),
        Skipped(SkipReason),
    }

    impl<T> BlockOutcome<T> {
        pub fn emitted(self) -> Option<T> {
            match self {
                BlockOutcome::Emitted(t) => Some(t),
                BlockOutcome::Skipped(_) => None,
            }
        }

        pub fn is_emitted(&self) -> bool {
            matches!(self, BlockOutcome::Emitted(_))
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum SkipReason {
        Blank,
        NoTime,
        EmptyDescription,
        Rejected(Rejection),
    }

    /// Why a candidate title or todo line was not kept.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum Rejection {
        TooShort,
        SingleLetter,
        Numeric,
        Symbol,
        NoLetters,
        TodoHeader,
        QrPayload,
        MonthName,
        DateToken,
        BareTime,
        Weekday,
    }

    /* --------------------------- Calendar vocabulary --------------------------- */

    const WEEKDAY_NAMES: [(Weekday, &str); 7] = [
        (Weekday::Mon, "Monday"),
        (Weekday::Tue, "Tuesday"),
        (Weekday::Wed, "Wednesday"),
        (Weekday::Thu, "Thursday"),
        (Weekday::Fri, "Friday"),
        (Weekday::Sat, "Saturday"),
        (Weekday::Sun, "Sunday"),
    ];

    const MONTH_NAMES: [&str; 12] = [
        "january",
        "february",
        "march",
        "april",
        "may",
        "june",
        "july",
        "august",
        "september",
        "october",
        "november",
        "december",
    ];

    pub fn weekday_name(day: Weekday) -> &'static str {
        WEEKDAY_NAMES
            .iter()
            .find(|(w, _)| *w == day)
            .map(|(_, n)| *n)
            .unwrap_or("Monday")
    }

    /// Full names and the usual abbreviations (`mon`, `tues`, `thurs`, ...), any case.
    pub fn weekday_from_name(name: &str) -> Option<Weekday> {
        let lower = name.trim().trim_end_matches(['.', ',']).to_lowercase();
        if lower.len() < 3 {
            return None;
        }
        WEEKDAY_NAMES.iter().find_map(|(w, full)| {
            let full = full.to_lowercase();
            let abbreviation = matches!(
                (w, lower.as_str()),
                (Weekday::Tue, "tues") | (Weekday::Thu, "thur") | (Weekday::Thu, "thurs")
            );
            (lower == full || lower == full[..3] || abbreviation).then_some(*w)
        })
    }

    /// 1-based month from a full name or a 3-letter abbreviation (`sept` too).
    pub fn month_from_name(name: &str) -> Option<u32> {
        let lower = name.trim().trim_end_matches(['.', ',']).to_lowercase();
        if lower == "sept" {
            return Some(9);
        }
        MONTH_NAMES
            .iter()
            .position(|full| lower == *full || (lower.len() == 3 && full.starts_with(&lower)))
            .map(|idx| idx as u32 + 1)
    }

    pub fn month_name(month: u32) -> Option<&'static str> {
        MONTH_NAMES.get(month.checked_sub(1)? as usize).copied()
    }

    pub(crate) mod hour_minute {
        use chrono::NaiveTime;
        use serde::{Deserialize, Deserializer, Serializer, de::Error};

        const FORMAT: &str = "%H:%M";

        pub fn serialize<S>(value: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            serializer.serialize_str(&value.format(FORMAT).to_string())
        }

        pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveTime, D::Error>
        where
            D: Deserializer<'de>,
        {
            let s = String::deserialize(deserializer)?;
            NaiveTime::parse_from_str(&s, FORMAT).map_err(D::Error::custom)
        }
    }

}

pub mod normalize {
    //! OCR misread correction for free text.

    use indexmap::{IndexMap, IndexSet};

    const CORRECTIONS: &[(&str, &str)] = &[
        ("dentst", "dentist"),
        ("ortho", "orthodontist"),
        ("socr", "soccer"),
        ("schl", "school"),
        ("skool", "school"),
        ("scool", "school"),
        ("sekool", "school"),
        ("shasl", "school"),
        ("practce", "practice"),
        ("prctice", "practice"),
        ("pradke", "practice"),
        ("prake", "practice"),
        ("dache", "practice"),
        ("appt", "appointment"),
        ("apt", "appointment"),
        ("ypt", "appointment"),
        ("aot", "appointment"),
        ("lnch", "lunch"),
        ("luh", "lunch"),
        ("grf", "golf"),
        ("goll", "golf"),
        ("octor", "doctor"),
        ("eetin", "meeting"),
        ("stets", "starts"),
        ("moeday", "monday"),
        ("moedey", "monday"),
        ("tusday", "tuesday"),
        ("wodesly", "wednesday"),
        ("tharsday", "thursday"),
        ("frday", "friday"),
        ("satarday", "saturday"),
        ("sarday", "sunday"),
        ("janary", "january"),
        ("jaruary", "january"),
        ("jaraarg", "january"),
        ("uaraary", "january"),
    ];

    const DEFAULT_PROPER_NAMES: &[&str] = &["Rane"];

    /// Whole-word dictionary correction with proper-name preservation.
    ///
    /// The correction table is fixed at construction; only proper names can be
    /// registered afterwards.
    #[derive(Debug, Clone)]
    pub struct TextNormalizer {
        proper_names: IndexSet<String>,
        corrections: IndexMap<String, String>,
    }

    impl Default for TextNormalizer {
        fn default() -> Self {
            Self::new(DEFAULT_PROPER_NAMES.iter().copied())
        }
    }

    impl TextNormalizer {
        pub fn new<I, S>(proper_names: I) -> Self
        where
            I: IntoIterator<Item = S>,
            S: Into<String>,
        {
            Self {
                proper_names: proper_names.into_iter().map(Into::into).collect(),
                corrections: CORRECTIONS
                    .iter()
                    .map(|(from, to)| (from.to_string(), to.to_string()))
                    .collect(),
            }
        }

        /// Merge extra misreads over the built-in table. Keys are matched lowercase.
        pub fn with_extra_corrections<I, K, V>(mut self, extra: I) -> Self
        where
            I: IntoIterator<Item = (K, V)>,
            K: AsRef<str>,
            V: Into<String>,
        {
            for (from, to) in extra {
                self.corrections
                    .insert(from.as_ref().trim().to_lowercase(), to.into());
            }
            self
        }

        pub fn with_proper_name(mut self, name: impl Into<String>) -> Self {
            self.add_proper_name(name);
            self
        }

        pub fn add_proper_name(&mut self, name: impl Into<String>) {
            let name = name.into();
            if !name.trim().is_empty() {
                self.proper_names.insert(name.trim().to_string());
            }
        }

        pub fn proper_names(&self) -> impl Iterator<Item = &str> {
            self.proper_names.iter().map(String::as_str)
        }

        /// Lowercase, trim, restore proper names, then apply whole-word corrections.
        pub fn normalize_text(&self, raw: &str) -> String {
            let lowered = raw.trim().to_lowercase();
            if lowered.is_empty() {
                return String::new();
            }
            map_words(&lowered, |word| {
                if let Some(name) = self.proper_name(word) {
                    return Some(name.to_string());
                }
                self.corrections.get(word).cloned()
            })
        }

        /// Apply the correction table without lowercasing the rest of the text.
        ///
        /// A corrected word takes the case shape of the misread (`Moeday` -> `Monday`).
        pub fn correct_words(&self, text: &str) -> String {
            map_words(text, |word| {
                if self.proper_name(word).is_some() {
                    return None;
                }
                let fixed = self.corrections.get(&word.to_lowercase())?;
                Some(match_case(word, fixed))
            })
        }

        fn proper_name(&self, word: &str) -> Option<&str> {
            self.proper_names
                .iter()
                .find(|name| name.eq_ignore_ascii_case(word))
                .map(String::as_str)
        }
    }

    /// Lowercase and collapse whitespace runs; used to compare titles.
    pub fn fold_title(s: &str) -> String {
        let mut out = String::with_capacity(s.len());
        let mut prev_space = false;
        for ch in s.chars() {
            if ch.is_whitespace() {
                if !prev_space {
                    out.push(' ');
                    prev_space = true;
                }
            } else {
                out.extend(ch.to_lowercase());
                prev_space = false;
            }
        }
        out.trim().to_string()
    }

    fn is_word_char(c: char) -> bool {
        c.is_alphanumeric() || c == '_'
    }

    /// Rebuild `text`, offering each maximal word run to `replace`.
    fn map_words<F>(text: &str, mut replace: F) -> String
    where
        F: FnMut(&str) -> Option<String>,
    {
        let mut out = String::with_capacity(text.len());
        let mut rest = text;
        while let Some(first) = rest.chars().next() {
            let in_word = is_word_char(first);
            let end = rest
                .char_indices()
                .find(|(_, c)| is_word_char(*c) != in_word)
                .map(|(idx, _)| idx)
                .unwrap_or(rest.len());
            let (run, tail) = rest.split_at(end);
            match in_word.then(|| replace(run)).flatten() {
                Some(fixed) => out.push_str(&fixed),
                None => out.push_str(run),
            }
            rest = tail;
        }
        out
    }

    fn match_case(original: &str, replacement: &str) -> String {
        let mut chars = original.chars();
        let first_upper = chars.next().is_some_and(char::is_uppercase);
        let all_upper = original.chars().count() > 1 && original.chars().all(char::is_uppercase);
        if all_upper {
            replacement.to_uppercase()
        } else if first_upper {
            let mut fixed = replacement.chars();
            fixed
                .next()
                .map(|c| c.to_uppercase().chain(fixed).collect())
                .unwrap_or_default()
        } else {
            replacement.to_string()
        }
    }

}

pub mod time {
    //! Clock-time parsing with OCR repair and AM/PM inference.
    //!
    //! Inference is a best-effort guess: explicit meridians win, then a meridian
    //! carried over from a range end, then context keywords, then the hour table
    //! (12 is noon, 1 through 11 are morning).

    use crate::core::{ClockTime, EventTime, Meridian};
    use crate::lex::{PResult, char_is_digit, meridian, take_while_m_n};
    use nom::{
        bytes::complete::tag,
        character::complete::{char, space0},
        combinator::{all_consuming, opt, recognize},
        sequence::{preceded, tuple},
    };

    const MORNING_WORDS: &[&str] = &["breakfast", "morning", "school starts", "class starts"];
    const AFTERNOON_WORDS: &[&str] = &["lunch", "afternoon", "school ends", "dismissal"];
    const EVENING_WORDS: &[&str] = &["dinner", "evening", "practice", "workout", "training"];

    pub fn infer_meridian(hour: u8, context: &str) -> Meridian {
        let context = context.to_lowercase();
        let mentions = |words: &[&str]| words.iter().any(|w| context.contains(w));
        if mentions(MORNING_WORDS) {
            Meridian::Am
        } else if mentions(AFTERNOON_WORDS) || mentions(EVENING_WORDS) {
            Meridian::Pm
        } else if hour == 12 {
            Meridian::Pm
        } else {
            Meridian::Am
        }
    }

    /// Undo the usual OCR confusions inside a time token.
    ///
    /// Canonical input comes back unchanged.
    pub fn repair_time_token(raw: &str) -> String {
        let lowered = raw.trim().to_lowercase().replace("ioopm", "1:00pm");
        let chars: Vec<char> = lowered.chars().collect();
        let digit_at = |idx: usize| chars.get(idx).is_some_and(char::is_ascii_digit);
        let mut out = String::with_capacity(chars.len() + 1);
        let mut idx = 0;
        while idx < chars.len() {
            let c = chars[idx];
            let prev_digit = idx > 0 && digit_at(idx - 1);
            let next_digit = digit_at(idx + 1);
            // d.0m / d.0n
            if c == '.'
                && prev_digit
                && chars.get(idx + 1) == Some(&'0')
                && matches!(chars.get(idx + 2), Some('m' | 'n'))
            {
                out.push_str(":00");
                idx += 3;
                continue;
            }
            let fixed = match c {
                '.' if prev_digit && next_digit => ':',
                'q' if next_digit || chars.get(idx + 1) == Some(&':') => '9',
                'o' if next_digit || prev_digit => '0',
                'l' | 'i' | '|' if next_digit => '1',
                _ => c,
            };
            out.push(fixed);
            idx += 1;
        }

        let out = repair_meridian_suffix(out);
        insert_missing_colon(&out)
    }

    /// `4pn` -> `4pm`, `7p` -> `7pm`.
    fn repair_meridian_suffix(token: String) -> String {
        let body_is_time = |body: &str| {
            body.chars().last().is_some_and(|c| c.is_ascii_digit())
                && body.chars().all(|c| c.is_ascii_digit() || c == ':')
        };
        let suffixes = [("an", "am"), ("pn", "pm"), ("a", "am"), ("p", "pm")];
        for (bad, good) in suffixes {
            if let Some(body) = token.strip_suffix(bad).map(str::trim_end) {
                if body_is_time(body) {
                    return format!("{body}{good}");
                }
            }
        }
        token
    }

    /// `900am` -> `9:00am`, `1030` -> `10:30`.
    fn insert_missing_colon(token: &str) -> String {
        let digits_end = token
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(token.len());
        let (digits, rest) = token.split_at(digits_end);
        let rest_is_meridian = rest.trim().is_empty()
            || matches!(rest.trim(), "am" | "pm");
        if (3..=4).contains(&digits.len()) && rest_is_meridian {
            let (hour, minute) = digits.split_at(digits.len() - 2);
            format!("{hour}:{minute}{}", rest.trim())
        } else {
            token.to_string()
        }
    }

    struct RawTime<'a> {
        hour: &'a str,
        minute: Option<&'a str>,
        meridian: Option<Meridian>,
    }

    fn raw_time(i: &str) -> PResult<'_, RawTime<'_>> {
        let (i, hour) = take_while_m_n(1, 2, char_is_digit)(i)?;
        let (i, minute) = opt(preceded(char(':'), take_while_m_n(2, 2, char_is_digit)))(i)?;
        let (i, _) = space0(i)?;
        let (i, meridian) = opt(meridian)(i)?;
        Ok((
            i,
            RawTime {
                hour,
                minute,
                meridian,
            },
        ))
    }

    /// Parse one time token into canonical form.
    ///
    /// `inferred` is used when the token has no meridian of its own; otherwise
    /// the meridian comes from `context`.
    pub fn normalize_time(raw: &str, context: &str, inferred: Option<Meridian>) -> Option<ClockTime> {
        let repaired = repair_time_token(raw);
        let stripped: String = repaired
            .chars()
            .filter(|c| c.is_ascii_digit() || matches!(c, ':' | 'a' | 'p' | 'm'))
            .collect();
        let stripped = insert_missing_colon(&stripped);
        let (_, parsed) = all_consuming(raw_time)(stripped.as_str()).ok()?;
        let hour: u8 = parsed.hour.parse().ok()?;
        let minute: u8 = match parsed.minute {
            Some(m) => m.parse().ok()?,
            None => 0,
        };
        if !(1..=12).contains(&hour) {
            return None;
        }
        let meridian = parsed
            .meridian
            .or(inferred)
            .unwrap_or_else(|| infer_meridian(hour, context));
        ClockTime::new(hour, minute, meridian)
    }

    /// Parse `start-end`; the end's explicit meridian carries to a bare start.
    ///
    /// All or nothing: if either side fails the whole range is `None`.
    pub fn normalize_time_range(raw: &str, context: &str) -> Option<EventTime> {
        let mut parts = raw.split('-');
        let (start, end) = (parts.next()?, parts.next()?);
        if parts.next().is_some() || start.trim().is_empty() || end.trim().is_empty() {
            return None;
        }
        let end_meridian = explicit_meridian(end);
        let start = normalize_time(start, context, end_meridian)?;
        let end = normalize_time(end, context, None)?;
        Some(EventTime::Range { start, end })
    }

    fn explicit_meridian(token: &str) -> Option<Meridian> {
        let repaired = repair_time_token(token);
        if repaired.ends_with("am") {
            Some(Meridian::Am)
        } else if repaired.ends_with("pm") {
            Some(Meridian::Pm)
        } else {
            None
        }
    }

    fn range_side(i: &str) -> PResult<'_, &str> {
        recognize(tuple((
            take_while_m_n(1, 2, char_is_digit),
            opt(preceded(char(':'), take_while_m_n(2, 2, char_is_digit))),
        )))(i)
    }

    fn leading_range(i: &str) -> PResult<'_, &str> {
        recognize(tuple((
            range_side,
            space0,
            opt(meridian),
            space0,
            tag("-"),
            space0,
            range_side,
            space0,
            opt(meridian),
        )))(i)
    }

    /// Split `9-10:30pm soccer` into the range text and the remainder.
    pub fn split_leading_range(text: &str) -> Option<(&str, &str)> {
        let (rest, range) = leading_range(text.trim_start()).ok()?;
        Some((range.trim_end(), rest.trim()))
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        fn canon(raw: &str, ctx: &str) -> Option<String> {
            normalize_time(raw, ctx, None).map(|t| t.to_string())
        }

        #[test]
        fn canonical_times_round_trip() {
            for hour in 1..=12u8 {
                for minute in 0..=59u8 {
                    for m in [Meridian::Am, Meridian::Pm] {
                        let t = ClockTime::new(hour, minute, m).unwrap();
                        let text = t.to_string();
                        assert_eq!(canon(&text, "").as_deref(), Some(text.as_str()));
                    }
                }
            }
        }

        #[test]
        fn range_end_meridian_carries_to_start() {
            let range = normalize_time_range("9:00-10:30am", "").unwrap();
            assert_eq!(range.start().to_string(), "9:00am");
            assert_eq!(range.end().map(|t| t.to_string()).as_deref(), Some("10:30am"));
            assert!(range.has_time_range());
        }

        #[test]
        fn range_is_all_or_nothing() {
            assert!(normalize_time_range("9:00-25:00", "").is_none());
            assert!(normalize_time_range("9:00", "").is_none());
            assert!(normalize_time_range("9-10-11", "").is_none());
        }

        #[test]
        fn meridian_inferred_from_context() {
            assert_eq!(canon("9", "breakfast meeting").as_deref(), Some("9:00am"));
            assert_eq!(canon("9", "dinner").as_deref(), Some("9:00pm"));
            assert_eq!(canon("3", "soccer practice").as_deref(), Some("3:00pm"));
        }

        #[test]
        fn hour_table_fallback() {
            assert_eq!(canon("12", "").as_deref(), Some("12:00pm"));
            assert_eq!(canon("7:15", "").as_deref(), Some("7:15am"));
        }

        #[test]
        fn explicit_override_beats_context() {
            let t = normalize_time("9", "breakfast", Some(Meridian::Pm)).unwrap();
            assert_eq!(t.to_string(), "9:00pm");
        }

        #[test]
        fn rejects_out_of_range() {
            assert_eq!(canon("13:00", ""), None);
            assert_eq!(canon("0:30am", ""), None);
            assert_eq!(canon("9:75am", ""), None);
            assert_eq!(canon("dentist", ""), None);
            assert_eq!(canon("-", ""), None);
        }

        #[test]
        fn repairs_common_misreads() {
            assert_eq!(canon("900am", "").as_deref(), Some("9:00am"));
            assert_eq!(canon("9.30pm", "").as_deref(), Some("9:30pm"));
            assert_eq!(canon("q:00", "").as_deref(), Some("9:00am"));
            assert_eq!(canon("l0:3o", "").as_deref(), Some("10:30am"));
            assert_eq!(canon("ioopm", "").as_deref(), Some("1:00pm"));
            assert_eq!(canon("4pn", "").as_deref(), Some("4:00pm"));
            assert_eq!(canon("7p", "").as_deref(), Some("7:00pm"));
            assert_eq!(canon("5.0m", "").as_deref(), Some("5:00am"));
            assert_eq!(canon("9:00 AM", "").as_deref(), Some("9:00am"));
        }

        #[test]
        fn splits_leading_range() {
            assert_eq!(
                split_leading_range("9-10:30pm Soccer practice"),
                Some(("9-10:30pm", "Soccer practice"))
            );
            assert_eq!(
                split_leading_range("3:30 - 5 swim"),
                Some(("3:30 - 5", "swim"))
            );
            assert_eq!(
                split_leading_range("10pm-1am movie night"),
                Some(("10pm-1am", "movie night"))
            );
            assert_eq!(split_leading_range("9:00am dentist"), None);
        }
    }
}

pub mod qr {
    //! Page template codes printed under the QR mark and re-read by OCR.
    //!
    //! Payload layout, 11 ASCII digits, no separators:
    //! `TT` template code, `S` page side (0 left, 1 right), `YYYY`, `MM`, `DD`.

    use crate::core::{BoundingBox, PageGeometry, QrData, TextBlock};
    use crate::lex::PResult;
    use chrono::NaiveDate;
    use indexmap::IndexMap;
    use nom::{
        bytes::complete::take,
        combinator::{all_consuming, verify},
        sequence::tuple,
    };
    use tracing::{debug, warn};

    pub const PAYLOAD_LEN: usize = 11;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct Template {
        pub code: String,
        pub name: String,
        pub left_days: u32,
        pub right_days: u32,
        pub sections: Vec<String>,
    }

    impl Template {
        pub fn days_on_page(&self, is_left_page: bool) -> u32 {
            if is_left_page {
                self.left_days
            } else {
                self.right_days
            }
        }
    }

    /// Immutable lookup of known template codes.
    #[derive(Debug, Clone)]
    pub struct TemplateRegistry {
        templates: IndexMap<String, Template>,
    }

    impl Default for TemplateRegistry {
        fn default() -> Self {
            Self::new([Template {
                code: "01".into(),
                name: "Standard Weekly".into(),
                left_days: 4,
                right_days: 3,
                sections: vec!["calendar".into(), "todos".into()],
            }])
        }
    }

    impl TemplateRegistry {
        pub fn new(templates: impl IntoIterator<Item = Template>) -> Self {
            Self {
                templates: templates
                    .into_iter()
                    .map(|t| (t.code.clone(), t))
                    .collect(),
            }
        }

        pub fn get(&self, code: &str) -> Option<&Template> {
            self.templates.get(code)
        }

        pub fn codes(&self) -> impl Iterator<Item = &str> {
            self.templates.keys().map(String::as_str)
        }
    }

    #[derive(Debug, thiserror::Error, PartialEq, Eq)]
    pub enum QrError {
        #[error("QR payload must be 11 digits, got `{0}`")]
        Malformed(String),
        #[error("unknown template code `{0}`")]
        UnknownTemplate(String),
        #[error("invalid page side `{0}` (expected 0 or 1)")]
        InvalidPageType(String),
        #[error("invalid start date {year}-{month}-{day}")]
        InvalidDate { year: i32, month: u32, day: u32 },
    }

    /// Where the QR mark is printed, as fractions of page width and height.
    #[derive(Debug, Clone, Copy, PartialEq)]
    pub struct QrArea {
        pub top: f64,
        pub bottom: f64,
        pub left: f64,
        pub right: f64,
        pub tolerance: f64,
    }

    impl QrArea {
        /// A one-inch mark on a letter page, centered, ending 8% above the bottom edge.
        pub fn expected() -> Self {
            let bottom = 0.92;
            let height = (1.0 / 8.0) * (8.5 / 11.0);
            Self {
                top: bottom - height,
                bottom,
                left: 0.4375,
                right: 0.5625,
                tolerance: 0.1,
            }
        }

        pub fn contains(&self, b: &BoundingBox, page: &PageGeometry) -> bool {
            let top = b.top / page.height;
            let bottom = b.bottom() / page.height;
            let left = b.left / page.width;
            let right = b.right() / page.width;
            top >= self.top - self.tolerance
                && bottom <= self.bottom + self.tolerance
                && left >= self.left - self.tolerance
                && right <= self.right + self.tolerance
        }
    }

    fn digits(n: usize) -> impl Fn(&str) -> PResult<'_, &str> {
        move |i: &str| verify(take(n), |s: &str| s.chars().all(|c| c.is_ascii_digit()))(i)
    }

    type RawPayload<'a> = (&'a str, &'a str, &'a str, &'a str, &'a str);

    fn payload(i: &str) -> PResult<'_, RawPayload<'_>> {
        all_consuming(tuple((digits(2), digits(1), digits(4), digits(2), digits(2))))(i)
    }

    fn compact(text: &str) -> String {
        text.chars().filter(|c| !c.is_whitespace()).collect()
    }

    /// Every maximal digit run of at least `len` digits, truncated to `len`.
    pub fn find_digit_runs(text: &str, len: usize) -> Vec<&str> {
        text.split(|c: char| !c.is_ascii_digit())
            .filter(|run| run.len() >= len)
            .map(|run| &run[..len])
            .collect()
    }

    #[derive(Debug, Clone, Default)]
    pub struct QrDecoder {
        registry: TemplateRegistry,
    }

    impl QrDecoder {
        pub fn new(registry: TemplateRegistry) -> Self {
            Self { registry }
        }

        pub fn registry(&self) -> &TemplateRegistry {
            &self.registry
        }

        /// Decode a payload; whitespace inside it is ignored (`"0102025 0106"`).
        pub fn decode_payload(&self, raw: &str) -> Result<QrData, QrError> {
            let digits = compact(raw);
            let (_, (code, side, year, month, day)) =
                payload(&digits).map_err(|_| QrError::Malformed(digits.clone()))?;

            let template = self
                .registry
                .get(code)
                .ok_or_else(|| QrError::UnknownTemplate(code.to_string()))?;
            let is_left_page = match side {
                "0" => true,
                "1" => false,
                other => return Err(QrError::InvalidPageType(other.to_string())),
            };
            let (year, month, day) = (
                year.parse::<i32>().unwrap_or_default(),
                month.parse::<u32>().unwrap_or_default(),
                day.parse::<u32>().unwrap_or_default(),
            );
            let start_date = NaiveDate::from_ymd_opt(year, month, day)
                .ok_or(QrError::InvalidDate { year, month, day })?;

            Ok(QrData {
                template_code: template.code.clone(),
                template_name: template.name.clone(),
                page_type: u8::from(!is_left_page),
                is_left_page,
                start_date,
                days_on_page: template.days_on_page(is_left_page),
                sections: template.sections.clone(),
                raw: digits,
            })
        }

        /// 11 digits with a known template prefix. The rest is checked by decoding.
        pub fn is_valid_format(&self, digits: &str) -> bool {
            digits.len() == PAYLOAD_LEN
                && digits.chars().all(|c| c.is_ascii_digit())
                && self.registry.get(&digits[..2]).is_some()
        }

        /// Find and decode the template code among the page's blocks.
        ///
        /// Candidates in order: whole in-area blocks, digit runs inside in-area
        /// blocks, then digit runs across all page text. The first candidate with
        /// a known template prefix decides; a bad page side or date yields `None`.
        pub fn process_qr_from_ocr_results(
            &self,
            blocks: &[TextBlock],
            page: &PageGeometry,
        ) -> Option<QrData> {
            let area = QrArea::expected();
            let in_area: Vec<&TextBlock> = blocks
                .iter()
                .filter(|b| area.contains(&b.bounding, page))
                .collect();

            let whole = in_area.iter().map(|b| compact(&b.text));
            let embedded = in_area
                .iter()
                .flat_map(|b| find_digit_runs(&b.text, PAYLOAD_LEN))
                .map(str::to_string);
            let page_text: String = blocks.iter().map(|b| compact(&b.text)).collect();
            let anywhere = find_digit_runs(&page_text, PAYLOAD_LEN)
                .into_iter()
                .map(str::to_string)
                .collect::<Vec<_>>();

            let candidate = whole
                .chain(embedded)
                .chain(anywhere)
                .find(|c| self.is_valid_format(c))?;
            debug!(payload = %candidate, "QR candidate");
            match self.decode_payload(&candidate) {
                Ok(qr) => Some(qr),
                Err(err) => {
                    warn!(%err, "QR candidate rejected");
                    None
                }
            }
        }

        /// Blocks that are the printed payload rather than page content.
        pub fn is_qr_block(&self, block: &TextBlock, qr: Option<&QrData>, page: &PageGeometry) -> bool {
            let text = compact(&block.text);
            if let Some(qr) = qr {
                if text.contains(&qr.raw) {
                    return true;
                }
            }
            text.len() >= 6
                && text.chars().all(|c| c.is_ascii_digit())
                && QrArea::expected().contains(&block.bounding, page)
        }
    }

}

pub mod sections {
    //! Partitioning a page into per-weekday sections.

    use crate::core::{PageGeometry, QrData, Section, TextBlock, month_from_name, month_name};
    use crate::lex::{PResult, char_is_digit, take_while_m_n};
    use crate::normalize::TextNormalizer;
    use chrono::{Datelike, NaiveDate, Weekday};
    use nom::{
        branch::alt,
        bytes::complete::tag_no_case,
        character::complete::{alpha1, char, satisfy, space0, space1},
        combinator::{map, map_opt, map_res, not, opt, peek, value},
        sequence::{preceded, terminated, tuple},
    };
    use std::collections::HashSet;
    use tracing::debug;

    /// Base confidence of a section derived from template geometry.
    pub const TEMPLATE_SECTION_CONFIDENCE: f64 = 0.8;

    /// How section positions are found. Chosen once per page.
    #[derive(Debug, Clone, PartialEq)]
    pub enum LayoutStrategy {
        /// Equal vertical slices of the page, dated from the QR start date.
        Template(QrData),
        /// One section per weekday header found in the text.
        DayHeaders,
    }

    impl LayoutStrategy {
        pub fn select(qr: Option<&QrData>) -> Self {
            match qr {
                Some(qr) => LayoutStrategy::Template(qr.clone()),
                None => LayoutStrategy::DayHeaders,
            }
        }

        /// Sections sorted by `top_position`, each closed at the next one's top.
        pub fn build_sections(
            &self,
            blocks: &[TextBlock],
            page: &PageGeometry,
            normalizer: &TextNormalizer,
            page_year: Option<i32>,
        ) -> Vec<Section> {
            let mut sections = match self {
                LayoutStrategy::Template(qr) => template_sections(qr, page),
                LayoutStrategy::DayHeaders => header_sections(blocks, normalizer, page_year),
            };
            sections.sort_by(|a, b| a.top_position.total_cmp(&b.top_position));
            for idx in 1..sections.len() {
                let next_top = sections[idx].top_position;
                let prev = &mut sections[idx - 1];
                if prev.bottom_position.is_none() {
                    prev.bottom_position = Some(next_top);
                }
            }
            debug!(count = sections.len(), strategy = self.kind(), "built sections");
            sections
        }

        fn kind(&self) -> &'static str {
            match self {
                LayoutStrategy::Template(_) => "template",
                LayoutStrategy::DayHeaders => "day-headers",
            }
        }
    }

    fn template_sections(qr: &QrData, page: &PageGeometry) -> Vec<Section> {
        if qr.days_on_page == 0 {
            return vec![];
        }
        let slice = page.height / f64::from(qr.days_on_page);
        qr.page_dates()
            .into_iter()
            .enumerate()
            .map(|(idx, date)| {
                let mut section =
                    Section::new(date.weekday(), idx as f64 * slice).with_date(date);
                section.bottom_position = Some((idx + 1) as f64 * slice);
                section.confidence = TEMPLATE_SECTION_CONFIDENCE;
                section
            })
            .collect()
    }

    fn header_sections(
        blocks: &[TextBlock],
        normalizer: &TextNormalizer,
        page_year: Option<i32>,
    ) -> Vec<Section> {
        let mut ordered: Vec<&TextBlock> = blocks.iter().collect();
        ordered.sort_by(|a, b| a.top().total_cmp(&b.top()));

        let mut seen = HashSet::new();
        let mut sections = Vec::new();
        for block in ordered {
            let Some(header) = parse_day_header(&normalizer.correct_words(block.text.trim())) else {
                continue;
            };
            if !seen.insert(header.weekday) {
                debug!(text = %block.text, "repeated day header ignored");
                continue;
            }
            let mut section = Section::new(header.weekday, block.top());
            let year = header.year.or(page_year);
            match header.full_date(page_year) {
                Some(date) => section = section.with_date(date),
                None => {
                    section.day_of_month = header.day;
                    section.month = header.month.and_then(month_name).map(str::to_string);
                    section.year = year;
                }
            }
            section.confidence = block.confidence;
            sections.push(section);
        }
        sections
    }

    /// A weekday header such as `Monday, 6 January` or `Tuesday January 7, 2025`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DayHeader {
        pub weekday: Weekday,
        pub month: Option<u32>,
        pub day: Option<u32>,
        pub year: Option<i32>,
    }

    impl DayHeader {
        pub fn full_date(&self, page_year: Option<i32>) -> Option<NaiveDate> {
            NaiveDate::from_ymd_opt(self.year.or(page_year)?, self.month?, self.day?)
        }
    }

    fn weekday(i: &str) -> PResult<'_, Weekday> {
        terminated(
            alt((
                value(Weekday::Mon, tag_no_case("monday")),
                value(Weekday::Tue, tag_no_case("tuesday")),
                value(Weekday::Wed, tag_no_case("wednesday")),
                value(Weekday::Thu, tag_no_case("thursday")),
                value(Weekday::Fri, tag_no_case("friday")),
                value(Weekday::Sat, tag_no_case("saturday")),
                value(Weekday::Sun, tag_no_case("sunday")),
            )),
            not(peek(satisfy(char::is_alphabetic))),
        )(i)
    }

    fn month_word(i: &str) -> PResult<'_, u32> {
        map_opt(alpha1, month_from_name)(i)
    }

    fn day_number(i: &str) -> PResult<'_, u32> {
        terminated(
            map_res(take_while_m_n(1, 2, char_is_digit), |s: &str| s.parse::<u32>()),
            opt(alt((
                tag_no_case("st"),
                tag_no_case("nd"),
                tag_no_case("rd"),
                tag_no_case("th"),
            ))),
        )(i)
    }

    fn year_number(i: &str) -> PResult<'_, i32> {
        map_res(take_while_m_n(4, 4, char_is_digit), |s: &str| s.parse::<i32>())(i)
    }

    fn separator(i: &str) -> PResult<'_, ()> {
        value((), tuple((space0, opt(char(',')), space0)))(i)
    }

    /// `(month, day, year)` in either month-first or day-first order.
    fn date_tail(i: &str) -> PResult<'_, (u32, u32, Option<i32>)> {
        let month_first = map(
            tuple((month_word, space1, day_number, opt(preceded(separator, year_number)))),
            |(m, _, d, y)| (m, d, y),
        );
        let day_first = map(
            tuple((day_number, space1, month_word, opt(preceded(separator, year_number)))),
            |(d, _, m, y)| (m, d, y),
        );
        preceded(separator, alt((month_first, day_first)))(i)
    }

    /// Recognize a weekday at the start of `text`, with an optional date after it.
    pub fn parse_day_header(text: &str) -> Option<DayHeader> {
        let (_, (weekday, tail)) = tuple((weekday, opt(date_tail)))(text.trim()).ok()?;
        let (month, day, year) = match tail {
            Some((m, d, y)) => (Some(m), Some(d), y),
            None => (None, None, None),
        };
        Some(DayHeader {
            weekday,
            month,
            day,
            year,
        })
    }

    /// Index of the section owning a block at `top`.
    ///
    /// `sections` must be sorted by `top_position`. A block belongs to the first
    /// section whose top is at or above it and whose successor starts below it;
    /// blocks above the first section belong nowhere.
    pub fn section_index_for(sections: &[Section], top: f64) -> Option<usize> {
        (0..sections.len()).find(|&idx| {
            let current = sections[idx].top_position;
            let next = sections.get(idx + 1).map(|s| s.top_position);
            top >= current && next.is_none_or(|next| top < next)
        })
    }

}

pub mod extract {
    //! Event and todo construction from the blocks of one section.

    use crate::core::month_from_name;

    const TODO_HEADER: &str = "things to do";

    pub(crate) fn is_todo_header(text: &str) -> bool {
        crate::normalize::fold_title(text) == TODO_HEADER
    }

    /// `3/4`, `12/25`, `1/6/2025`.
    fn is_slash_date(text: &str) -> bool {
        let parts: Vec<&str> = text.split('/').collect();
        (2..=3).contains(&parts.len())
            && parts
                .iter()
                .all(|p| (1..=4).contains(&p.len()) && p.chars().all(|c| c.is_ascii_digit()))
    }

    /// `jan`, `January 6`, `6th feb,`: only month names and day numbers.
    fn is_month_date_token(text: &str) -> bool {
        let mut saw_month = false;
        let all = text.split_whitespace().all(|word| {
            let word = word.trim_end_matches([',', '.']);
            if month_from_name(word).is_some() {
                saw_month = true;
                return true;
            }
            let digits = word.trim_end_matches(|c: char| c.is_ascii_alphabetic());
            !digits.is_empty()
                && digits.chars().all(|c| c.is_ascii_digit())
                && matches!(&word[digits.len()..], "" | "st" | "nd" | "rd" | "th")
        });
        all && saw_month
    }

    pub mod events {
        use super::{is_slash_date, is_todo_header};
        use crate::core::{
            BlockOutcome, Event, EventId, EventTime, Rejection, Section, SkipReason, TextBlock,
            month_from_name, weekday_from_name,
        };
        use crate::normalize::TextNormalizer;
        use crate::qr::PAYLOAD_LEN;
        use crate::time::{normalize_time, normalize_time_range, split_leading_range};
        use tracing::debug;

        /// Reject titles that are page furniture or OCR debris rather than an activity.
        pub fn validate_title(title: &str) -> Result<(), Rejection> {
            let t = title.trim();
            let lower = t.to_lowercase();
            let mut chars = t.chars();
            match (chars.next(), chars.next()) {
                (None, _) => return Err(Rejection::TooShort),
                (Some(c), None) if c.is_alphabetic() => return Err(Rejection::SingleLetter),
                (Some(c), None) if c.is_numeric() => return Err(Rejection::Numeric),
                (Some(_), None) => return Err(Rejection::Symbol),
                _ => {}
            }
            if is_todo_header(&lower) {
                return Err(Rejection::TodoHeader);
            }
            if t.chars().all(|c| c.is_ascii_digit()) {
                return Err(if t.len() == PAYLOAD_LEN {
                    Rejection::QrPayload
                } else {
                    Rejection::Numeric
                });
            }
            if !t.chars().any(char::is_alphanumeric) {
                return Err(Rejection::Symbol);
            }
            if month_from_name(&lower).is_some() {
                return Err(Rejection::MonthName);
            }
            if is_slash_date(t) {
                return Err(Rejection::DateToken);
            }
            if weekday_from_name(&lower).is_some() {
                return Err(Rejection::Weekday);
            }
            if is_bare_time(&lower) {
                return Err(Rejection::BareTime);
            }
            Ok(())
        }

        /// `am`, `PM`, `a.m.`, `p.m` as a word of its own.
        fn meridian_word(word: &str) -> Option<&'static str> {
            match word.to_lowercase().as_str() {
                "am" | "a.m." | "a.m" => Some("am"),
                "pm" | "p.m." | "p.m" => Some("pm"),
                _ => None,
            }
        }

        fn is_bare_time(lower: &str) -> bool {
            if meridian_word(lower).is_some() {
                return true;
            }
            lower.chars().any(|c| c.is_ascii_digit())
                && lower
                    .chars()
                    .all(|c| c.is_ascii_digit() || matches!(c, ':' | 'a' | 'p' | 'm' | '.' | '-' | ' '))
        }

        pub fn is_valid_event(event: &Event) -> bool {
            validate_title(&event.title).is_ok()
        }

        /// Interpret one block as `<time> <description>` or `<range> <description>`.
        pub fn extract_event(
            block: &TextBlock,
            section: &Section,
            normalizer: &TextNormalizer,
        ) -> BlockOutcome<Event> {
            let text = block.text.trim();
            if text.is_empty() {
                return BlockOutcome::Skipped(SkipReason::Blank);
            }

            let (when, description) = match split_leading_range(text) {
                Some((range, rest)) => (normalize_time_range(range, rest), rest.to_string()),
                None => {
                    let mut words = text.split_whitespace().peekable();
                    let mut first = words.next().unwrap_or_default().to_string();
                    // `7:00 PM movie`: the meridian belongs to the time
                    if let Some(m) = words.peek().and_then(|w| meridian_word(w)) {
                        first.push_str(m);
                        words.next();
                    }
                    let rest = words.collect::<Vec<_>>().join(" ");
                    let when = normalize_time(&first, &rest, None).map(EventTime::At);
                    (when, rest)
                }
            };

            let title = normalizer.normalize_text(&description);
            let Some(when) = when else {
                return BlockOutcome::Skipped(SkipReason::NoTime);
            };
            if title.is_empty() {
                return BlockOutcome::Skipped(SkipReason::EmptyDescription);
            }
            if let Err(rejection) = validate_title(&title) {
                return BlockOutcome::Skipped(SkipReason::Rejected(rejection));
            }

            BlockOutcome::Emitted(Event {
                id: EventId::new(),
                title,
                when,
                confidence: block.confidence,
                bounds: block.bounding,
                date: section.date,
            })
        }

        /// Extract, keep the valid ones, and order by start time of day.
        pub fn extract_events<'a, I>(
            blocks: I,
            section: &Section,
            normalizer: &TextNormalizer,
        ) -> Vec<Event>
        where
            I: IntoIterator<Item = &'a TextBlock>,
        {
            let mut events: Vec<Event> = blocks
                .into_iter()
                .filter_map(|block| match extract_event(block, section, normalizer) {
                    BlockOutcome::Emitted(event) => Some(event),
                    BlockOutcome::Skipped(reason) => {
                        debug!(text = %block.text, ?reason, day = %section.day, "no event");
                        None
                    }
                })
                .filter(is_valid_event)
                .collect();
            events.sort_by_key(|e| e.when.sort_key());
            events
        }

        #[cfg(test)]
        mod tests {
            use super::*;
            use crate::core::BoundingBox;
            use chrono::Weekday;

            fn block(text: &str) -> TextBlock {
                TextBlock::new(text, BoundingBox::new(0.0, 0.0, 100.0, 20.0)).with_confidence(0.9)
            }

            fn monday() -> Section {
                Section::new(Weekday::Mon, 0.0)
            }

            #[test]
            fn rejects_non_event_titles() {
                for title in ["F", "12", "things to do", "jan", "3/4", "9:00am"] {
                    assert!(validate_title(title).is_err(), "{title} should be rejected");
                }
                assert_eq!(validate_title("01020250106"), Err(Rejection::QrPayload));
                assert_eq!(validate_title("-"), Err(Rejection::Symbol));
                assert_eq!(validate_title("tues"), Err(Rejection::Weekday));
                assert!(validate_title("dentist").is_ok());
                assert!(validate_title("5k run").is_ok());
            }

            #[test]
            fn single_time_event() {
                let n = TextNormalizer::default();
                let event = extract_event(&block("9:00am Dentst"), &monday(), &n)
                    .emitted()
                    .unwrap();
                assert_eq!(event.title, "dentist");
                assert_eq!(event.when.to_string(), "9:00am");
                assert_eq!(event.confidence, 0.9);
            }

            #[test]
            fn range_event_uses_remainder_as_title() {
                let n = TextNormalizer::default();
                let event = extract_event(&block("3-4:30pm Socr practce"), &monday(), &n)
                    .emitted()
                    .unwrap();
                assert_eq!(event.title, "soccer practice");
                assert_eq!(event.when.start().to_string(), "3:00pm");
                assert_eq!(event.when.end().unwrap().to_string(), "4:30pm");
            }

            #[test]
            fn skips_are_explicit() {
                let n = TextNormalizer::default();
                let s = monday();
                assert_eq!(
                    extract_event(&block("   "), &s, &n),
                    BlockOutcome::Skipped(SkipReason::Blank)
                );
                assert_eq!(
                    extract_event(&block("Dentist at noon"), &s, &n),
                    BlockOutcome::Skipped(SkipReason::NoTime)
                );
                assert_eq!(
                    extract_event(&block("9:00am"), &s, &n),
                    BlockOutcome::Skipped(SkipReason::EmptyDescription)
                );
                assert_eq!(
                    extract_event(&block("9:00am 10am"), &s, &n),
                    BlockOutcome::Skipped(SkipReason::Rejected(Rejection::BareTime))
                );
                assert_eq!(
                    extract_event(&block("9-25 gym"), &s, &n),
                    BlockOutcome::Skipped(SkipReason::NoTime)
                );
            }

            #[test]
            fn separate_meridian_word_joins_the_time() {
                let n = TextNormalizer::default();
                let s = monday();
                let movie = extract_event(&block("7:00 PM Movie"), &s, &n);
                assert!(movie.is_emitted());
                let movie = movie.emitted().unwrap();
                assert_eq!(movie.when.to_string(), "7:00pm");
                assert_eq!(movie.title, "movie");

                let call = extract_event(&block("8 a.m. call grandma"), &s, &n)
                    .emitted()
                    .unwrap();
                assert_eq!(call.when.to_string(), "8:00am");
                assert_eq!(call.title, "call grandma");

                assert!(!extract_event(&block("9:00 AM"), &s, &n).is_emitted());
                assert_eq!(validate_title("pm"), Err(Rejection::BareTime));
                assert_eq!(validate_title("a.m."), Err(Rejection::BareTime));
            }

            #[test]
            fn events_sorted_by_time_of_day() {
                let n = TextNormalizer::default();
                let blocks = [
                    block("3pm pickup"),
                    block("12am feed baby"),
                    block("10:30-11:30am call"),
                    block("12pm lunch"),
                ];
                let titles: Vec<_> = extract_events(&blocks, &monday(), &n)
                    .into_iter()
                    .map(|e| e.title)
                    .collect();
                assert_eq!(titles, ["feed baby", "call", "lunch", "pickup"]);
            }

            #[test]
            fn event_inherits_section_date() {
                let n = TextNormalizer::default();
                let date = chrono::NaiveDate::from_ymd_opt(2025, 1, 6).unwrap();
                let section = monday().with_date(date);
                let event = extract_event(&block("8am breakfast"), &section, &n)
                    .emitted()
                    .unwrap();
                assert_eq!(event.date, Some(date));
            }
        }
    }

    pub mod todos {
        use super::{is_month_date_token, is_slash_date, is_todo_header};
        use crate::core::{
            BlockOutcome, Rejection, Section, SkipReason, TextBlock, Todo, TodoId, weekday_from_name,
        };
        use crate::lex::PResult;
        use crate::normalize::TextNormalizer;
        use chrono::NaiveTime;
        use nom::{
            branch::alt,
            character::complete::{char, digit1, one_of, satisfy, space0, space1},
            combinator::{eof, recognize, value},
            multi::many0,
            sequence::{delimited, terminated, tuple},
        };
        use tracing::debug;

        const BULLETS: &str = "-•◦▪▫◯☐☑✓✗×*";

        fn bullet(i: &str) -> PResult<'_, ()> {
            value((), terminated(one_of(BULLETS), space0))(i)
        }

        fn checkbox(i: &str) -> PResult<'_, ()> {
            value(
                (),
                terminated(
                    delimited(char('['), one_of(" xX-"), char(']')),
                    space0,
                ),
            )(i)
        }

        /// `1.` / `2)` / `a.` / `b)`, followed by a space or the end of the line.
        fn enumerator(i: &str) -> PResult<'_, ()> {
            let label = alt((
                recognize(digit1),
                recognize(satisfy(|c| c.is_ascii_lowercase())),
            ));
            value(
                (),
                tuple((label, one_of(".)"), alt((space1, eof)))),
            )(i)
        }

        /// Drop any leading run of list markers.
        pub fn strip_list_marker(line: &str) -> &str {
            let trimmed = line.trim();
            match many0(alt((checkbox, bullet, enumerator)))(trimmed) {
                Ok((rest, _)) => rest.trim(),
                Err(_) => trimmed,
            }
        }

        pub fn validate_todo_text(text: &str) -> Result<(), Rejection> {
            let t = text.trim();
            if t.chars().count() < 2 {
                return Err(Rejection::TooShort);
            }
            if !t.chars().any(char::is_alphabetic) {
                return Err(Rejection::NoLetters);
            }
            let lower = t.to_lowercase();
            if is_todo_header(&lower) {
                return Err(Rejection::TodoHeader);
            }
            if weekday_from_name(&lower).is_some() {
                return Err(Rejection::Weekday);
            }
            if is_month_date_token(&lower) || is_slash_date(t) {
                return Err(Rejection::DateToken);
            }
            Ok(())
        }

        /// One line of a todo-column block.
        pub fn todo_from_line(
            line: &str,
            block: &TextBlock,
            section: &Section,
            normalizer: &TextNormalizer,
            reminder_time: NaiveTime,
        ) -> BlockOutcome<Todo> {
            let original = line.trim();
            if original.is_empty() {
                return BlockOutcome::Skipped(SkipReason::Blank);
            }
            let text = normalizer.correct_words(strip_list_marker(original));
            let text = text.trim();
            if let Err(rejection) = validate_todo_text(text) {
                return BlockOutcome::Skipped(SkipReason::Rejected(rejection));
            }
            BlockOutcome::Emitted(Todo {
                id: TodoId::new(),
                text: text.to_string(),
                original_text: original.to_string(),
                day_date: section.date,
                day_name: section.day.clone(),
                reminder_time,
                confidence: block.confidence,
                bounds: block.bounding,
            })
        }

        pub fn extract_todos<'a, I>(
            blocks: I,
            section: &Section,
            normalizer: &TextNormalizer,
            reminder_time: NaiveTime,
        ) -> Vec<Todo>
        where
            I: IntoIterator<Item = &'a TextBlock>,
        {
            let mut todos = Vec::new();
            for block in blocks {
                if is_todo_header(&block.text) {
                    continue;
                }
                for line in block.text.lines() {
                    match todo_from_line(line, block, section, normalizer, reminder_time) {
                        BlockOutcome::Emitted(todo) => todos.push(todo),
                        BlockOutcome::Skipped(reason) => {
                            debug!(line, ?reason, day = %section.day, "no todo")
                        }
                    }
                }
            }
            todos
        }

        #[cfg(test)]
        mod tests {
            use super::*;
            use crate::core::{BoundingBox, default_reminder_time};
            use chrono::Weekday;

            fn block(text: &str) -> TextBlock {
                TextBlock::new(text, BoundingBox::new(50.0, 600.0, 200.0, 40.0))
            }

            #[test]
            fn strips_markers() {
                assert_eq!(strip_list_marker("- Call mom"), "Call mom");
                assert_eq!(strip_list_marker("• [x] Pay rent"), "Pay rent");
                assert_eq!(strip_list_marker("☐ groceries"), "groceries");
                assert_eq!(strip_list_marker("2) Email school"), "Email school");
                assert_eq!(strip_list_marker("b. Book flights"), "Book flights");
                assert_eq!(strip_list_marker("-Return library books"), "Return library books");
                // not an enumerator: no space after the dot
                assert_eq!(strip_list_marker("3.5 miles"), "3.5 miles");
                assert_eq!(strip_list_marker("Buy milk"), "Buy milk");
            }

            #[test]
            fn rejects_non_todo_lines() {
                assert_eq!(validate_todo_text("x"), Err(Rejection::TooShort));
                assert_eq!(validate_todo_text("12 34"), Err(Rejection::NoLetters));
                assert_eq!(validate_todo_text("Wednesday"), Err(Rejection::Weekday));
                assert_eq!(validate_todo_text("Jan 6th"), Err(Rejection::DateToken));
                assert_eq!(validate_todo_text("things to do"), Err(Rejection::TodoHeader));
                assert!(validate_todo_text("Call mom").is_ok());
                assert!(validate_todo_text("Buy 2 loaves").is_ok());
            }

            #[test]
            fn splits_lines_and_keeps_original_text() {
                let section = Section::new(Weekday::Mon, 0.0);
                let todos = extract_todos(
                    [&block("- Call mom\n• Pay rent\n\n7\n- Dentst forms")],
                    &section,
                    &TextNormalizer::default(),
                    default_reminder_time(),
                );
                let texts: Vec<_> = todos.iter().map(|t| t.text.as_str()).collect();
                assert_eq!(texts, ["Call mom", "Pay rent", "Dentist forms"]);
                assert_eq!(todos[0].original_text, "- Call mom");
                assert_eq!(todos[0].day_name, "Monday");
                assert_eq!(todos[0].reminder_time, default_reminder_time());
                assert_ne!(todos[0].id, todos[1].id);
            }

            #[test]
            fn header_block_is_skipped() {
                let todos = extract_todos(
                    [&block("Things to do")],
                    &Section::new(Weekday::Mon, 0.0),
                    &TextNormalizer::default(),
                    default_reminder_time(),
                );
                assert!(todos.is_empty());
            }
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn date_token_shapes() {
            assert!(is_slash_date("3/4"));
            assert!(is_slash_date("1/6/2025"));
            assert!(!is_slash_date("3/4 party"));
            assert!(is_month_date_token("jan"));
            assert!(is_month_date_token("january 6,"));
            assert!(is_month_date_token("6th feb"));
            assert!(!is_month_date_token("6 eggs"));
            assert!(!is_month_date_token("may day parade"));
        }

        #[test]
        fn header_phrase_ignores_spacing() {
            assert!(is_todo_header("things  to do"));
            assert!(!is_todo_header("things to do today"));
        }
    }
}

pub mod confidence {
    use crate::core::{QrData, Section};

    /// Page score when sections were found but nothing was extracted from them.
    pub const EMPTY_PAGE_CONFIDENCE: f64 = 0.3;
    pub const QR_BONUS: f64 = 0.1;
    pub const LAYOUT_MATCH_BONUS: f64 = 0.1;

    fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
        let (sum, count) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
        (count > 0).then(|| sum / count as f64)
    }

    /// Mean of event and todo confidence; an empty list counts as the section's base.
    pub fn section_confidence(section: &Section) -> f64 {
        let events = mean(section.events.iter().map(|e| e.confidence)).unwrap_or(section.confidence);
        let todos = mean(section.todos.iter().map(|t| t.confidence)).unwrap_or(section.confidence);
        (events + todos) / 2.0
    }

    pub fn page_confidence(sections: &[Section], qr: Option<&QrData>) -> f64 {
        if sections.is_empty() {
            return 0.0;
        }
        if sections.iter().all(|s| s.events.is_empty() && s.todos.is_empty()) {
            return EMPTY_PAGE_CONFIDENCE;
        }
        let mut score = mean(sections.iter().map(section_confidence)).unwrap_or_default();
        if let Some(qr) = qr {
            score += QR_BONUS;
            if sections.len() == qr.days_on_page as usize {
                score += LAYOUT_MATCH_BONUS;
            }
        }
        score.clamp(0.0, 1.0)
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use crate::core::{BoundingBox, Event, EventId, EventTime, ClockTime, Meridian};
        use chrono::Weekday;

        fn event(confidence: f64) -> Event {
            Event {
                id: EventId::new(),
                title: "gym".into(),
                when: EventTime::At(ClockTime::new(7, 0, Meridian::Am).unwrap()),
                confidence,
                bounds: BoundingBox::new(0.0, 0.0, 1.0, 1.0),
                date: None,
            }
        }

        #[test]
        fn floors() {
            assert_eq!(page_confidence(&[], None), 0.0);
            let empty = vec![Section::new(Weekday::Mon, 0.0)];
            assert_eq!(page_confidence(&empty, None), 0.3);
        }

        #[test]
        fn empty_list_falls_back_to_base() {
            let mut s = Section::new(Weekday::Mon, 0.0);
            s.confidence = 0.6;
            s.events.push(event(0.9));
            assert!((section_confidence(&s) - 0.75).abs() < 1e-9);
            assert!((page_confidence(&[s], None) - 0.75).abs() < 1e-9);
        }

        #[test]
        fn qr_bonuses_and_clamp() {
            let qr = crate::qr::QrDecoder::default()
                .decode_payload("01120250110")
                .unwrap();
            let sections: Vec<_> = [Weekday::Fri, Weekday::Sat, Weekday::Sun]
                .into_iter()
                .map(|d| {
                    let mut s = Section::new(d, 0.0);
                    s.confidence = 0.8;
                    s.events.push(event(0.8));
                    s
                })
                .collect();
            assert!((page_confidence(&sections, Some(&qr)) - 1.0).abs() < 1e-9);
            assert!((page_confidence(&sections[..2], Some(&qr)) - 0.9).abs() < 1e-9);

            let mut high = sections.clone();
            high[0].events[0].confidence = 1.0;
            high[0].confidence = 1.0;
            assert_eq!(page_confidence(&high, Some(&qr)), 1.0);
        }
    }
}

pub mod ocr {
    //! The OCR collaborator boundary.
    //!
    //! Providers turn image bytes into text blocks. Payload parsing accepts a
    //! plain block list, the `{success, data, error}` envelope, or a cloud Read
    //! response.

    use crate::core::{BoundingBox, DEFAULT_BLOCK_CONFIDENCE, TextBlock};
    use async_trait::async_trait;
    use serde::{Deserialize, Serialize};
    use tracing::{debug, warn};

    #[derive(Debug, thiserror::Error)]
    pub enum OcrError {
        #[error("OCR service failed: {0}")]
        Provider(String),
        #[error("unreadable OCR payload: {0}")]
        Payload(#[from] serde_json::Error),
        #[error("OCR response has no pages")]
        NoPages,
    }

    /// OCR provider trait
    #[async_trait]
    pub trait OcrProvider: Send + Sync {
        fn name(&self) -> &str;

        /// Recognize every text line on one page image.
        async fn recognize(&self, image: &[u8]) -> Result<Vec<TextBlock>, OcrError>;
    }

    /// Replays a fixed OCR result; the image bytes are ignored.
    #[derive(Debug, Clone)]
    pub struct RecordedOcr {
        result: Result<Vec<TextBlock>, String>,
    }

    impl RecordedOcr {
        pub fn new(blocks: Vec<TextBlock>) -> Self {
            Self { result: Ok(blocks) }
        }

        pub fn failing(message: impl Into<String>) -> Self {
            Self {
                result: Err(message.into()),
            }
        }
    }

    #[async_trait]
    impl OcrProvider for RecordedOcr {
        fn name(&self) -> &str {
            "recorded"
        }

        async fn recognize(&self, _image: &[u8]) -> Result<Vec<TextBlock>, OcrError> {
            self.result.clone().map_err(OcrError::Provider)
        }
    }

    /// Treats the "image" as a saved OCR response and parses it.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct JsonPayloadOcr;

    #[async_trait]
    impl OcrProvider for JsonPayloadOcr {
        fn name(&self) -> &str {
            "json-payload"
        }

        async fn recognize(&self, image: &[u8]) -> Result<Vec<TextBlock>, OcrError> {
            parse_blocks_payload(image)
        }
    }

    #[derive(Debug, Deserialize)]
    #[serde(untagged)]
    enum Payload {
        Blocks(Vec<TextBlock>),
        Envelope(Envelope),
        Read(ReadResponse),
    }

    #[derive(Debug, Deserialize)]
    struct Envelope {
        success: bool,
        #[serde(default)]
        data: Option<Vec<TextBlock>>,
        #[serde(default)]
        error: Option<String>,
    }

    pub fn parse_blocks_payload(bytes: &[u8]) -> Result<Vec<TextBlock>, OcrError> {
        match serde_json::from_slice::<Payload>(bytes)? {
            Payload::Blocks(blocks) => Ok(blocks),
            Payload::Envelope(Envelope {
                success: true,
                data,
                ..
            }) => Ok(data.unwrap_or_default()),
            Payload::Envelope(Envelope { error, .. }) => Err(OcrError::Provider(
                error.unwrap_or_else(|| "failed to extract text".to_string()),
            )),
            Payload::Read(response) => blocks_from_read_result(&response),
        }
    }

    /* --------------------------- cloud Read response --------------------------- */

    #[derive(Debug, Clone, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ReadResponse {
        pub analyze_result: AnalyzeResult,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct AnalyzeResult {
        #[serde(default)]
        pub read_results: Vec<ReadPage>,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ReadPage {
        #[serde(default)]
        pub page: Option<u32>,
        #[serde(default)]
        pub width: Option<f64>,
        #[serde(default)]
        pub height: Option<f64>,
        #[serde(default)]
        pub lines: Vec<ReadLine>,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ReadLine {
        pub text: String,
        /// Eight numbers: x,y of the four corners clockwise from top-left.
        pub bounding_box: Vec<f64>,
        #[serde(default)]
        pub confidence: Option<f64>,
    }

    /// Lines of the first page; a line's box becomes top/left/width/height.
    pub fn blocks_from_read_result(response: &ReadResponse) -> Result<Vec<TextBlock>, OcrError> {
        let page = response
            .analyze_result
            .read_results
            .first()
            .ok_or(OcrError::NoPages)?;
        let blocks: Vec<TextBlock> = page
            .lines
            .iter()
            .filter_map(|line| {
                let b = &line.bounding_box;
                if b.len() < 8 {
                    warn!(text = %line.text, "Read line without an 8-point box");
                    return None;
                }
                Some(TextBlock {
                    text: line.text.clone(),
                    confidence: line.confidence.unwrap_or(DEFAULT_BLOCK_CONFIDENCE),
                    bounding: BoundingBox::new(b[1], b[0], b[2] - b[0], b[7] - b[1]),
                })
            })
            .collect();
        debug!(lines = blocks.len(), "read result converted");
        Ok(blocks)
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn parses_plain_block_list() {
            let raw = br#"[{"text":"9am gym","confidence":0.7,"bounding":{"top":1,"left":2,"width":3,"height":4}}]"#;
            let blocks = parse_blocks_payload(raw).unwrap();
            assert_eq!(blocks.len(), 1);
            assert_eq!(blocks[0].confidence, 0.7);
        }

        #[test]
        fn failed_envelope_is_an_error() {
            let raw = br#"{"success":false,"error":"quota exceeded"}"#;
            match parse_blocks_payload(raw) {
                Err(OcrError::Provider(msg)) => assert_eq!(msg, "quota exceeded"),
                other => panic!("expected provider error, got {other:?}"),
            }
            let ok = br#"{"success":true,"data":[]}"#;
            assert!(parse_blocks_payload(ok).unwrap().is_empty());
        }

        #[test]
        fn converts_read_lines() {
            let raw = br#"{"analyzeResult":{"readResults":[{"page":1,"lines":[
                {"text":"Monday","boundingBox":[10,20,110,20,110,50,10,50]},
                {"text":"broken","boundingBox":[1,2]}
            ]}]}}"#;
            let blocks = parse_blocks_payload(raw).unwrap();
            assert_eq!(blocks.len(), 1);
            assert_eq!(blocks[0].bounding, BoundingBox::new(20.0, 10.0, 100.0, 30.0));
            assert_eq!(blocks[0].confidence, DEFAULT_BLOCK_CONFIDENCE);
        }

        #[test]
        fn read_without_pages_fails() {
            let raw = br#"{"analyzeResult":{"readResults":[]}}"#;
            assert!(matches!(parse_blocks_payload(raw), Err(OcrError::NoPages)));
        }

        #[tokio::test]
        async fn recorded_provider_replays() {
            let ocr = RecordedOcr::failing("camera offline");
            assert!(matches!(ocr.recognize(&[]).await, Err(OcrError::Provider(_))));
        }
    }
}

pub mod config {
    use crate::core::{default_reminder_time, hour_minute};
    use crate::normalize::TextNormalizer;
    use chrono::{FixedOffset, NaiveTime, Offset, TimeDelta, Utc};
    use indexmap::IndexMap;
    use serde::{Deserialize, Serialize};
    use std::path::{Path, PathBuf};

    pub const DEFAULT_EVENT_MINUTES: i64 = 60;
    /// Longest duration given to an event written without an end time: one week.
    pub const MAX_EVENT_MINUTES: i64 = 7 * 24 * 60;

    /// Processing and sync settings. Nothing is read from the host's locale or clock zone.
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(default, rename_all = "camelCase")]
    pub struct ProcessorConfig {
        /// IANA zone name reported in page metadata and given to created events.
        pub timezone: String,
        /// Offset used to place page dates on the calendar.
        #[serde(rename = "utcOffsetSeconds", with = "serde_fixed_offset")]
        pub utc_offset: FixedOffset,
        pub page_width: Option<f64>,
        pub page_height: Option<f64>,
        /// Fraction of page width where the todo column begins.
        pub todo_column_split: f64,
        pub proper_names: Vec<String>,
        pub extra_corrections: IndexMap<String, String>,
        pub default_event_minutes: i64,
        pub alarm_offset_minutes: i64,
        #[serde(with = "hour_minute")]
        pub reminder_time: NaiveTime,
    }

    impl Default for ProcessorConfig {
        fn default() -> Self {
            Self {
                timezone: "UTC".to_string(),
                utc_offset: Utc.fix(),
                page_width: None,
                page_height: None,
                todo_column_split: 0.5,
                proper_names: vec!["Rane".to_string()],
                extra_corrections: IndexMap::new(),
                default_event_minutes: DEFAULT_EVENT_MINUTES,
                alarm_offset_minutes: -30,
                reminder_time: default_reminder_time(),
            }
        }
    }

    #[derive(Debug, thiserror::Error)]
    pub enum ConfigError {
        #[error("failed to read config {path}: {source}")]
        Read {
            path: PathBuf,
            #[source]
            source: std::io::Error,
        },
        #[error("invalid config {path}: {source}")]
        Parse {
            path: PathBuf,
            #[source]
            source: serde_json::Error,
        },
        #[error("invalid `{field}` in config: {reason}")]
        Invalid { field: &'static str, reason: String },
    }

    impl ProcessorConfig {
        pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
            let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;
            let config: Self = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
            config.validate()?;
            Ok(config)
        }

        /// Range checks serde cannot express.
        pub fn validate(&self) -> Result<(), ConfigError> {
            if !(1..=MAX_EVENT_MINUTES).contains(&self.default_event_minutes) {
                return Err(ConfigError::Invalid {
                    field: "defaultEventMinutes",
                    reason: format!(
                        "{} is outside 1..={MAX_EVENT_MINUTES}",
                        self.default_event_minutes
                    ),
                });
            }
            if !(-MAX_EVENT_MINUTES..=MAX_EVENT_MINUTES).contains(&self.alarm_offset_minutes) {
                return Err(ConfigError::Invalid {
                    field: "alarmOffsetMinutes",
                    reason: format!("{} is more than a week away", self.alarm_offset_minutes),
                });
            }
            if !(0.0..=1.0).contains(&self.todo_column_split) {
                return Err(ConfigError::Invalid {
                    field: "todoColumnSplit",
                    reason: format!("{} is not a fraction of the page width", self.todo_column_split),
                });
            }
            Ok(())
        }

        /// Duration of an event without an end time. Out-of-range values fall back to the default.
        pub fn default_event_duration(&self) -> TimeDelta {
            TimeDelta::try_minutes(self.default_event_minutes)
                .filter(|_| (1..=MAX_EVENT_MINUTES).contains(&self.default_event_minutes))
                .unwrap_or(TimeDelta::minutes(DEFAULT_EVENT_MINUTES))
        }

        /// Normalizer carrying the configured proper names and extra corrections.
        pub fn normalizer(&self) -> TextNormalizer {
            TextNormalizer::new(self.proper_names.iter().cloned())
                .with_extra_corrections(self.extra_corrections.iter().map(|(k, v)| (k, v.clone())))
        }
    }

    mod serde_fixed_offset {
        use chrono::FixedOffset;
        use serde::{Deserialize, Deserializer, Serializer, de::Error};

        pub fn serialize<S>(value: &FixedOffset, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            serializer.serialize_i32(value.local_minus_utc())
        }

        pub fn deserialize<'de, D>(deserializer: D) -> Result<FixedOffset, D::Error>
        where
            D: Deserializer<'de>,
        {
            let secs = i32::deserialize(deserializer)?;
            FixedOffset::east_opt(secs)
                .ok_or_else(|| D::Error::custom(format!("utc offset {secs}s out of range")))
        }
    }

}

pub mod processor {
    //! Page orchestration: OCR, QR decode, sections, extraction, scoring.

    use crate::config::ProcessorConfig;
    use crate::confidence::page_confidence;
    use crate::core::{PageGeometry, PageMetadata, PageResult, TextBlock};
    use crate::extract::{events::extract_events, todos::extract_todos};
    use crate::normalize::TextNormalizer;
    use crate::ocr::{OcrError, OcrProvider};
    use crate::qr::{QrDecoder, TemplateRegistry};
    use crate::sections::{LayoutStrategy, parse_day_header, section_index_for};
    use chrono::Utc;
    use serde::{Deserialize, Serialize};
    use tracing::{debug, info};

    /// Failures that abort a page. Everything else is a silent per-block skip.
    #[derive(Debug, thiserror::Error)]
    pub enum ProcessError {
        #[error("failed to extract text: {0}")]
        Ocr(#[from] OcrError),
        #[error("OCR returned no text blocks")]
        NoBlocks,
    }

    /// `{success: true, data}` or `{success: false, error}`.
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct PageResponse {
        pub success: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub data: Option<PageResult>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub error: Option<String>,
    }

    impl From<Result<PageResult, ProcessError>> for PageResponse {
        fn from(result: Result<PageResult, ProcessError>) -> Self {
            match result {
                Ok(page) => Self {
                    success: true,
                    data: Some(page),
                    error: None,
                },
                Err(err) => Self {
                    success: false,
                    data: None,
                    error: Some(err.to_string()),
                },
            }
        }
    }

    /// The synchronous part of the pipeline, from text blocks to a page result.
    #[derive(Debug, Clone)]
    pub struct PageInterpreter {
        config: ProcessorConfig,
        normalizer: TextNormalizer,
        decoder: QrDecoder,
    }

    impl Default for PageInterpreter {
        fn default() -> Self {
            Self::new(ProcessorConfig::default())
        }
    }

    impl PageInterpreter {
        pub fn new(config: ProcessorConfig) -> Self {
            Self {
                normalizer: config.normalizer(),
                decoder: QrDecoder::default(),
                config,
            }
        }

        pub fn with_registry(mut self, registry: TemplateRegistry) -> Self {
            self.decoder = QrDecoder::new(registry);
            self
        }

        pub fn add_proper_name(&mut self, name: impl Into<String>) {
            self.normalizer.add_proper_name(name);
        }

        pub fn config(&self) -> &ProcessorConfig {
            &self.config
        }

        pub fn decoder(&self) -> &QrDecoder {
            &self.decoder
        }

        pub fn process_blocks(&self, blocks: &[TextBlock]) -> Result<PageResult, ProcessError> {
            if blocks.is_empty() {
                return Err(ProcessError::NoBlocks);
            }
            let cfg = &self.config;
            let year = detect_year(blocks);
            let page = PageGeometry::resolve(blocks, cfg.page_width, cfg.page_height);
            let qr = self.decoder.process_qr_from_ocr_results(blocks, &page);
            match &qr {
                Some(qr) => info!(template = %qr.template_code, start = %qr.start_date, days = qr.days_on_page, "QR decoded"),
                None => info!("no QR payload; detecting day headers"),
            }

            let strategy = LayoutStrategy::select(qr.as_ref());
            let mut sections = strategy.build_sections(blocks, &page, &self.normalizer, year);

            let mut ordered: Vec<&TextBlock> = blocks
                .iter()
                .filter(|b| !self.is_structural(b, qr.as_ref(), &page))
                .collect();
            ordered.sort_by(|a, b| a.top().total_cmp(&b.top()));

            let split_x = page.width * cfg.todo_column_split;
            let mut calendar_column = vec![Vec::new(); sections.len()];
            let mut todo_column = vec![Vec::new(); sections.len()];
            for block in ordered {
                let Some(idx) = section_index_for(&sections, block.top()) else {
                    debug!(text = %block.text, top = block.top(), "block above first section");
                    continue;
                };
                if block.bounding.center_x() > split_x {
                    todo_column[idx].push(block);
                } else {
                    calendar_column[idx].push(block);
                }
            }

            for idx in 0..sections.len() {
                let events = extract_events(
                    calendar_column[idx].iter().copied(),
                    &sections[idx],
                    &self.normalizer,
                );
                let todos = extract_todos(
                    todo_column[idx].iter().copied(),
                    &sections[idx],
                    &self.normalizer,
                    cfg.reminder_time,
                );
                let section = &mut sections[idx];
                section.events.extend(events);
                section.todos.extend(todos);
                debug!(day = %section.day, events = section.events.len(), todos = section.todos.len(), "section filled");
            }

            let confidence = page_confidence(&sections, qr.as_ref());
            let result = PageResult {
                year,
                metadata: PageMetadata {
                    processed_at: Utc::now(),
                    timezone: cfg.timezone.clone(),
                    confidence,
                    template_code: qr.as_ref().map(|q| q.template_code.clone()),
                    page_type: qr.as_ref().map(|q| q.page_type),
                    start_date: qr.as_ref().map(|q| q.start_date),
                    qr_data: qr,
                },
                sections,
            };
            info!(
                sections = result.sections.len(),
                events = result.event_count(),
                todos = result.todo_count(),
                confidence,
                "page processed"
            );
            Ok(result)
        }

        /// Headers, the year, the todo heading, and the QR payload carry no items.
        fn is_structural(
            &self,
            block: &TextBlock,
            qr: Option<&crate::core::QrData>,
            page: &PageGeometry,
        ) -> bool {
            let text = block.text.trim();
            text.is_empty()
                || parse_year(text).is_some()
                || crate::extract::is_todo_header(text)
                || parse_day_header(&self.normalizer.correct_words(text)).is_some()
                || self.decoder.is_qr_block(block, qr, page)
        }
    }

    /// `2025` on its own line.
    fn parse_year(text: &str) -> Option<i32> {
        (text.len() == 4 && text.starts_with("20") && text.chars().all(|c| c.is_ascii_digit()))
            .then(|| text.parse().ok())
            .flatten()
    }

    fn detect_year(blocks: &[TextBlock]) -> Option<i32> {
        blocks.iter().find_map(|b| parse_year(b.text.trim()))
    }

    /// OCR plus interpretation for one photographed page.
    pub struct PlannerTextProcessor<P> {
        ocr: P,
        interpreter: PageInterpreter,
    }

    impl<P: OcrProvider> PlannerTextProcessor<P> {
        pub fn new(ocr: P, config: ProcessorConfig) -> Self {
            Self {
                ocr,
                interpreter: PageInterpreter::new(config),
            }
        }

        pub fn interpreter(&self) -> &PageInterpreter {
            &self.interpreter
        }

        pub fn interpreter_mut(&mut self) -> &mut PageInterpreter {
            &mut self.interpreter
        }

        /// OCR failure aborts the page; no partial result is produced.
        pub async fn process_page(&self, image: &[u8]) -> Result<PageResult, ProcessError> {
            info!(provider = self.ocr.name(), bytes = image.len(), "recognizing page");
            let blocks = self.ocr.recognize(image).await?;
            debug!(blocks = blocks.len(), "OCR complete");
            self.interpreter.process_blocks(&blocks)
        }

        pub async fn respond(&self, image: &[u8]) -> PageResponse {
            self.process_page(image).await.into()
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use crate::core::BoundingBox;
        use crate::ocr::RecordedOcr;
        use chrono::NaiveDate;

        fn block(text: &str, top: f64, left: f64) -> TextBlock {
            TextBlock::new(text, BoundingBox::new(top, left, 200.0, 30.0))
        }

        fn wide_page() -> ProcessorConfig {
            ProcessorConfig {
                page_width: Some(1000.0),
                ..ProcessorConfig::default()
            }
        }

        #[test]
        fn header_page_end_to_end() {
            let blocks = vec![
                block("Monday, 6 January", 0.0, 0.0),
                block("9:00am Dentist", 50.0, 0.0),
                block("things to do", 0.0, 600.0),
                block("- Call mom", 50.0, 600.0),
            ];
            let page = PageInterpreter::new(wide_page()).process_blocks(&blocks).unwrap();
            assert_eq!(page.sections.len(), 1);
            let monday = &page.sections[0];
            assert_eq!(monday.day, "Monday");
            assert_eq!(monday.events.len(), 1);
            assert_eq!(monday.events[0].title, "dentist");
            assert_eq!(monday.events[0].when.to_string(), "9:00am");
            assert_eq!(monday.todos.len(), 1);
            assert_eq!(monday.todos[0].text, "Call mom");
            assert!(page.metadata.qr_data.is_none());
            assert_eq!(page.metadata.timezone, "UTC");
        }

        #[test]
        fn template_page_end_to_end() {
            let blocks = vec![
                block("2025", 5.0, 10.0),
                block("7am breakfast w/ Rane", 40.0, 10.0),
                block("6-7:30pm socr practce", 300.0, 10.0),
                block("Things to do", 5.0, 700.0),
                block("1. Pay water bill", 320.0, 700.0),
                block("01020250106", 840.0, 450.0),
            ];
            let page = PageInterpreter::new(ProcessorConfig {
                page_width: Some(1000.0),
                page_height: Some(1000.0),
                ..ProcessorConfig::default()
            })
            .process_blocks(&blocks)
            .unwrap();

            assert_eq!(page.year, Some(2025));
            assert_eq!(page.metadata.template_code.as_deref(), Some("01"));
            assert_eq!(page.metadata.page_type, Some(0));
            assert_eq!(page.sections.len(), 4);

            let monday = &page.sections[0];
            assert_eq!(monday.date, NaiveDate::from_ymd_opt(2025, 1, 6));
            assert_eq!(monday.events[0].title, "breakfast w/ Rane");
            assert_eq!(monday.events[0].when.to_string(), "7:00am");

            let tuesday = &page.sections[1];
            assert_eq!(tuesday.day, "Tuesday");
            assert_eq!(tuesday.events[0].title, "soccer practice");
            assert_eq!(tuesday.events[0].when.to_string(), "6:00pm-7:30pm");
            assert_eq!(tuesday.todos[0].text, "Pay water bill");
            assert_eq!(tuesday.todos[0].day_date, NaiveDate::from_ymd_opt(2025, 1, 7));

            // the payload block is not page content
            assert!(page.sections.iter().all(|s| s.todos.iter().all(|t| !t.text.contains("0102"))));
            assert!(page.metadata.confidence > 0.9);
        }

        #[test]
        fn todo_mentioning_the_heading_phrase_is_kept() {
            let blocks = vec![
                block("Monday", 0.0, 0.0),
                block("Things to do", 0.0, 600.0),
                block("- list things to do for trip", 50.0, 600.0),
            ];
            let page = PageInterpreter::new(wide_page()).process_blocks(&blocks).unwrap();
            let texts: Vec<_> = page.todos().map(|(_, t)| t.text.as_str()).collect();
            assert_eq!(texts, ["list things to do for trip"]);
        }

        #[test]
        fn extra_template_decodes_through_registry() {
            let registry = TemplateRegistry::new([
                crate::qr::Template {
                    code: "01".into(),
                    name: "Standard Weekly".into(),
                    left_days: 4,
                    right_days: 3,
                    sections: vec!["calendar".into(), "todos".into()],
                },
                crate::qr::Template {
                    code: "02".into(),
                    name: "Long Weekend".into(),
                    left_days: 2,
                    right_days: 1,
                    sections: vec!["calendar".into()],
                },
            ]);
            assert!(PageInterpreter::default().decoder().decode_payload("02120250110").is_err());

            let interpreter = PageInterpreter::new(ProcessorConfig {
                page_width: Some(1000.0),
                page_height: Some(1000.0),
                ..ProcessorConfig::default()
            })
            .with_registry(registry);
            let blocks = vec![
                block("4pm haircut", 100.0, 10.0),
                block("02120250110", 840.0, 450.0),
            ];
            let page = interpreter.process_blocks(&blocks).unwrap();
            assert_eq!(page.metadata.template_code.as_deref(), Some("02"));
            assert_eq!(page.sections.len(), 1);
            assert_eq!(page.sections[0].day, "Friday");
            assert_eq!(page.sections[0].events[0].title, "haircut");
        }

        #[test]
        fn empty_block_list_is_fatal() {
            let err = PageInterpreter::default().process_blocks(&[]).unwrap_err();
            assert!(matches!(err, ProcessError::NoBlocks));
        }

        #[test]
        fn page_without_sections_scores_zero() {
            let blocks = vec![block("9:00am dentist", 0.0, 0.0)];
            let page = PageInterpreter::default().process_blocks(&blocks).unwrap();
            assert!(page.sections.is_empty());
            assert_eq!(page.metadata.confidence, 0.0);
        }

        #[test]
        fn sections_without_items_score_floor() {
            let blocks = vec![block("Monday", 0.0, 0.0), block("Tuesday", 100.0, 0.0)];
            let page = PageInterpreter::default().process_blocks(&blocks).unwrap();
            assert_eq!(page.sections.len(), 2);
            assert_eq!(page.metadata.confidence, 0.3);
        }

        #[test]
        fn response_serializes_contract_shape() {
            let failed = PageResponse::from(Err(ProcessError::NoBlocks));
            let json = serde_json::to_value(&failed).unwrap();
            assert_eq!(json["success"], false);
            assert!(json.get("data").is_none());
            assert_eq!(json["error"], "OCR returned no text blocks");
        }

        #[tokio::test]
        async fn ocr_failure_aborts_page() {
            let processor = PlannerTextProcessor::new(
                RecordedOcr::failing("service unavailable"),
                ProcessorConfig::default(),
            );
            let response = processor.respond(b"jpeg").await;
            assert!(!response.success);
            assert!(response.data.is_none());
            assert_eq!(
                response.error.as_deref(),
                Some("failed to extract text: OCR service failed: service unavailable")
            );
        }

        #[tokio::test]
        async fn recorded_blocks_flow_through() {
            let processor = PlannerTextProcessor::new(
                RecordedOcr::new(vec![
                    block("Friday", 0.0, 0.0),
                    block("4pm haircut", 40.0, 0.0),
                ]),
                ProcessorConfig::default(),
            );
            let page = processor.process_page(&[]).await.unwrap();
            assert_eq!(page.event_count(), 1);
            assert_eq!(page.sections[0].events[0].title, "haircut");
        }

        #[tokio::test]
        async fn proper_names_added_after_construction_apply() {
            let mut processor = PlannerTextProcessor::new(
                RecordedOcr::new(vec![
                    block("Friday", 0.0, 0.0),
                    block("4pm call ollie", 40.0, 0.0),
                ]),
                ProcessorConfig::default(),
            );
            processor.interpreter_mut().add_proper_name("Ollie");
            let page = processor.process_page(&[]).await.unwrap();
            assert_eq!(page.sections[0].events[0].title, "call Ollie");
        }
    }
}

pub mod calendar {
    //! The external calendar/reminder store, plus a JSON-file backed implementation.

    use async_trait::async_trait;
    use chrono::{DateTime, FixedOffset};
    use serde::{Deserialize, Serialize};
    use std::path::{Path, PathBuf};
    use tokio::sync::Mutex;
    use tracing::debug;
    use uuid::Uuid;

    #[derive(Debug, thiserror::Error)]
    pub enum CalendarError {
        #[error("unknown calendar `{0}`")]
        UnknownCalendar(String),
        #[error("unknown reminder list `{0}`")]
        UnknownList(String),
        #[error("unknown event `{0}`")]
        UnknownEvent(String),
        #[error("calendar store unavailable: {0}")]
        Unavailable(String),
        #[error("failed to access calendar store {path}: {source}")]
        Io {
            path: PathBuf,
            #[source]
            source: std::io::Error,
        },
        #[error("calendar store {path} is not valid JSON: {source}")]
        Json {
            path: PathBuf,
            #[source]
            source: serde_json::Error,
        },
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Alarm {
        /// Minutes relative to the event start; negative is before.
        pub relative_offset: i64,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct CalendarEvent {
        pub id: String,
        pub calendar_id: String,
        pub title: String,
        pub start_date: DateTime<FixedOffset>,
        pub end_date: DateTime<FixedOffset>,
        pub time_zone: String,
        #[serde(default)]
        pub alarms: Vec<Alarm>,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct NewCalendarEvent {
        pub title: String,
        pub start_date: DateTime<FixedOffset>,
        pub end_date: DateTime<FixedOffset>,
        pub time_zone: String,
        #[serde(default)]
        pub alarms: Vec<Alarm>,
    }

    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct ReminderList {
        pub id: String,
        pub title: String,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Reminder {
        pub id: String,
        pub list_id: String,
        pub title: String,
        pub due_date: DateTime<FixedOffset>,
        #[serde(default)]
        pub notes: Option<String>,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct NewReminder {
        pub title: String,
        pub due_date: DateTime<FixedOffset>,
        pub notes: Option<String>,
    }

    /// Query by date range, create, delete. Every call is one awaited round trip.
    #[async_trait]
    pub trait CalendarStore: Send + Sync {
        async fn query_events(
            &self,
            calendar_id: &str,
            start: DateTime<FixedOffset>,
            end: DateTime<FixedOffset>,
        ) -> Result<Vec<CalendarEvent>, CalendarError>;

        async fn create_event(
            &self,
            calendar_id: &str,
            event: NewCalendarEvent,
        ) -> Result<String, CalendarError>;

        async fn delete_event(&self, id: &str) -> Result<(), CalendarError>;

        async fn query_reminder_lists(&self) -> Result<Vec<ReminderList>, CalendarError>;

        async fn create_reminder(
            &self,
            list_id: &str,
            reminder: NewReminder,
        ) -> Result<String, CalendarError>;

        async fn query_reminders(
            &self,
            list_id: &str,
            start: DateTime<FixedOffset>,
            end: DateTime<FixedOffset>,
        ) -> Result<Vec<Reminder>, CalendarError>;
    }

    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    #[serde(default, rename_all = "camelCase")]
    struct StoreState {
        calendars: Vec<String>,
        events: Vec<CalendarEvent>,
        reminder_lists: Vec<ReminderList>,
        reminders: Vec<Reminder>,
    }

    pub const DEFAULT_REMINDER_LIST: &str = "reminders";

    /// In-process store, optionally persisted as one JSON document.
    #[derive(Debug)]
    pub struct MemoryCalendarStore {
        state: Mutex<StoreState>,
    }

    impl Default for MemoryCalendarStore {
        fn default() -> Self {
            Self::from_state(StoreState::default())
        }
    }

    impl MemoryCalendarStore {
        pub fn new() -> Self {
            Self::default()
        }

        fn from_state(mut state: StoreState) -> Self {
            if state.reminder_lists.is_empty() {
                state.reminder_lists.push(ReminderList {
                    id: DEFAULT_REMINDER_LIST.to_string(),
                    title: "General Reminders".to_string(),
                });
            }
            Self {
                state: Mutex::new(state),
            }
        }

        pub fn with_calendar(self, calendar_id: impl Into<String>) -> Self {
            let calendar_id = calendar_id.into();
            let mut state = self.state.into_inner();
            if !state.calendars.contains(&calendar_id) {
                state.calendars.push(calendar_id);
            }
            Self::from_state(state)
        }

        pub async fn ensure_calendar(&self, calendar_id: &str) {
            let mut state = self.state.lock().await;
            if !state.calendars.iter().any(|c| c == calendar_id) {
                state.calendars.push(calendar_id.to_string());
            }
        }

        /// Missing files start empty.
        pub fn load(path: &Path) -> Result<Self, CalendarError> {
            if !path.exists() {
                debug!(path = %path.display(), "no store file yet");
                return Ok(Self::default());
            }
            let raw = std::fs::read_to_string(path).map_err(|source| CalendarError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            let state = serde_json::from_str(&raw).map_err(|source| CalendarError::Json {
                path: path.to_path_buf(),
                source,
            })?;
            Ok(Self::from_state(state))
        }

        pub async fn save(&self, path: &Path) -> Result<(), CalendarError> {
            let state = self.state.lock().await;
            let json = serde_json::to_string_pretty(&*state).map_err(|source| CalendarError::Json {
                path: path.to_path_buf(),
                source,
            })?;
            std::fs::write(path, json).map_err(|source| CalendarError::Io {
                path: path.to_path_buf(),
                source,
            })
        }

        pub async fn events(&self) -> Vec<CalendarEvent> {
            self.state.lock().await.events.clone()
        }

        pub async fn reminders(&self) -> Vec<Reminder> {
            self.state.lock().await.reminders.clone()
        }
    }

    #[async_trait]
    impl CalendarStore for MemoryCalendarStore {
        async fn query_events(
            &self,
            calendar_id: &str,
            start: DateTime<FixedOffset>,
            end: DateTime<FixedOffset>,
        ) -> Result<Vec<CalendarEvent>, CalendarError> {
            let state = self.state.lock().await;
            if !state.calendars.iter().any(|c| c == calendar_id) {
                return Err(CalendarError::UnknownCalendar(calendar_id.to_string()));
            }
            Ok(state
                .events
                .iter()
                .filter(|e| e.calendar_id == calendar_id && e.start_date >= start && e.start_date <= end)
                .cloned()
                .collect())
        }

        async fn create_event(
            &self,
            calendar_id: &str,
            event: NewCalendarEvent,
        ) -> Result<String, CalendarError> {
            let mut state = self.state.lock().await;
            if !state.calendars.iter().any(|c| c == calendar_id) {
                return Err(CalendarError::UnknownCalendar(calendar_id.to_string()));
            }
            let id = Uuid::new_v4().to_string();
            state.events.push(CalendarEvent {
                id: id.clone(),
                calendar_id: calendar_id.to_string(),
                title: event.title,
                start_date: event.start_date,
                end_date: event.end_date,
                time_zone: event.time_zone,
                alarms: event.alarms,
            });
            Ok(id)
        }

        async fn delete_event(&self, id: &str) -> Result<(), CalendarError> {
            let mut state = self.state.lock().await;
            let before = state.events.len();
            state.events.retain(|e| e.id != id);
            if state.events.len() == before {
                return Err(CalendarError::UnknownEvent(id.to_string()));
            }
            Ok(())
        }

        async fn query_reminder_lists(&self) -> Result<Vec<ReminderList>, CalendarError> {
            Ok(self.state.lock().await.reminder_lists.clone())
        }

        async fn create_reminder(
            &self,
            list_id: &str,
            reminder: NewReminder,
        ) -> Result<String, CalendarError> {
            let mut state = self.state.lock().await;
            if !state.reminder_lists.iter().any(|l| l.id == list_id) {
                return Err(CalendarError::UnknownList(list_id.to_string()));
            }
            let id = Uuid::new_v4().to_string();
            state.reminders.push(Reminder {
                id: id.clone(),
                list_id: list_id.to_string(),
                title: reminder.title,
                due_date: reminder.due_date,
                notes: reminder.notes,
            });
            Ok(id)
        }

        async fn query_reminders(
            &self,
            list_id: &str,
            start: DateTime<FixedOffset>,
            end: DateTime<FixedOffset>,
        ) -> Result<Vec<Reminder>, CalendarError> {
            let state = self.state.lock().await;
            Ok(state
                .reminders
                .iter()
                .filter(|r| r.list_id == list_id && r.due_date >= start && r.due_date <= end)
                .cloned()
                .collect())
        }
    }

}

pub mod sync {
    //! Writing a page's events and todos into a calendar store.
    //!
    //! Items are handled one at a time: one day query, then at most one write.
    //! A failing item is recorded in the summary and the batch continues.

    use crate::calendar::{
        Alarm, CalendarError, CalendarEvent, CalendarStore, NewCalendarEvent, NewReminder,
        ReminderList,
    };
    use crate::config::ProcessorConfig;
    use crate::core::{ClockTime, EventTime, PageResult};
    use crate::normalize::fold_title;
    use chrono::{DateTime, Days, Duration, FixedOffset, NaiveDate, NaiveTime, Timelike};
    use serde::{Deserialize, Serialize};
    use std::collections::HashSet;
    use tracing::{debug, info, warn};

    #[derive(Debug, Clone, PartialEq)]
    pub struct SyncOptions {
        pub calendar_id: String,
        pub time_zone: String,
        pub offset: FixedOffset,
        pub default_duration: Duration,
        pub alarm_offset_minutes: i64,
    }

    impl SyncOptions {
        pub fn from_config(calendar_id: impl Into<String>, config: &ProcessorConfig) -> Self {
            Self {
                calendar_id: calendar_id.into(),
                time_zone: config.timezone.clone(),
                offset: config.utc_offset,
                default_duration: config.default_event_duration(),
                alarm_offset_minutes: config.alarm_offset_minutes,
            }
        }
    }

    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ItemError {
        pub title: String,
        pub message: String,
    }

    impl ItemError {
        fn new(title: &str, message: impl ToString) -> Self {
            Self {
                title: title.to_string(),
                message: message.to_string(),
            }
        }
    }

    #[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ImportSummary {
        pub created: usize,
        pub duplicates: usize,
        pub errors: Vec<ItemError>,
    }

    #[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ReminderSummary {
        pub created: usize,
        pub duplicates: usize,
        pub errors: Vec<ItemError>,
    }

    fn local(date: NaiveDate, time: NaiveTime, offset: FixedOffset) -> Option<DateTime<FixedOffset>> {
        date.and_time(time).and_local_timezone(offset).single()
    }

    /// 00:00:00 through 23:59:59 of `date` in `offset`.
    pub fn day_bounds(
        date: NaiveDate,
        offset: FixedOffset,
    ) -> Option<(DateTime<FixedOffset>, DateTime<FixedOffset>)> {
        let last = NaiveTime::from_hms_opt(23, 59, 59)?;
        Some((local(date, NaiveTime::MIN, offset)?, local(date, last, offset)?))
    }

    /// Start and end of an event; a range ending at or before its start ends the next day.
    pub fn event_span(
        date: NaiveDate,
        when: &EventTime,
        opts: &SyncOptions,
    ) -> Option<(DateTime<FixedOffset>, DateTime<FixedOffset>)> {
        let start = local(date, when.start().to_naive_time(), opts.offset)?;
        let end = match when.end() {
            Some(end) => {
                let end = local(date, end.to_naive_time(), opts.offset)?;
                if end <= start {
                    end.checked_add_days(Days::new(1))?
                } else {
                    end
                }
            }
            None => start.checked_add_signed(opts.default_duration)?,
        };
        Some((start, end))
    }

    fn same_clock(a: &DateTime<FixedOffset>, b: &DateTime<FixedOffset>) -> bool {
        let a = a.with_timezone(&b.timezone());
        a.hour() == b.hour() && a.minute() == b.minute()
    }

    /// Same folded title and the same hour and minute.
    pub fn is_duplicate_event(existing: &[CalendarEvent], title: &str, start: &DateTime<FixedOffset>) -> bool {
        let title = fold_title(title);
        existing
            .iter()
            .any(|e| fold_title(&e.title) == title && same_clock(&e.start_date, start))
    }

    pub async fn import_events<S>(store: &S, page: &PageResult, opts: &SyncOptions) -> ImportSummary
    where
        S: CalendarStore + ?Sized,
    {
        let mut summary = ImportSummary::default();
        for (section, event) in page.events() {
            let Some(date) = event.date.or(section.date) else {
                summary
                    .errors
                    .push(ItemError::new(&event.title, format!("{} has no date", section.day)));
                continue;
            };
            let (Some((start, end)), Some((day_start, day_end))) =
                (event_span(date, &event.when, opts), day_bounds(date, opts.offset))
            else {
                summary
                    .errors
                    .push(ItemError::new(&event.title, format!("cannot place {date} on the calendar")));
                continue;
            };

            let existing = match store.query_events(&opts.calendar_id, day_start, day_end).await {
                Ok(events) => events,
                Err(err) => {
                    warn!(%err, title = %event.title, "duplicate check failed; creating anyway");
                    vec![]
                }
            };
            if is_duplicate_event(&existing, &event.title, &start) {
                debug!(title = %event.title, %date, "already on calendar");
                summary.duplicates += 1;
                continue;
            }

            let new_event = NewCalendarEvent {
                title: event.title.clone(),
                start_date: start,
                end_date: end,
                time_zone: opts.time_zone.clone(),
                alarms: vec![Alarm {
                    relative_offset: opts.alarm_offset_minutes,
                }],
            };
            match store.create_event(&opts.calendar_id, new_event).await {
                Ok(id) => {
                    debug!(%id, title = %event.title, "event created");
                    summary.created += 1;
                }
                Err(err) => summary.errors.push(ItemError::new(&event.title, err)),
            }
        }
        info!(
            created = summary.created,
            duplicates = summary.duplicates,
            errors = summary.errors.len(),
            "events imported"
        );
        summary
    }

    /// The preferred list when present, else the store's first list.
    pub async fn resolve_reminder_list<S>(
        store: &S,
        preferred: Option<&str>,
    ) -> Result<ReminderList, CalendarError>
    where
        S: CalendarStore + ?Sized,
    {
        let lists = store.query_reminder_lists().await?;
        match preferred {
            Some(id) => lists
                .into_iter()
                .find(|l| l.id == id)
                .ok_or_else(|| CalendarError::UnknownList(id.to_string())),
            None => lists
                .into_iter()
                .next()
                .ok_or_else(|| CalendarError::UnknownList("(none)".to_string())),
        }
    }

    pub async fn create_reminders<S>(
        store: &S,
        page: &PageResult,
        list_id: &str,
        opts: &SyncOptions,
    ) -> ReminderSummary
    where
        S: CalendarStore + ?Sized,
    {
        let mut summary = ReminderSummary::default();
        for (_, todo) in page.todos() {
            let placed = todo.day_date.and_then(|date| {
                Some((local(date, todo.reminder_time, opts.offset)?, day_bounds(date, opts.offset)?))
            });
            let Some((due, (day_start, day_end))) = placed else {
                summary
                    .errors
                    .push(ItemError::new(&todo.text, format!("{} has no date", todo.day_name)));
                continue;
            };

            let existing = match store.query_reminders(list_id, day_start, day_end).await {
                Ok(reminders) => reminders,
                Err(err) => {
                    warn!(%err, text = %todo.text, "duplicate check failed; creating anyway");
                    vec![]
                }
            };
            let title = fold_title(&todo.text);
            if existing.iter().any(|r| fold_title(&r.title) == title) {
                summary.duplicates += 1;
                continue;
            }

            let reminder = NewReminder {
                title: todo.text.clone(),
                due_date: due,
                notes: Some(format!("Imported from planner page ({})", todo.day_name)),
            };
            match store.create_reminder(list_id, reminder).await {
                Ok(_) => summary.created += 1,
                Err(err) => summary.errors.push(ItemError::new(&todo.text, err)),
            }
        }
        info!(
            created = summary.created,
            duplicates = summary.duplicates,
            errors = summary.errors.len(),
            "reminders created"
        );
        summary
    }

    /// First and last dated day on the page.
    pub fn page_date_range(page: &PageResult) -> Option<(NaiveDate, NaiveDate)> {
        let mut dates = page.sections.iter().filter_map(|s| s.date).chain(
            page.metadata
                .qr_data
                .iter()
                .flat_map(|qr| qr.page_dates()),
        );
        let first = dates.next()?;
        Some(dates.fold((first, first), |(lo, hi), d| (lo.min(d), hi.max(d))))
    }

    fn page_key(date: NaiveDate, start: ClockTime, title: &str) -> (NaiveDate, String, String) {
        (date, start.to_string(), fold_title(title))
    }

    /// Calendar events in the page's range that no extracted event accounts for.
    pub async fn find_orphaned_events<S>(
        store: &S,
        page: &PageResult,
        opts: &SyncOptions,
    ) -> Result<Vec<CalendarEvent>, CalendarError>
    where
        S: CalendarStore + ?Sized,
    {
        let Some((first, last)) = page_date_range(page) else {
            return Ok(vec![]);
        };
        let (Some((start, _)), Some((_, end))) =
            (day_bounds(first, opts.offset), day_bounds(last, opts.offset))
        else {
            return Ok(vec![]);
        };

        let on_page: HashSet<_> = page
            .events()
            .filter_map(|(section, event)| {
                let date = event.date.or(section.date)?;
                Some(page_key(date, event.when.start(), &event.title))
            })
            .collect();

        let stored = store.query_events(&opts.calendar_id, start, end).await?;
        let orphans: Vec<CalendarEvent> = stored
            .into_iter()
            .filter(|e| {
                let local = e.start_date.with_timezone(&opts.offset);
                let key = page_key(
                    local.date_naive(),
                    ClockTime::from_naive_time(local.time()),
                    &e.title,
                );
                !on_page.contains(&key)
            })
            .collect();
        debug!(count = orphans.len(), %first, %last, "orphan scan");
        Ok(orphans)
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub enum OrphanAction {
        /// Remove it from the calendar.
        Delete,
        /// Keep it; the user will add it to the paper page.
        WriteInPlanner,
    }

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct OrphanOutcome {
        pub deleted: usize,
        pub write_in_planner: Vec<CalendarEvent>,
        pub errors: Vec<ItemError>,
    }

    pub async fn apply_orphan_actions<S>(
        store: &S,
        decisions: Vec<(CalendarEvent, OrphanAction)>,
    ) -> OrphanOutcome
    where
        S: CalendarStore + ?Sized,
    {
        let mut outcome = OrphanOutcome::default();
        for (event, action) in decisions {
            match action {
                OrphanAction::Delete => match store.delete_event(&event.id).await {
                    Ok(()) => outcome.deleted += 1,
                    Err(err) => outcome.errors.push(ItemError::new(&event.title, err)),
                },
                OrphanAction::WriteInPlanner => outcome.write_in_planner.push(event),
            }
        }
        outcome
    }

}

pub use crate::core::{BlockOutcome, Event, EventTime, PageResult, Section, TextBlock, Todo};
pub use calendar::{CalendarStore, MemoryCalendarStore};
pub use config::ProcessorConfig;
pub use normalize::TextNormalizer;
pub use ocr::{OcrError, OcrProvider};
pub use processor::{PageInterpreter, PageResponse, PlannerTextProcessor, ProcessError};
pub use qr::{QrDecoder, TemplateRegistry};

//! Deterministic entity extraction from free text.
//!
//! These extractors back the keyword classification path and are also called
//! directly by the dialogue handlers. They are pure functions over the
//! message text (plus a reference date for relative expressions), so the
//! same message always yields the same extraction.

use std::sync::LazyLock;

use chrono::{Datelike, Days, NaiveDate};
use regex::Regex;

use skylark_core::types::{
    BudgetRange, DateFlexibility, PriorityFactor, StopPreference, TimeOfDay, TravelParams,
    TravelPreferences,
};

// =============================================================================
// Selection references
// =============================================================================

/// Numeric selection phrasings, checked in order; first match wins.
static SELECTION_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        // "select/choose/pick/book/take [the] [flight] [number] N"
        r"(?:select|choose|pick|book|take)\s+(?:the\s+)?(?:flight\s+)?(?:number\s+)?(\d+)",
        // "option N" / "choice N"
        r"(?:option|choice)\s+(?:number\s+)?(\d+)",
        // a message that is nothing but an integer
        r"^\s*(\d+)\s*$",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("Invalid selection regex"))
    .collect()
});

/// Ordinal words, checked after the numeric patterns.
static ORDINAL_PATTERNS: LazyLock<Vec<(Regex, usize)>> = LazyLock::new(|| {
    [
        (r"\b(?:first|1st)\b", 1),
        (r"\b(?:second|2nd)\b", 2),
        (r"\b(?:third|3rd)\b", 3),
    ]
    .iter()
    .map(|(p, n)| (Regex::new(p).expect("Invalid ordinal regex"), *n))
    .collect()
});

/// Pull a 1-based selection reference out of a message.
///
/// Returns `None` when no reference is present; callers must treat that as
/// "could not determine a selection", never as index zero.
pub fn extract_selection(message: &str) -> Option<usize> {
    let lower = message.to_lowercase();

    for pattern in SELECTION_PATTERNS.iter() {
        if let Some(caps) = pattern.captures(&lower) {
            if let Some(n) = caps.get(1).and_then(|m| m.as_str().parse::<usize>().ok()) {
                return Some(n);
            }
        }
    }
    for (pattern, n) in ORDINAL_PATTERNS.iter() {
        if pattern.is_match(&lower) {
            return Some(*n);
        }
    }
    None
}

// =============================================================================
// Travel preferences
// =============================================================================

static PRICE_WORDS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:price|cost|cheap)").expect("Invalid price regex"));
static DURATION_WORDS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:duration|fast|quick|speed)").expect("Invalid duration regex"));
static CONVENIENCE_WORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:convenience|convenient|comfort)").expect("Invalid convenience regex")
});

/// Extract stated travel preferences using fixed keyword rules.
///
/// Priority factors are ordered by where they first appear in the message,
/// so "prioritize duration over price" ranks duration ahead of price.
pub fn extract_preferences(message: &str) -> TravelPreferences {
    let lower = message.to_lowercase();
    let mut prefs = TravelPreferences::default();

    prefs.budget = if lower.contains("budget") {
        Some(BudgetRange::Budget)
    } else if lower.contains("premium") {
        Some(BudgetRange::Premium)
    } else if lower.contains("mid-range") || lower.contains("mid range") || lower.contains("midrange")
    {
        Some(BudgetRange::MidRange)
    } else {
        None
    };

    prefs.time_of_day = if lower.contains("morning") {
        Some(TimeOfDay::Morning)
    } else if lower.contains("afternoon") {
        Some(TimeOfDay::Afternoon)
    } else if lower.contains("evening") {
        Some(TimeOfDay::Evening)
    } else {
        None
    };

    prefs.stops = if lower.contains("direct") || lower.contains("nonstop") || lower.contains("non-stop") {
        Some(StopPreference::Direct)
    } else if lower.contains("one-stop") || lower.contains("one stop") || lower.contains("1 stop") {
        Some(StopPreference::OneStop)
    } else if lower.contains("flexible") {
        Some(StopPreference::Flexible)
    } else {
        None
    };

    let mut found: Vec<(usize, PriorityFactor)> = Vec::new();
    if let Some(m) = PRICE_WORDS.find(&lower) {
        found.push((m.start(), PriorityFactor::Price));
    }
    if let Some(m) = DURATION_WORDS.find(&lower) {
        found.push((m.start(), PriorityFactor::Duration));
    }
    if let Some(m) = CONVENIENCE_WORDS.find(&lower) {
        found.push((m.start(), PriorityFactor::Convenience));
    }
    found.sort_by_key(|(pos, _)| *pos);
    prefs.priorities = found.into_iter().map(|(_, factor)| factor).collect();

    prefs
}

// =============================================================================
// Travel parameters
// =============================================================================

// Place captures are non-greedy and terminated by punctuation or a temporal
// connective, so "from new york to london on friday" stops before "on".
const PLACE_TERMINATOR: &str =
    r"(?:$|[,.!?]|\s+(?:on|in|at|next|this|tomorrow|today|for|from|departing|leaving|returning|around|by)\b)";

static ROUTE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"\bfrom\s+([a-z][a-z ]{{1,40}}?)\s+to\s+([a-z][a-z ]{{1,40}}?){PLACE_TERMINATOR}"
    ))
    .expect("Invalid route regex")
});

static DESTINATION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"\b(?:fly|flight|flights|travel|go|going|trip)\s+to\s+([a-z][a-z ]{{1,40}}?){PLACE_TERMINATOR}"
    ))
    .expect("Invalid destination regex")
});

static ISO_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{4}-\d{2}-\d{2}\b").expect("Invalid date regex"));

static RETURN_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"return\w*(?:\s+\w+){0,2}?\s+(\d{4}-\d{2}-\d{2})").expect("Invalid return regex")
});

static MONTH_DAY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(january|february|march|april|may|june|july|august|september|october|november|december)\s+(\d{1,2})(?:st|nd|rd|th)?\b",
    )
    .expect("Invalid month regex")
});

static PASSENGERS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(\d+|one|two|three|four|five|six|seven|eight|nine)\s+(?:passengers?|people|persons?|adults?|travell?ers?)\b",
    )
    .expect("Invalid passenger regex")
});

const MONTHS: [&str; 12] = [
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

/// Extract travel parameters from free text. `today` anchors relative date
/// expressions ("tomorrow", "next week") and month-day dates without a year.
pub fn extract_travel_params(message: &str, today: NaiveDate) -> TravelParams {
    let lower = message.to_lowercase();
    let mut params = TravelParams::default();

    if let Some(caps) = ROUTE_PATTERN.captures(&lower) {
        params.origin = caps.get(1).map(|m| title_case(m.as_str()));
        params.destination = caps.get(2).map(|m| title_case(m.as_str()));
    } else if let Some(caps) = DESTINATION_PATTERN.captures(&lower) {
        params.destination = caps.get(1).map(|m| title_case(m.as_str()));
    }

    // Resolve the return date first so the remaining dates read as departures.
    let mut return_span = None;
    if let Some(caps) = RETURN_DATE.captures(&lower) {
        if let Some(m) = caps.get(1) {
            params.return_date = parse_iso(m.as_str());
            return_span = Some((m.start(), m.end()));
        }
    }
    for m in ISO_DATE.find_iter(&lower) {
        let inside_return = return_span
            .map(|(start, end)| m.start() >= start && m.end() <= end)
            .unwrap_or(false);
        if inside_return {
            continue;
        }
        params.departure_date = parse_iso(m.as_str());
        break;
    }

    if params.departure_date.is_none() {
        params.departure_date = relative_date(&lower, today).or_else(|| month_day(&lower, today));
    }

    if let Some(caps) = PASSENGERS.captures(&lower) {
        params.passengers = caps.get(1).and_then(|m| parse_count(m.as_str()));
    }

    if lower.contains("flexible") {
        params.flexibility = DateFlexibility::Flexible;
    }

    params
}

fn parse_iso(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

fn relative_date(lower: &str, today: NaiveDate) -> Option<NaiveDate> {
    // "day after tomorrow" contains "tomorrow"; check the longer phrase first.
    if lower.contains("day after tomorrow") {
        today.checked_add_days(Days::new(2))
    } else if lower.contains("tomorrow") {
        today.checked_add_days(Days::new(1))
    } else if lower.contains("next week") {
        today.checked_add_days(Days::new(7))
    } else if lower.contains("today") {
        Some(today)
    } else {
        None
    }
}

fn month_day(lower: &str, today: NaiveDate) -> Option<NaiveDate> {
    let caps = MONTH_DAY.captures(lower)?;
    let month = MONTHS
        .iter()
        .position(|m| Some(*m) == caps.get(1).map(|c| c.as_str()))? as u32
        + 1;
    let day: u32 = caps.get(2)?.as_str().parse().ok()?;

    // A month-day without a year means the next such date in the future.
    let this_year = NaiveDate::from_ymd_opt(today.year(), month, day)?;
    if this_year < today {
        NaiveDate::from_ymd_opt(today.year() + 1, month, day)
    } else {
        Some(this_year)
    }
}

fn parse_count(s: &str) -> Option<u32> {
    if let Ok(n) = s.parse::<u32>() {
        return Some(n);
    }
    let words = [
        "one", "two", "three", "four", "five", "six", "seven", "eight", "nine",
    ];
    words.iter().position(|w| *w == s).map(|i| i as u32 + 1)
}

fn title_case(s: &str) -> String {
    s.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

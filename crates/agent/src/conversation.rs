use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use propmatch_core::domain::context::ConversationContext;
use propmatch_core::domain::filter::{
    valid_bedrooms, BedroomsInput, BudgetRange, BudgetValue, Filter, FilterInput,
};
use propmatch_core::domain::inventory::{same_place, ProjectId, ProjectStatus};
use propmatch_core::domain::money::{amount_in_rupees, parse_amount, AmountUnit};
use propmatch_core::inventory::Vocabulary;

/// Latin-script Hindi, Kannada and Tamil tokens mapped onto the English words
/// the extractors look for.
const KEYWORD_TRANSLATIONS: &[(&str, &str)] = &[
    ("chahiye", "need"),
    ("chaiye", "need"),
    ("beku", "need"),
    ("venum", "need"),
    ("mein", "in"),
    ("me", "in"),
    ("alli", "in"),
    ("il", "in"),
    ("ka", "of"),
    ("ki", "of"),
    ("ke", "of"),
    ("da", "of"),
    ("dikhao", "show"),
    ("dikhado", "show"),
    ("thorisi", "show"),
    ("kaattu", "show"),
    ("batao", "tell"),
    ("bataiye", "tell"),
    ("heli", "tell"),
    ("sollu", "tell"),
    ("ghar", "home"),
    ("mane", "home"),
    ("flat", "home"),
    ("sasta", "cheap"),
    ("kam", "cheap"),
];

const MAX_BUDGET_WORDS: &[&str] =
    &["under", "below", "upto", "up", "within", "max", "maximum", "budget", "less", "till"];
const MIN_BUDGET_WORDS: &[&str] =
    &["above", "over", "from", "min", "minimum", "atleast", "least", "more", "starting"];
const BEDROOM_WORDS: &[&str] = &["bhk", "bhks", "bed", "beds", "bedroom", "bedrooms", "br"];
const BEDROOM_SEPARATORS: &[&str] = &["or", "and", "/", ",", "-", "to"];
const PRICE_SENSITIVE_WORDS: &[&str] =
    &["cheap", "cheaper", "cheapest", "affordable", "economical", "lowest"];
const UPGRADE_WORDS: &[&str] = &["bigger", "larger", "upgrade", "spacious"];

const STATUS_PHRASES: &[(&str, ProjectStatus)] = &[
    ("ready to move", ProjectStatus::ReadyToMove),
    ("ready to occupy", ProjectStatus::ReadyToMove),
    ("rtm", ProjectStatus::ReadyToMove),
    ("under construction", ProjectStatus::UnderConstruction),
    ("new launch", ProjectStatus::NewLaunch),
    ("pre launch", ProjectStatus::NewLaunch),
    ("prelaunch", ProjectStatus::NewLaunch),
];

/// Slots found in one turn of free text. Only values that parse
/// deterministically are kept; anything ambiguous is left out.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExtractedFilters {
    pub filter: Filter,
    pub active_project: Option<ProjectId>,
    pub price_sensitive: bool,
    pub upgrade_interest: bool,
    pub dropped: Vec<&'static str>,
}

impl ExtractedFilters {
    pub fn has_slots(&self) -> bool {
        !self.filter.is_empty() || self.active_project.is_some()
    }
}

#[derive(Clone, Debug, Default)]
pub struct FilterExtractor;

impl FilterExtractor {
    pub fn new() -> Self {
        Self
    }

    pub fn extract(&self, text: &str, vocabulary: &Vocabulary) -> ExtractedFilters {
        let tokens = translate(tokenize(&normalize_text(text)));
        let mut extracted = ExtractedFilters::default();

        let places = match_vocabulary(&tokens, vocabulary);
        extracted.filter.zone = places.zone;
        extracted.filter.locality = places.locality;
        extracted.filter.amenities = places.amenities;
        extracted.active_project = places.project;

        let (bedrooms, bedrooms_dropped) = extract_bedrooms(&tokens);
        extracted.filter.bedrooms = bedrooms;
        if bedrooms_dropped {
            extracted.dropped.push("bedrooms");
        }

        let budget = extract_budget(&tokens);
        extracted.filter.set_budget(budget);

        extracted.filter.status = extract_status(&tokens);
        extracted.filter.possession_by = extract_possession_by(&tokens);
        extracted.price_sensitive = tokens.iter().any(|token| is_one_of(token, PRICE_SENSITIVE_WORDS));
        extracted.upgrade_interest = tokens.iter().any(|token| is_one_of(token, UPGRADE_WORDS));

        extracted
    }
}

/// One request's filters after merging explicit input, text and context.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NormalizedRequest {
    /// Keys stated in this turn, explicit input first, then text.
    pub requested: Filter,
    /// `requested` with every absent key inherited from the conversation.
    pub merged: Filter,
    pub active_project: Option<ProjectId>,
    pub price_sensitive: bool,
    pub upgrade_interest: bool,
    pub dropped: Vec<&'static str>,
    /// Non-empty text from which nothing could be extracted.
    pub unresolved_text: bool,
}

/// Slot hint returned by the extraction collaborator. Shapes mirror the
/// explicit filter input so the same parsing rules apply.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct SlotHint {
    #[serde(default)]
    pub bedrooms: Option<BedroomsInput>,
    #[serde(default)]
    pub min_price: Option<BudgetValue>,
    #[serde(default)]
    pub max_price: Option<BudgetValue>,
    #[serde(default)]
    pub locality: Option<String>,
    #[serde(default)]
    pub zone: Option<String>,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum HintRejection {
    #[error("hint field `{0}` conflicts with a value parsed from the request")]
    Conflict(&'static str),
    #[error("hint carried no usable field")]
    Empty,
}

#[derive(Clone, Debug, Default)]
pub struct FilterNormalizer {
    extractor: FilterExtractor,
}

impl FilterNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Precedence per key: explicit input, then text, then context.
    pub fn normalize(
        &self,
        text: &str,
        explicit: Option<&FilterInput>,
        context: &ConversationContext,
        vocabulary: &Vocabulary,
    ) -> NormalizedRequest {
        let extracted = self.extractor.extract(text, vocabulary);
        let validated = explicit.map(FilterInput::validate).unwrap_or_default();
        let explicit_filter = canonicalize_places(validated.filter, vocabulary);

        let requested = explicit_filter.overlay(&extracted.filter);
        let merged = requested.clone().overlay(&context.last_filters);

        let mut dropped = validated.dropped;
        dropped.extend(extracted.dropped.iter().copied());

        NormalizedRequest {
            requested,
            merged,
            active_project: extracted.active_project.clone().or_else(|| context.active_project.clone()),
            price_sensitive: extracted.price_sensitive,
            upgrade_interest: extracted.upgrade_interest,
            dropped,
            unresolved_text: !text.trim().is_empty() && !extracted.has_slots(),
        }
    }

    /// Folds a collaborator hint into the request. A field that contradicts a
    /// value already in the request discards the whole hint; invalid fields are
    /// skipped and valid ones only fill empty slots. Returns the applied count.
    pub fn apply_hint(
        &self,
        request: &mut NormalizedRequest,
        hint: &SlotHint,
        context: &ConversationContext,
        vocabulary: &Vocabulary,
    ) -> Result<usize, HintRejection> {
        let requested = &request.requested;

        let bedrooms: Option<BTreeSet<u8>> = hint.bedrooms.as_ref().map(|input| {
            let values = match input {
                BedroomsInput::One(value) => vec![*value],
                BedroomsInput::Many(values) => values.clone(),
            };
            values.into_iter().filter_map(valid_bedrooms).collect()
        });
        let min_price = hint.min_price.as_ref().and_then(BudgetValue::rupees);
        let max_price = hint.max_price.as_ref().and_then(BudgetValue::rupees);
        let locality = hint.locality.as_deref().map(str::trim).filter(|raw| !raw.is_empty());
        let zone = hint.zone.as_deref().map(str::trim).filter(|raw| !raw.is_empty());

        if let Some(hinted) = &bedrooms {
            if !requested.bedrooms.is_empty() && *hinted != requested.bedrooms {
                return Err(HintRejection::Conflict("bedrooms"));
            }
        }
        if conflicts(requested.min_price, min_price) {
            return Err(HintRejection::Conflict("min_price"));
        }
        if conflicts(requested.max_price, max_price) {
            return Err(HintRejection::Conflict("max_price"));
        }
        if let (Some(current), Some(hinted)) = (requested.locality.as_deref(), locality) {
            if !same_place(current, hinted) {
                return Err(HintRejection::Conflict("locality"));
            }
        }
        if let (Some(current), Some(hinted)) = (requested.zone.as_deref(), zone) {
            if !same_place(current, hinted) {
                return Err(HintRejection::Conflict("zone"));
            }
        }

        let mut filled = Filter::default();
        let mut applied = 0;
        if let Some(hinted) = bedrooms.filter(|set| !set.is_empty()) {
            filled.bedrooms = hinted;
            applied += 1;
        }
        let budget = BudgetRange::new(min_price, max_price);
        if !budget.is_empty() {
            filled.set_budget(budget);
            applied += usize::from(budget.min.is_some()) + usize::from(budget.max.is_some());
        }
        if let Some(canonical) = locality.and_then(|raw| vocabulary.canonical_locality(raw)) {
            filled.locality = Some(canonical.to_string());
            applied += 1;
        }
        if let Some(canonical) = zone.and_then(|raw| vocabulary.canonical_zone(raw)) {
            filled.zone = Some(canonical.to_string());
            applied += 1;
        }

        if applied == 0 {
            return Err(HintRejection::Empty);
        }

        request.requested = request.requested.clone().overlay(&filled);
        request.merged = request.requested.clone().overlay(&context.last_filters);
        request.unresolved_text = false;
        debug!(event_name = "filter.hint_applied", applied, "extraction hint filled empty slots");
        Ok(applied)
    }
}

fn conflicts(current: Option<i64>, hinted: Option<i64>) -> bool {
    matches!((current, hinted), (Some(current), Some(hinted)) if current != hinted)
}

/// Explicit places are matched case-insensitively against the snapshot so they
/// compare equal to text-extracted values; unknown names pass through.
fn canonicalize_places(mut filter: Filter, vocabulary: &Vocabulary) -> Filter {
    if let Some(raw) = filter.locality.take() {
        let canonical = vocabulary
            .canonical_locality(&raw)
            .or_else(|| vocabulary.canonical_zone(&raw))
            .map(str::to_string);
        filter.locality = Some(canonical.unwrap_or(raw));
    }
    if let Some(raw) = filter.zone.take() {
        filter.zone = Some(vocabulary.canonical_zone(&raw).map(str::to_string).unwrap_or(raw));
    }
    filter
}

fn normalize_text(text: &str) -> String {
    let chars: Vec<char> = text.to_lowercase().chars().collect();
    let mut normalized = String::with_capacity(chars.len());
    for (index, character) in chars.iter().enumerate() {
        match character {
            '₹' => normalized.push_str(" rs "),
            // digit grouping (`95,00,000`) but not lists (`2,3 bhk`)
            ',' if index > 0
                && chars[index - 1].is_ascii_digit()
                && matches!(digit_run(&chars[index + 1..]), 2 | 3) => {}
            _ => normalized.push(*character),
        }
    }
    normalized
}

fn digit_run(chars: &[char]) -> usize {
    chars.iter().take_while(|character| character.is_ascii_digit()).count()
}

/// Splits on number/letter boundaries so `2bhk` and `1.3cr` become two tokens.
/// A hyphen survives only next to a digit (`70-90l`, `2-bhk`).
fn tokenize(text: &str) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens: Vec<String> = Vec::new();
    let mut index = 0;

    while index < chars.len() {
        let character = chars[index];
        if character.is_ascii_digit() {
            let start = index;
            while index < chars.len()
                && (chars[index].is_ascii_digit()
                    || (chars[index] == '.'
                        && chars.get(index + 1).is_some_and(char::is_ascii_digit)))
            {
                index += 1;
            }
            tokens.push(chars[start..index].iter().collect());
            continue;
        }
        if character.is_alphabetic() {
            let start = index;
            while index < chars.len() && chars[index].is_alphabetic() {
                index += 1;
            }
            tokens.push(chars[start..index].iter().collect());
            continue;
        }
        match character {
            '-' => {
                let after_number = tokens.last().is_some_and(|token| is_number(token));
                let before_digit = chars.get(index + 1).is_some_and(char::is_ascii_digit);
                if after_number || before_digit {
                    tokens.push("-".to_string());
                }
            }
            '/' | ',' => tokens.push(character.to_string()),
            _ => {}
        }
        index += 1;
    }
    tokens
}

fn translate(tokens: Vec<String>) -> Vec<String> {
    tokens
        .into_iter()
        .map(|token| {
            KEYWORD_TRANSLATIONS
                .iter()
                .find(|(foreign, _)| *foreign == token)
                .map(|(_, english)| (*english).to_string())
                .unwrap_or(token)
        })
        .collect()
}

fn phrase_tokens(phrase: &str) -> Vec<String> {
    translate(tokenize(&normalize_text(phrase)))
}

fn is_number(token: &str) -> bool {
    token.starts_with(|character: char| character.is_ascii_digit())
        && token.chars().all(|character| character.is_ascii_digit() || character == '.')
}

fn is_one_of(token: &str, words: &[&str]) -> bool {
    words.contains(&token)
}

fn find_phrase(tokens: &[String], phrase: &[String], taken: &[bool]) -> Option<usize> {
    if phrase.is_empty() || phrase.len() > tokens.len() {
        return None;
    }
    (0..=tokens.len() - phrase.len()).find(|start| {
        let span = *start..*start + phrase.len();
        tokens[span.clone()] == *phrase && !taken[span].iter().any(|used| *used)
    })
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum PlaceKind {
    Zone,
    Locality,
    Project(ProjectId),
    Amenity,
}

#[derive(Debug, Default)]
struct MatchedPlaces {
    zone: Option<String>,
    locality: Option<String>,
    project: Option<ProjectId>,
    amenities: BTreeSet<String>,
}

/// Longest phrase wins; a token belongs to at most one vocabulary entry.
/// When several places of one kind appear, the first mention is kept.
fn match_vocabulary(tokens: &[String], vocabulary: &Vocabulary) -> MatchedPlaces {
    let mut candidates: Vec<(Vec<String>, String, PlaceKind)> = Vec::new();
    for zone in vocabulary.zones() {
        candidates.push((phrase_tokens(zone), zone.clone(), PlaceKind::Zone));
    }
    for locality in vocabulary.localities() {
        candidates.push((phrase_tokens(locality), locality.clone(), PlaceKind::Locality));
    }
    for (name, id) in vocabulary.project_names() {
        candidates.push((phrase_tokens(name), name.clone(), PlaceKind::Project(id.clone())));
    }
    for amenity in vocabulary.amenities() {
        candidates.push((phrase_tokens(amenity), amenity.to_lowercase(), PlaceKind::Amenity));
    }
    candidates.sort_by(|left, right| right.0.len().cmp(&left.0.len()));

    let mut taken = vec![false; tokens.len()];
    let mut hits: Vec<(usize, String, PlaceKind)> = Vec::new();
    for (phrase, canonical, kind) in candidates {
        if let Some(start) = find_phrase(tokens, &phrase, &taken) {
            taken[start..start + phrase.len()].iter_mut().for_each(|used| *used = true);
            hits.push((start, canonical, kind));
        }
    }
    hits.sort_by_key(|(start, _, _)| *start);

    let mut places = MatchedPlaces::default();
    for (_, canonical, kind) in hits {
        match kind {
            PlaceKind::Zone => {
                places.zone.get_or_insert(canonical);
            }
            PlaceKind::Locality => {
                places.locality.get_or_insert(canonical);
            }
            PlaceKind::Project(id) => {
                places.project.get_or_insert(id);
            }
            PlaceKind::Amenity => {
                places.amenities.insert(canonical);
            }
        }
    }
    places
}

fn bedroom_count(token: &str) -> Option<i64> {
    let word = match token {
        "one" => Some(1),
        "two" => Some(2),
        "three" => Some(3),
        "four" => Some(4),
        "five" => Some(5),
        "six" => Some(6),
        _ => None,
    };
    word.or_else(|| token.parse::<i64>().ok())
}

/// Reads counts leftwards from each bedroom keyword: `2 or 3 bhk`, `2/3 bhk`,
/// `2-3 bhk` (inclusive range). The flag reports counts outside 1..=6.
fn extract_bedrooms(tokens: &[String]) -> (BTreeSet<u8>, bool) {
    let mut bedrooms = BTreeSet::new();
    let mut dropped = false;

    for (index, token) in tokens.iter().enumerate() {
        if !is_one_of(token, BEDROOM_WORDS) {
            continue;
        }
        let mut cursor = index;
        let mut upper: Option<u8> = None;
        let mut range_pending = false;
        while cursor > 0 {
            let previous = tokens[cursor - 1].as_str();
            if let Some(count) = bedroom_count(previous) {
                match valid_bedrooms(count) {
                    Some(bhk) => {
                        match (range_pending, upper) {
                            (true, Some(high)) if bhk <= high => bedrooms.extend(bhk..=high),
                            _ => {
                                bedrooms.insert(bhk);
                            }
                        }
                        upper = Some(bhk);
                        range_pending = false;
                    }
                    None => {
                        dropped = true;
                        break;
                    }
                }
                cursor -= 1;
            } else if is_one_of(previous, BEDROOM_SEPARATORS) {
                range_pending = matches!(previous, "-" | "to") && upper.is_some();
                cursor -= 1;
            } else {
                break;
            }
        }
    }

    (bedrooms, dropped)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Amount {
    start: usize,
    end: usize,
    rupees: i64,
}

/// Finds `<number> <unit>`, `rs <number> [unit]` and the first half of
/// `<number>-<number> <unit>`, which borrows the unit of the second half.
fn scan_amounts(tokens: &[String]) -> Vec<Amount> {
    let unit_at = |index: usize| tokens.get(index).and_then(|token| AmountUnit::parse(token));
    let number_at = |index: usize| tokens.get(index).filter(|token| is_number(token));

    let mut amounts = Vec::new();
    let mut index = 0;
    while index < tokens.len() {
        let token = tokens[index].as_str();

        if matches!(token, "rs" | "inr") {
            let number = number_at(index + 1).filter(|_| !is_broken_grouping(tokens, index + 1));
            if let Some(number) = number {
                let parsed = match unit_at(index + 2) {
                    Some(unit) => amount_in_rupees(number, unit).map(|rupees| (rupees, index + 3)),
                    None => parse_amount(&format!("rs {number}")).map(|rupees| (rupees, index + 2)),
                };
                if let Some((rupees, end)) = parsed {
                    amounts.push(Amount { start: index, end, rupees });
                    index = end;
                    continue;
                }
            }
        }

        if let Some(number) = number_at(index) {
            if is_broken_grouping(tokens, index) {
                index += 1;
                continue;
            }
            if let Some(unit) = unit_at(index + 1) {
                if let Some(rupees) = amount_in_rupees(number, unit) {
                    amounts.push(Amount { start: index, end: index + 2, rupees });
                }
                index += 2;
                continue;
            }
            let joined = tokens.get(index + 1).is_some_and(|join| join == "-" || join == "to");
            if joined && number_at(index + 2).is_some() {
                if let Some(rupees) = unit_at(index + 3).and_then(|unit| amount_in_rupees(number, unit)) {
                    amounts.push(Amount { start: index, end: index + 1, rupees });
                }
            }
        }
        index += 1;
    }
    amounts
}

/// `1,5 cr` survives normalization as `1 , 5 cr`; neither half is a usable amount.
fn is_broken_grouping(tokens: &[String], index: usize) -> bool {
    let grouped = |at: usize| {
        at >= 2
            && tokens.get(at).is_some_and(|token| is_number(token))
            && tokens[at - 1] == ","
            && is_number(&tokens[at - 2])
    };
    grouped(index) || grouped(index + 2)
}

/// Every rupee amount written in `text`, in order of appearance.
pub fn mentioned_amounts(text: &str) -> Vec<i64> {
    let tokens = tokenize(&normalize_text(text));
    scan_amounts(&tokens).into_iter().map(|amount| amount.rupees).collect()
}

fn is_range_join(tokens: &[String], left: &Amount, right: &Amount) -> bool {
    match &tokens[left.end..right.start] {
        [join] if join == "-" || join == "to" => true,
        [join] if join == "and" => left.start > 0 && tokens[left.start - 1] == "between",
        _ => false,
    }
}

enum Bound {
    Min,
    Max,
}

/// Nearest context word within three tokens decides; a lone amount is a ceiling.
fn bound_hint(tokens: &[String], start: usize) -> Bound {
    for offset in 1..=3 {
        let Some(index) = start.checked_sub(offset) else {
            break;
        };
        let token = tokens[index].as_str();
        if is_one_of(token, MIN_BUDGET_WORDS) {
            return Bound::Min;
        }
        if is_one_of(token, MAX_BUDGET_WORDS) {
            return Bound::Max;
        }
    }
    Bound::Max
}

fn extract_budget(tokens: &[String]) -> BudgetRange {
    let amounts = scan_amounts(tokens);
    let mut min = None;
    let mut max = None;

    let mut index = 0;
    while index < amounts.len() {
        let amount = amounts[index];
        if let Some(next) = amounts.get(index + 1) {
            if is_range_join(tokens, &amount, next) {
                min.get_or_insert(amount.rupees);
                max.get_or_insert(next.rupees);
                index += 2;
                continue;
            }
        }
        match bound_hint(tokens, amount.start) {
            Bound::Min => {
                min.get_or_insert(amount.rupees);
            }
            Bound::Max => {
                max.get_or_insert(amount.rupees);
            }
        }
        index += 1;
    }

    BudgetRange::new(min, max)
}

fn extract_status(tokens: &[String]) -> BTreeSet<ProjectStatus> {
    let taken = vec![false; tokens.len()];
    STATUS_PHRASES
        .iter()
        .filter(|(phrase, _)| find_phrase(tokens, &phrase_tokens(phrase), &taken).is_some())
        .map(|(_, status)| *status)
        .collect()
}

/// `by 2027` and `possession in 2027` mean the end of that year;
/// `before 2028` means the end of 2027.
fn extract_possession_by(tokens: &[String]) -> Option<NaiveDate> {
    for (index, token) in tokens.iter().enumerate() {
        let Some(year) = token.parse::<i32>().ok().filter(|year| (2000..=2100).contains(year))
        else {
            continue;
        };
        let previous = index.checked_sub(1).map(|at| tokens[at].as_str());
        let before_previous = index.checked_sub(2).map(|at| tokens[at].as_str());
        let year = match (before_previous, previous) {
            (_, Some("by")) => year,
            (Some("possession"), Some("in")) => year,
            (_, Some("before")) => year - 1,
            _ => continue,
        };
        return NaiveDate::from_ymd_opt(year, 12, 31);
    }
    None
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use chrono::NaiveDate;
    use propmatch_core::domain::context::{ConversationContext, ConversationId};
    use propmatch_core::domain::filter::{BudgetValue, Filter, FilterInput};
    use propmatch_core::domain::inventory::{ProjectId, ProjectStatus};
    use propmatch_core::inventory::Vocabulary;
    use propmatch_db::DemoInventory;

    use super::{mentioned_amounts, FilterExtractor, FilterNormalizer, HintRejection, SlotHint};

    fn vocabulary() -> Vocabulary {
        Vocabulary::from_projects(&DemoInventory::projects().expect("demo inventory"))
    }

    fn empty_context() -> ConversationContext {
        ConversationContext::new(ConversationId::parse("conv-test").expect("valid id"))
    }

    #[test]
    fn extracts_rich_english_request() {
        let extracted = FilterExtractor::new().extract(
            "Need a 2bhk in Yelahanka under 1.5 cr with a pool, ready to move",
            &vocabulary(),
        );

        assert_eq!(extracted.filter.bedrooms, BTreeSet::from([2]));
        assert_eq!(extracted.filter.max_price, Some(15_000_000));
        assert_eq!(extracted.filter.min_price, None);
        assert_eq!(extracted.filter.locality.as_deref(), Some("Yelahanka"));
        assert_eq!(extracted.filter.amenities, BTreeSet::from(["pool".to_string()]));
        assert_eq!(extracted.filter.status, BTreeSet::from([ProjectStatus::ReadyToMove]));
    }

    #[test]
    fn currency_phrases_map_to_whole_rupees() {
        let extractor = FilterExtractor::new();
        let vocabulary = vocabulary();
        let cases = [
            ("budget 80L", 8_000_000),
            ("upto 80 lakhs", 8_000_000),
            ("within 2 crore", 20_000_000),
            ("max 1.3cr", 13_000_000),
            ("under ₹95,00,000", 9_500_000),
            ("rs 9500000 max", 9_500_000),
            ("75 lac", 7_500_000),
        ];
        for (text, expected) in cases {
            let extracted = extractor.extract(text, &vocabulary);
            assert_eq!(extracted.filter.max_price, Some(expected), "case: {text}");
        }
    }

    #[test]
    fn unitless_numbers_are_dropped_not_guessed() {
        let extracted = FilterExtractor::new().extract("budget 90 in Hebbal", &vocabulary());
        assert!(!extracted.filter.has_budget());
        assert_eq!(extracted.filter.locality.as_deref(), Some("Hebbal"));
    }

    #[test]
    fn malformed_digit_groups_are_dropped() {
        let extractor = FilterExtractor::new();
        let vocabulary = vocabulary();
        for text in ["under 1,5 cr", "budget rs 1,5", "max 9,5000 lakh"] {
            let extracted = extractor.extract(text, &vocabulary);
            assert!(!extracted.filter.has_budget(), "case: {text}");
        }

        let grouped = extractor.extract("under ₹9,500,000", &vocabulary);
        assert_eq!(grouped.filter.max_price, Some(9_500_000));
        assert_eq!(mentioned_amounts("between 1,5 cr and 2 cr"), vec![20_000_000]);
    }

    #[test]
    fn budget_context_words_pick_the_bound() {
        let extractor = FilterExtractor::new();
        let vocabulary = vocabulary();

        let above = extractor.extract("something above 80l", &vocabulary);
        assert_eq!((above.filter.min_price, above.filter.max_price), (Some(8_000_000), None));

        let between = extractor.extract("between 80 l and 1.2 cr", &vocabulary);
        assert_eq!(
            (between.filter.min_price, between.filter.max_price),
            (Some(8_000_000), Some(12_000_000))
        );

        let dashed = extractor.extract("70-90l please", &vocabulary);
        assert_eq!(
            (dashed.filter.min_price, dashed.filter.max_price),
            (Some(7_000_000), Some(9_000_000))
        );

        let inverted = extractor.extract("from 2 cr to 1 cr", &vocabulary);
        assert_eq!((inverted.filter.min_price, inverted.filter.max_price), (None, Some(10_000_000)));
    }

    #[test]
    fn bedroom_phrases() {
        let extractor = FilterExtractor::new();
        let vocabulary = vocabulary();
        let cases: [(&str, &[u8]); 7] = [
            ("2bhk", &[2]),
            ("2 bhk", &[2]),
            ("2-bhk", &[2]),
            ("3 bedrooms", &[3]),
            ("2 or 3 bhk", &[2, 3]),
            ("2/3 bhk", &[2, 3]),
            ("2-4 bhk", &[2, 3, 4]),
        ];
        for (text, expected) in cases {
            let extracted = extractor.extract(text, &vocabulary);
            assert_eq!(
                extracted.filter.bedrooms,
                expected.iter().copied().collect::<BTreeSet<u8>>(),
                "case: {text}"
            );
        }

        let list = extractor.extract("2,3 bhk under 1cr", &vocabulary);
        assert_eq!(list.filter.bedrooms, BTreeSet::from([2, 3]));
        assert_eq!(list.filter.max_price, Some(10_000_000));

        let out_of_range = extractor.extract("9 bhk", &vocabulary);
        assert!(out_of_range.filter.bedrooms.is_empty());
        assert_eq!(out_of_range.dropped, vec!["bedrooms"]);
    }

    #[test]
    fn mixed_language_tokens_are_translated() {
        let extracted = FilterExtractor::new()
            .extract("Whitefield mein 2bhk ghar chahiye, sasta wala, 1 cr tak", &vocabulary());

        assert_eq!(extracted.filter.locality.as_deref(), Some("Whitefield"));
        assert_eq!(extracted.filter.bedrooms, BTreeSet::from([2]));
        assert_eq!(extracted.filter.max_price, Some(10_000_000));
        assert!(extracted.price_sensitive);
    }

    #[test]
    fn longest_vocabulary_match_wins_and_sets_project() {
        let extractor = FilterExtractor::new();
        let vocabulary = vocabulary();

        let zoned = extractor.extract("anything in north bangalore", &vocabulary);
        assert_eq!(zoned.filter.zone.as_deref(), Some("North Bangalore"));
        assert_eq!(zoned.filter.locality, None);

        let project = extractor.extract("tell me about Cedar Court", &vocabulary);
        assert_eq!(project.active_project, Some(ProjectId("prj-cedar-court".to_string())));
        assert!(project.filter.is_empty());
        assert!(project.has_slots());

        let unknown = extractor.extract("flats in Koramangala", &vocabulary);
        assert_eq!(unknown.filter.locality, None);
    }

    #[test]
    fn possession_phrases_resolve_to_year_end() {
        let extractor = FilterExtractor::new();
        let vocabulary = vocabulary();

        assert_eq!(
            extractor.extract("possession by 2027", &vocabulary).filter.possession_by,
            NaiveDate::from_ymd_opt(2027, 12, 31)
        );
        assert_eq!(
            extractor.extract("before 2028 please", &vocabulary).filter.possession_by,
            NaiveDate::from_ymd_opt(2027, 12, 31)
        );
        assert_eq!(extractor.extract("built in 2027", &vocabulary).filter.possession_by, None);
    }

    #[test]
    fn explicit_fields_beat_text_and_text_beats_context() {
        let mut context = empty_context();
        context.last_filters = Filter {
            bedrooms: BTreeSet::from([3]),
            locality: Some("Hebbal".to_string()),
            max_price: Some(20_000_000),
            ..Filter::default()
        };
        let explicit = FilterInput {
            max_price: Some(BudgetValue::Phrase("1.5cr".to_string())),
            ..FilterInput::default()
        };

        let normalized = FilterNormalizer::new().normalize(
            "2bhk under 1 cr in yelahanka",
            Some(&explicit),
            &context,
            &vocabulary(),
        );

        assert_eq!(normalized.merged.max_price, Some(15_000_000));
        assert_eq!(normalized.merged.bedrooms, BTreeSet::from([2]));
        assert_eq!(normalized.merged.locality.as_deref(), Some("Yelahanka"));
    }

    #[test]
    fn absent_keys_inherit_from_context() {
        let mut context = empty_context();
        context.last_filters = Filter {
            locality: Some("Whitefield".to_string()),
            max_price: Some(12_000_000),
            ..Filter::default()
        };
        context.active_project = Some(ProjectId("prj-orchid-heights".to_string()));

        let normalized =
            FilterNormalizer::new().normalize("what about 3bhk", None, &context, &vocabulary());

        assert_eq!(normalized.merged.locality.as_deref(), Some("Whitefield"));
        assert_eq!(normalized.merged.max_price, Some(12_000_000));
        assert_eq!(normalized.merged.bedrooms, BTreeSet::from([3]));
        assert_eq!(normalized.requested.locality, None);
        assert_eq!(normalized.active_project, context.active_project);
    }

    #[test]
    fn explicit_places_are_canonicalized() {
        let explicit =
            FilterInput { locality: Some("  whitefield ".to_string()), ..FilterInput::default() };
        let normalized = FilterNormalizer::new().normalize(
            "",
            Some(&explicit),
            &empty_context(),
            &vocabulary(),
        );
        assert_eq!(normalized.merged.locality.as_deref(), Some("Whitefield"));
        assert!(!normalized.unresolved_text);
    }

    #[test]
    fn hint_fills_empty_slots_only_when_consistent() {
        let normalizer = FilterNormalizer::new();
        let vocabulary = vocabulary();
        let context = empty_context();

        let mut request =
            normalizer.normalize("something nice for my parents", None, &context, &vocabulary);
        assert!(request.unresolved_text);

        let hint = SlotHint {
            locality: Some("hebbal".to_string()),
            zone: Some("Atlantis".to_string()),
            max_price: Some(BudgetValue::Whole(9_000_000)),
            ..SlotHint::default()
        };
        let applied = normalizer.apply_hint(&mut request, &hint, &context, &vocabulary);

        assert_eq!(applied, Ok(2));
        assert_eq!(request.merged.locality.as_deref(), Some("Hebbal"));
        assert_eq!(request.merged.zone, None, "zones outside the vocabulary are ignored");
        assert_eq!(request.merged.max_price, Some(9_000_000));
    }

    #[test]
    fn conflicting_hint_is_discarded_whole() {
        let normalizer = FilterNormalizer::new();
        let vocabulary = vocabulary();
        let context = empty_context();
        let explicit = FilterInput {
            max_price: Some(BudgetValue::Whole(8_000_000)),
            ..FilterInput::default()
        };

        let mut request =
            normalizer.normalize("somewhere quiet", Some(&explicit), &context, &vocabulary);
        let before = request.clone();
        let hint = SlotHint {
            locality: Some("Hebbal".to_string()),
            max_price: Some(BudgetValue::Whole(12_000_000)),
            ..SlotHint::default()
        };

        assert_eq!(
            normalizer.apply_hint(&mut request, &hint, &context, &vocabulary),
            Err(HintRejection::Conflict("max_price"))
        );
        assert_eq!(request, before);
    }
}

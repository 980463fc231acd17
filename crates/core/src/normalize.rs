use once_cell::sync::Lazy;
use regex::Regex;

static WHITESPACE_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

// Tashkeel, Quranic annotation marks and superscript alef.
static ARABIC_MARKS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[\x{0610}-\x{061A}\x{064B}-\x{065F}\x{0670}\x{06D6}-\x{06ED}]")
        .expect("valid arabic marks regex")
});

/// Canonical comparison key for a city or region name.
///
/// Handles both Arabic and Latin spellings: hamza-bearing alefs fold to a
/// bare alef, teh marbuta to heh, alef maksura to yeh, diacritics are
/// dropped, Latin text is lowercased and `-`, `_`, `.`, `,` count as spaces.
/// The result has single inner spaces and no outer whitespace, so
/// `normalize_place(&normalize_place(s)) == normalize_place(s)`.
pub fn normalize_place(input: &str) -> String {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    let collapsed = WHITESPACE_RUN.replace_all(trimmed, " ");
    let folded = collapsed.chars().map(fold_arabic_letter).collect::<String>();
    let stripped = ARABIC_MARKS.replace_all(&folded, "");
    let lowered = stripped.to_lowercase();

    let spaced = lowered
        .chars()
        .map(|ch| match ch {
            '-' | '_' | '.' | ',' => ' ',
            other => other,
        })
        .collect::<String>();

    WHITESPACE_RUN
        .replace_all(&spaced, " ")
        .trim()
        .to_string()
}

fn fold_arabic_letter(ch: char) -> char {
    match ch {
        'أ' | 'آ' | 'إ' => 'ا',
        'ة' => 'ه',
        'ى' => 'ي',
        other => other,
    }
}

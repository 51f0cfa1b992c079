use regex::Regex;
use std::sync::LazyLock;

/// Banned terms. Matching is case-insensitive and substring-based except
/// where a word boundary is spelled out.
const BANNED_PATTERNS: &[&str] = &[
    r"bosta",
    r"merda",
    r"caralho",
    r"porra",
    r"puta",
    r"puto",
    r"vadia",
    r"vagabunda",
    r"piranha",
    r"arrombado",
    r"arrombada",
    r"viado",
    r"viadinho",
    r"bicha",
    r"boiola",
    r"maricas",
    r"traveco",
    r"sapatão",
    r"baitola",
    r"preto de merda",
    r"macaco",
    r"nigger",
    r"nigga",
    r"senzala",
    r"tição",
    r"faggot",
    r"retardado",
    r"mongol",
    r"autistinha",
    r"idiota",
    r"imbecil",
    r"burro",
    r"animal",
    r"\bcu\b",
    r"pinto",
    r"buceta",
    r"xoxota",
    r"piroca",
    r"caralhos",
    r"cacete",
    r"foder",
    r"foda-se",
    r"chupar",
    r"mamada",
    r"gozar",
    r"gozo",
    r"nazista",
    r"hitler",
    r"suicidio",
    r"se matar",
];

static PROFANITY_RE: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    BANNED_PATTERNS
        .iter()
        .map(|p| Regex::new(&format!("(?i){p}")).unwrap())
        .collect()
});

/// True if the text contains any banned term. Empty text is clean.
pub fn contains_profanity(text: &str) -> bool {
    if text.is_empty() {
        return false;
    }
    PROFANITY_RE.iter().any(|re| re.is_match(text))
}

/// Convenience for optional fields: absent text is clean.
pub fn contains_profanity_opt(text: Option<&str>) -> bool {
    text.is_some_and(contains_profanity)
}

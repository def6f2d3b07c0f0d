//! English inflection helpers used for collection names and slugs.
//!
//! Covers the rules content type ids hit in practice (`article` → `articles`,
//! `category` → `categories`, `series` → `series`), not the full inflector.

use std::sync::LazyLock;

use regex::Regex;

const UNCOUNTABLE: &[&str] = &[
    "equipment",
    "information",
    "rice",
    "money",
    "species",
    "series",
    "fish",
    "sheep",
    "jeans",
    "police",
    "news",
    "metadata",
];

const IRREGULAR: &[(&str, &str)] = &[
    ("person", "people"),
    ("man", "men"),
    ("child", "children"),
    ("sex", "sexes"),
    ("move", "moves"),
    ("zombie", "zombies"),
];

type Rules = Vec<(Regex, &'static str)>;

fn compile(rules: &[(&str, &'static str)]) -> Rules {
    rules
        .iter()
        .map(|(pattern, replacement)| {
            let re = Regex::new(&format!("(?i){pattern}")).expect("inflection rule is a valid regex");
            (re, *replacement)
        })
        .collect()
}

// First match wins.
static PLURAL: LazyLock<Rules> = LazyLock::new(|| {
    compile(&[
        (r"(quiz)$", "${1}zes"),
        (r"^(oxen)$", "${1}"),
        (r"^(ox)$", "${1}en"),
        (r"(matr|vert|ind)(?:ix|ex)$", "${1}ices"),
        (r"(x|ch|ss|sh)$", "${1}es"),
        (r"([^aeiouy]|qu)y$", "${1}ies"),
        (r"(hive)$", "${1}s"),
        (r"([^f])fe$", "${1}ves"),
        (r"([lr])f$", "${1}ves"),
        (r"sis$", "ses"),
        (r"([ti])a$", "${1}a"),
        (r"([ti])um$", "${1}a"),
        (r"(buffal|tomat)o$", "${1}oes"),
        (r"(bu)s$", "${1}ses"),
        (r"(alias|status)$", "${1}es"),
        (r"(octop|vir)i$", "${1}i"),
        (r"(octop|vir)us$", "${1}i"),
        (r"^(ax|test)is$", "${1}es"),
        (r"s$", "s"),
        (r"$", "s"),
    ])
});

static SINGULAR: LazyLock<Rules> = LazyLock::new(|| {
    compile(&[
        (r"(database)s$", "${1}"),
        (r"(quiz)zes$", "${1}"),
        (r"(matr)ices$", "${1}ix"),
        (r"(vert|ind)ices$", "${1}ex"),
        (r"^(ox)en", "${1}"),
        (r"(alias|status)(?:es)?$", "${1}"),
        (r"(octop|vir)(?:us|i)$", "${1}us"),
        (r"^(a)x[ie]s$", "${1}xis"),
        (r"(cris|test)(?:is|es)$", "${1}is"),
        (r"(shoe)s$", "${1}"),
        (r"(o)es$", "${1}"),
        (r"(bus)(?:es)?$", "${1}"),
        (r"(x|ch|ss|sh)es$", "${1}"),
        (r"(m)ovies$", "${1}ovie"),
        (r"(s)eries$", "${1}eries"),
        (r"([^aeiouy]|qu)ies$", "${1}y"),
        (r"([lr])ves$", "${1}f"),
        (r"(tive)s$", "${1}"),
        (r"(hive)s$", "${1}"),
        (r"([^f])ves$", "${1}fe"),
        (r"(analy|ba|diagno|parenthe|progno|synop|the)(?:sis|ses)$", "${1}sis"),
        (r"([ti])a$", "${1}um"),
        (r"(n)ews$", "${1}ews"),
        (r"(ss)$", "${1}"),
        (r"s$", ""),
    ])
});

fn apply(word: &str, rules: &Rules, irregular: impl Fn(&str) -> Option<&'static str>) -> String {
    if word.is_empty() {
        return String::new();
    }
    let lower = word.to_lowercase();
    let last_word = lower.rsplit(['_', '-', ' ']).next().unwrap_or(&lower);
    if UNCOUNTABLE.contains(&last_word) {
        return word.to_string();
    }
    if let Some(replacement) = irregular(&lower) {
        return replacement.to_string();
    }
    for (re, replacement) in rules.iter() {
        if re.is_match(word) {
            return re.replace(word, *replacement).into_owned();
        }
    }
    word.to_string()
}

/// `article` → `articles`, `category` → `categories`.
pub fn pluralize(word: &str) -> String {
    apply(word, &PLURAL, |lower| {
        IRREGULAR
            .iter()
            .find(|(singular, plural)| *singular == lower || *plural == lower)
            .map(|(_, plural)| *plural)
    })
}

/// `articles` → `article`, `categories` → `category`.
pub fn singularize(word: &str) -> String {
    apply(word, &SINGULAR, |lower| {
        IRREGULAR
            .iter()
            .find(|(singular, plural)| *plural == lower || *singular == lower)
            .map(|(singular, _)| *singular)
    })
}

/// URL-safe form of free text: transliterated, lowercased, hyphen separated.
///
/// `"Hello, Wörld!"` → `"hello-world"`.
pub fn parameterize(text: &str) -> String {
    let ascii = deunicode::deunicode(text).to_lowercase();
    let mut out = String::with_capacity(ascii.len());
    let mut pending_separator = false;
    for c in ascii.chars() {
        if c.is_ascii_alphanumeric() || c == '_' {
            if pending_separator && !out.is_empty() {
                out.push('-');
            }
            pending_separator = false;
            out.push(c);
        } else {
            pending_separator = true;
        }
    }
    out
}

/// True when `a` and `b` name the same collection, ignoring number.
pub fn same_collection(a: &str, b: &str) -> bool {
    a == b || pluralize(a) == b || singularize(a) == b || pluralize(b) == a || singularize(b) == a
}

//! Text tokenization and keyword frequency exports

use super::OutputResult;
use std::collections::BTreeMap;
use std::path::Path;

/// Tokens shorter than this are dropped
const MIN_TOKEN_LENGTH: usize = 3;

const STOPWORDS_EN: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "am", "an", "and", "any", "are",
    "as", "at", "be", "because", "been", "before", "being", "below", "between", "both", "but",
    "by", "can", "did", "do", "does", "doing", "don", "down", "during", "each", "few", "for",
    "from", "further", "had", "has", "have", "having", "he", "her", "here", "hers", "herself",
    "him", "himself", "his", "how", "i", "if", "in", "into", "is", "it", "its", "itself",
    "just", "me", "more", "most", "my", "myself", "no", "nor", "not", "now", "of", "off", "on",
    "once", "only", "or", "other", "our", "ours", "ourselves", "out", "over", "own", "same",
    "she", "should", "so", "some", "such", "than", "that", "the", "their", "theirs", "them",
    "themselves", "then", "there", "these", "they", "this", "those", "through", "to", "too",
    "under", "until", "up", "very", "was", "we", "were", "what", "when", "where", "which",
    "while", "who", "whom", "why", "will", "with", "you", "your", "yours", "yourself",
    "yourselves",
];

const STOPWORDS_PT: &[&str] = &[
    "a", "ao", "aos", "aquela", "aquelas", "aquele", "aqueles", "aquilo", "as", "até", "com",
    "como", "da", "das", "de", "dela", "delas", "dele", "deles", "depois", "do", "dos", "e",
    "ela", "elas", "ele", "eles", "em", "entre", "era", "eram", "essa", "essas", "esse",
    "esses", "esta", "estas", "este", "estes", "eu", "foi", "foram", "há", "isso", "isto", "já",
    "lhe", "lhes", "mais", "mas", "me", "mesmo", "meu", "meus", "minha", "minhas", "muito",
    "na", "nas", "nem", "no", "nos", "nossa", "nossas", "nosso", "nossos", "num", "numa", "não",
    "o", "os", "ou", "para", "pela", "pelas", "pelo", "pelos", "por", "qual", "quando", "que",
    "quem", "se", "sem", "ser", "seu", "seus", "só", "sua", "suas", "também", "te", "tem",
    "teu", "tua", "um", "uma", "você", "vocês", "à", "às", "é", "são", "está", "estão",
];

const STOPWORDS_ES: &[&str] = &[
    "a", "al", "algo", "algunas", "algunos", "ante", "antes", "como", "con", "contra", "cual",
    "cuando", "de", "del", "desde", "donde", "durante", "e", "el", "ella", "ellas", "ellos",
    "en", "entre", "era", "es", "esa", "esas", "ese", "eso", "esos", "esta", "estas", "este",
    "esto", "estos", "fue", "ha", "hasta", "hay", "la", "las", "le", "les", "lo", "los", "mas",
    "me", "mi", "mis", "mucho", "muy", "más", "nada", "ni", "no", "nos", "nosotros", "o",
    "otra", "otros", "para", "pero", "poco", "por", "porque", "que", "quien", "qué", "se",
    "sea", "ser", "si", "sin", "sobre", "son", "su", "sus", "también", "tanto", "te", "tiene",
    "todo", "todos", "tu", "tus", "un", "una", "uno", "unos", "y", "ya", "yo", "él", "está",
    "están",
];

/// Returns the stopword list for a language code
///
/// Languages without a list get an empty one; only the length filter applies.
pub fn stopwords(language: &str) -> &'static [&'static str] {
    match language {
        "en" | "english" => STOPWORDS_EN,
        "pt-br" | "pt" | "portuguese" => STOPWORDS_PT,
        "es" | "spanish" => STOPWORDS_ES,
        _ => &[],
    }
}

/// Splits text into lowercase word tokens
///
/// Non-letter characters are removed (so `don't` becomes `dont`), then
/// stopwords and tokens shorter than three letters are dropped.
pub fn tokenize(text: &str, language: &str) -> Vec<String> {
    let stop = stopwords(language);

    let cleaned: String = text
        .chars()
        .filter(|c| c.is_alphabetic() || c.is_whitespace())
        .collect();

    cleaned
        .split_whitespace()
        .map(str::to_lowercase)
        .filter(|word| word.chars().count() >= MIN_TOKEN_LENGTH)
        .filter(|word| !stop.contains(&word.as_str()))
        .collect()
}

/// Counts token occurrences
pub fn word_frequency<S: AsRef<str>>(tokens: &[S]) -> BTreeMap<String, usize> {
    let mut frequency = BTreeMap::new();
    for token in tokens {
        *frequency.entry(token.as_ref().to_string()).or_insert(0) += 1;
    }
    frequency
}

/// The `n` most frequent words, ties broken alphabetically
pub fn top_words(frequency: &BTreeMap<String, usize>, n: usize) -> Vec<(String, usize)> {
    let mut words: Vec<(String, usize)> = frequency
        .iter()
        .map(|(word, count)| (word.clone(), *count))
        .collect();
    words.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    words.truncate(n);
    words
}

/// Writes `word,freq` rows, most frequent first
pub fn write_keyword_csv(path: &Path, frequency: &BTreeMap<String, usize>) -> OutputResult<()> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(["word", "freq"])?;
    for (word, count) in top_words(frequency, frequency.len()) {
        writer.write_record([word.as_str(), count.to_string().as_str()])?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
    super::write_atomic(path, &bytes)
}

/// Writes the frequency map as a JSON object
pub fn write_keyword_json(path: &Path, frequency: &BTreeMap<String, usize>) -> OutputResult<()> {
    super::write_atomic(path, &serde_json::to_vec_pretty(frequency)?)
}

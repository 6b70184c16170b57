//! # Linguistic Analysis Module
//!
//! ## Purpose
//! Russian-language analysis of legal text: tokenization, lemmatization,
//! citation/entity extraction, reference-phrase detection and key-term
//! ranking, with explicit size-safety thresholds for very large documents.
//!
//! ## Input/Output Specification
//! - **Input**: Raw document text (potentially megabytes of it)
//! - **Output**: Token and lemma streams, [`ExtractedEntities`],
//!   [`ReferencePhrase`] lists, ranked [`KeyTerm`]s
//! - **Degradation**: Oversized inputs fall back to the lightweight regex
//!   path or are sampled; single-token analysis misses keep the raw token
//!
//! ## Key Features
//! - Capability backends chosen at construction, never probed at runtime
//! - Deterministic rule-based morphology for normal forms
//! - Law/article/date citation patterns for Russian legal sources
//! - Reference connectives tagged with their semantic relation
//! - Frequency ranking that preserves first-seen order on ties

use crate::config::AnalysisConfig;
use crate::errors::{PipelineError, Result};
use crate::utils::TextUtils;
use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use unicode_normalization::UnicodeNormalization;

/// Russian stop words excluded from key-term ranking
const STOP_WORDS: &[&str] = &[
    "и", "в", "на", "с", "по", "для", "от", "к", "из", "о", "а", "как", "что", "это",
];

/// Minimum stem length the morphology keeps after stripping a suffix
const MIN_STEM_CHARS: usize = 3;

/// Named entities extracted from a document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractedEntities {
    /// Law citations ("Федеральный закон ... № 14-ФЗ", "ГК РФ")
    pub laws: Vec<String>,
    /// Article and point citations ("статье 10", "ст. 5", "пункте 3")
    pub articles: Vec<String>,
    /// Dates in D.M.YYYY form, deduplicated
    pub dates: Vec<String>,
    /// Candidate domain terms (title-case noun-like tokens)
    pub terms: Vec<String>,
}

/// One detected reference phrase
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferencePhrase {
    /// Object span of the reference, connective excluded
    pub text: String,
    /// Semantic tag of the connective
    pub kind: String,
    /// Character offset of the connective in the source text
    pub position: usize,
}

/// Ranked key term
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyTerm {
    pub term: String,
    pub frequency: usize,
}

/// Per-token morphological normalization capability.
pub trait Morphology: Send + Sync {
    /// Best normal form for one token. `None` means the token resists
    /// analysis and the caller keeps the raw form.
    fn normal_form(&self, token: &str) -> Option<String>;

    /// Crude noun check used by candidate-term extraction
    fn is_noun_like(&self, token: &str) -> bool;
}

/// Heavier text backend: tokenization, bulk lemmatization and candidate-term
/// extraction. Applied only to inputs under the safe-size threshold.
pub trait LanguagePipeline: Send + Sync {
    fn tokenize(&self, text: &str) -> Vec<String>;
    fn lemmatize(&self, text: &str) -> Vec<String>;
    /// Title-case noun-like tokens from a sample. An `Err` degrades to an
    /// empty term list at the call site.
    fn candidate_terms(&self, text: &str) -> Result<Vec<String>>;
}

/// Deterministic suffix-stripping morphology for Russian inflection.
/// Normal forms are lemma-adjacent stems: different inflections of one word
/// collapse to the same stem, which is the property term linking relies on.
pub struct SuffixMorphology {
    suffixes: Vec<&'static str>,
}

impl SuffixMorphology {
    pub fn new() -> Self {
        let mut suffixes = vec![
            // Noun case endings
            "иями", "ьями", "иях", "ьях", "ьям", "ьей", "ями", "ами", "ях", "ах", "ией",
            "ов", "ев", "ей", "ой", "ою", "ёй", "ом", "ем", "ём", "ам", "ям", "ия", "ие",
            "ию", "ии", "ья", "ье", "ью", "ьи", "а", "я", "о", "е", "у", "ю", "ы", "и", "ь",
            // Adjective endings
            "ыми", "ими", "ого", "его", "ому", "ему", "ая", "яя", "ое", "ее", "ую", "юю",
            "ые", "ый", "ий", "ых", "их", "ым", "им",
            // Verb endings
            "ировать", "овать", "евать", "ться", "тся", "ешь", "ишь", "ете", "ите", "ает",
            "яет", "ают", "яют", "ует", "уют", "ить", "ать", "ять", "еть", "ала", "яла",
            "ела", "али", "яли", "ели", "ал", "ял", "ел",
        ];
        // Longest-first so "законами" strips "ами" before "и" gets a chance
        suffixes.sort_by_key(|s| std::cmp::Reverse(s.chars().count()));
        suffixes.dedup();
        Self { suffixes }
    }
}

impl Default for SuffixMorphology {
    fn default() -> Self {
        Self::new()
    }
}

impl Morphology for SuffixMorphology {
    fn normal_form(&self, token: &str) -> Option<String> {
        let lower = token.to_lowercase();
        if !lower.chars().all(|c| c.is_alphabetic() && !c.is_ascii()) {
            // Latin tokens, digits and mixed forms resist this analysis
            return None;
        }
        let total = lower.chars().count();
        for suffix in &self.suffixes {
            let suffix_len = suffix.chars().count();
            if !lower.ends_with(suffix) {
                continue;
            }
            // A suffix that would leave too short a stem is skipped, letting a
            // shorter suffix still apply
            if total >= suffix_len + MIN_STEM_CHARS {
                let stem_chars = total - suffix_len;
                let cut: usize = lower
                    .char_indices()
                    .nth(stem_chars)
                    .map(|(i, _)| i)
                    .unwrap_or(lower.len());
                return Some(lower[..cut].to_string());
            }
        }
        Some(lower)
    }

    fn is_noun_like(&self, token: &str) -> bool {
        let lower = token.to_lowercase();
        if lower.chars().count() < 4 || !lower.chars().all(|c| c.is_alphabetic() && !c.is_ascii())
        {
            return false;
        }
        const NOT_NOUN_ENDINGS: &[&str] = &[
            "ый", "ий", "ой", "ая", "яя", "ое", "ее", "ые", "ть", "ться",
        ];
        !NOT_NOUN_ENDINGS.iter().any(|s| lower.ends_with(s))
    }
}

/// Default heavy backend: NFC normalization, case-preserving word tokens and
/// morphology-backed lemmas.
pub struct MorphPipeline {
    morph: Arc<dyn Morphology>,
    word: Regex,
}

impl MorphPipeline {
    pub fn new(morph: Arc<dyn Morphology>) -> Result<Self> {
        Ok(Self {
            morph,
            word: compile(r"\b\w+\b")?,
        })
    }
}

impl LanguagePipeline for MorphPipeline {
    fn tokenize(&self, text: &str) -> Vec<String> {
        let normalized: String = text.nfc().collect();
        self.word
            .find_iter(&normalized)
            .map(|m| m.as_str().to_string())
            .collect()
    }

    fn lemmatize(&self, text: &str) -> Vec<String> {
        self.tokenize(text)
            .into_iter()
            .map(|t| {
                self.morph
                    .normal_form(&t)
                    .unwrap_or_else(|| t.to_lowercase())
            })
            .collect()
    }

    fn candidate_terms(&self, text: &str) -> Result<Vec<String>> {
        let mut seen = HashSet::new();
        let mut terms = Vec::new();
        for token in self.tokenize(text) {
            if !is_title_case(&token) || !self.morph.is_noun_like(&token) {
                continue;
            }
            if seen.insert(token.clone()) {
                terms.push(token);
            }
        }
        Ok(terms)
    }
}

/// Linguistic analyzer with construction-time capability selection
pub struct TextAnalyzer {
    config: AnalysisConfig,
    morph: Option<Arc<dyn Morphology>>,
    pipeline: Option<Box<dyn LanguagePipeline>>,
    word_token: Regex,
    law_patterns: Vec<Regex>,
    article_refs: Vec<Regex>,
    date_pattern: Regex,
    reference_patterns: Vec<(Regex, &'static str)>,
    stop_words: HashSet<String>,
}

impl TextAnalyzer {
    /// Create an analyzer with the default backends enabled by `config`
    pub fn new(config: AnalysisConfig) -> Result<Self> {
        let morph: Option<Arc<dyn Morphology>> = if config.enable_morphology {
            Some(Arc::new(SuffixMorphology::new()))
        } else {
            None
        };
        let pipeline: Option<Box<dyn LanguagePipeline>> = match &morph {
            Some(m) => Some(Box::new(MorphPipeline::new(m.clone())?)),
            None => None,
        };
        Self::with_backends(config, morph, pipeline)
    }

    /// Create an analyzer with explicitly chosen backends. `None` selects the
    /// lightweight regex path for the corresponding capability.
    pub fn with_backends(
        config: AnalysisConfig,
        morph: Option<Arc<dyn Morphology>>,
        pipeline: Option<Box<dyn LanguagePipeline>>,
    ) -> Result<Self> {
        Ok(Self {
            config,
            morph,
            pipeline,
            word_token: compile(r"\b\w+\b")?,
            law_patterns: vec![
                compile(
                    r"(?i)Федеральн\w+\s+закон\w*\s+(?:от\s+\d{1,2}\.\d{1,2}\.\d{4}\s+)?№\s*\d+(?:-ФЗ)?",
                )?,
                compile(r"№\s*\d+-ФЗ")?,
                compile(r"\b(?:ГК|УК|ТК|НК)\s+РФ\b")?,
                compile(r"(?i)Конституци\w*\s+(?:Российской\s+Федерации|РФ)")?,
            ],
            article_refs: vec![
                compile(r"(?i)\bстать[яеиюёй]+\s+\d+(?:\.\d+)?")?,
                compile(r"(?i)\bст\.\s*\d+(?:\.\d+)?")?,
                compile(r"(?i)\bпункт\w*\s+\d+")?,
            ],
            date_pattern: compile(r"\b\d{1,2}\.\d{1,2}\.\d{4}\b")?,
            reference_patterns: vec![
                (compile(r"(?i)в\s+соответствии\s+со?\s+([^.,;]+)")?, "соответствие"),
                (compile(r"(?i)согласно\s+([^.,;]+)")?, "согласно"),
                (compile(r"(?i)в\s+силу\s+([^.,;]+)")?, "сила"),
                (compile(r"(?i)на\s+основании\s+([^.,;]+)")?, "основание"),
            ],
            stop_words: STOP_WORDS.iter().map(|s| s.to_string()).collect(),
        })
    }

    /// Tokenize text, falling back to the lowercase regex stream when the
    /// heavy backend is absent or the input exceeds the safe threshold
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        if let Some(pipeline) = &self.pipeline {
            if text.chars().count() <= self.config.pipeline_safe_max_chars {
                return pipeline.tokenize(text);
            }
            tracing::debug!(
                "Input over safe threshold ({} chars), using regex tokenization",
                self.config.pipeline_safe_max_chars
            );
        }
        self.regex_tokens(text)
    }

    /// Lemmatize text. Per-token morphology when present; else the heavy
    /// backend on a truncated sample; else raw tokens.
    pub fn lemmatize(&self, text: &str) -> Vec<String> {
        if let Some(morph) = &self.morph {
            return self
                .tokenize(text)
                .into_iter()
                .map(|t| morph.normal_form(&t).unwrap_or(t))
                .collect();
        }
        if let Some(pipeline) = &self.pipeline {
            let sample = TextUtils::truncate_chars(text, self.config.pipeline_safe_max_chars);
            return pipeline.lemmatize(sample);
        }
        self.tokenize(text)
    }

    /// Extract law/article/date citations and candidate terms
    pub fn extract_entities(&self, text: &str) -> ExtractedEntities {
        let mut entities = ExtractedEntities::default();

        for pattern in &self.law_patterns {
            for m in pattern.find_iter(text) {
                entities.laws.push(m.as_str().trim().to_string());
            }
        }

        for pattern in &self.article_refs {
            for m in pattern.find_iter(text) {
                entities.articles.push(m.as_str().trim().to_string());
            }
        }

        let mut seen_dates = HashSet::new();
        for m in self.date_pattern.find_iter(text) {
            if seen_dates.insert(m.as_str()) {
                entities.dates.push(m.as_str().to_string());
            }
        }

        if self.config.enable_term_extraction {
            if let Some(pipeline) = &self.pipeline {
                let sample = TextUtils::truncate_chars(text, self.config.pipeline_safe_max_chars);
                match pipeline.candidate_terms(sample) {
                    Ok(terms) => entities.terms = terms,
                    Err(e) => {
                        tracing::warn!("Candidate-term extraction degraded to empty: {}", e);
                    }
                }
            }
        }

        tracing::debug!(
            "Entities: {} laws, {} articles, {} dates, {} terms",
            entities.laws.len(),
            entities.articles.len(),
            entities.dates.len(),
            entities.terms.len()
        );
        entities
    }

    /// Detect reference phrases introduced by the legal connectives. The
    /// recorded text is the object span after the connective; the offset
    /// counts characters, not bytes.
    pub fn extract_references(&self, text: &str) -> Vec<ReferencePhrase> {
        let mut references = Vec::new();
        for (pattern, kind) in &self.reference_patterns {
            for captures in pattern.captures_iter(text) {
                let (Some(whole), Some(object)) = (captures.get(0), captures.get(1)) else {
                    continue;
                };
                references.push(ReferencePhrase {
                    text: object.as_str().trim().to_string(),
                    kind: kind.to_string(),
                    position: text[..whole.start()].chars().count(),
                });
            }
        }
        references
    }

    /// Rank key terms by frequency over a bulk-capped sample. Stop words and
    /// short tokens are dropped before and after normalization; ties keep
    /// first-encountered order because counting preserves insertion order.
    pub fn key_terms(&self, text: &str, top_n: usize) -> Vec<KeyTerm> {
        let sample = TextUtils::truncate_chars(text, self.config.bulk_max_chars);
        let mut counts: IndexMap<String, usize> = IndexMap::new();

        for token in self.regex_tokens(sample) {
            if !self.keeps_term(&token) {
                continue;
            }
            let lemma = match &self.morph {
                Some(m) => m.normal_form(&token).unwrap_or(token),
                None => token,
            };
            if !self.keeps_term(&lemma) {
                continue;
            }
            *counts.entry(lemma).or_insert(0) += 1;
        }

        let mut entries: Vec<(String, usize)> = counts.into_iter().collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1));
        entries
            .into_iter()
            .take(top_n)
            .map(|(term, frequency)| KeyTerm { term, frequency })
            .collect()
    }

    fn keeps_term(&self, token: &str) -> bool {
        token.chars().count() > 3 && !self.stop_words.contains(token)
    }

    fn regex_tokens(&self, text: &str) -> Vec<String> {
        self.word_token
            .find_iter(text)
            .map(|m| m.as_str().to_lowercase())
            .collect()
    }
}

fn is_title_case(token: &str) -> bool {
    let mut chars = token.chars();
    match chars.next() {
        Some(first) if first.is_uppercase() => chars.all(|c| c.is_lowercase()),
        _ => false,
    }
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| PipelineError::Internal {
        message: format!("Invalid analysis pattern: {}", e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn cfg() -> AnalysisConfig {
        Config::default().analysis
    }

    fn analyzer() -> TextAnalyzer {
        TextAnalyzer::new(cfg()).unwrap()
    }

    struct FailingPipeline;

    impl LanguagePipeline for FailingPipeline {
        fn tokenize(&self, _text: &str) -> Vec<String> {
            Vec::new()
        }
        fn lemmatize(&self, _text: &str) -> Vec<String> {
            Vec::new()
        }
        fn candidate_terms(&self, _text: &str) -> Result<Vec<String>> {
            Err(PipelineError::Internal {
                message: "backend down".to_string(),
            })
        }
    }

    #[test]
    fn test_regex_tokenization_lowercases() {
        let analyzer = TextAnalyzer::with_backends(cfg(), None, None).unwrap();
        let tokens = analyzer.tokenize("Статья 5 Закона");
        assert_eq!(tokens, vec!["статья", "5", "закона"]);
    }

    #[test]
    fn test_pipeline_tokenization_preserves_case() {
        let tokens = analyzer().tokenize("Федеральный Закон");
        assert_eq!(tokens, vec!["Федеральный", "Закон"]);
    }

    #[test]
    fn test_oversized_input_falls_back() {
        let mut config = cfg();
        config.pipeline_safe_max_chars = 10;
        config.bulk_max_chars = 100;
        let analyzer = TextAnalyzer::new(config).unwrap();
        let tokens = analyzer.tokenize("Очень Длинный Текст Статьи Закона");
        assert!(tokens.iter().all(|t| t.chars().all(|c| !c.is_uppercase())));
    }

    #[test]
    fn test_lemmas_collapse_inflections() {
        let analyzer = analyzer();
        let lemmas = analyzer.lemmatize("закона законы законами");
        assert_eq!(lemmas, vec!["закон", "закон", "закон"]);
    }

    #[test]
    fn test_morphology_determinism() {
        let morph = SuffixMorphology::new();
        assert_eq!(morph.normal_form("договоров"), Some("договор".to_string()));
        assert_eq!(
            morph.normal_form("Договоров"),
            morph.normal_form("договоров")
        );
        assert_eq!(morph.normal_form("law2020"), None);
        assert_eq!(morph.normal_form("statute"), None);
    }

    #[test]
    fn test_noun_heuristic() {
        let morph = SuffixMorphology::new();
        assert!(morph.is_noun_like("закон"));
        assert!(!morph.is_noun_like("федеральный"));
        assert!(!morph.is_noun_like("ГК"));
    }

    #[test]
    fn test_entity_extraction() {
        let text = "Федеральный закон от 08.02.1998 № 14-ФЗ применяется вместе с ГК РФ. \
                    Согласно статье 10, срок начинается 08.02.1998.";
        let entities = analyzer().extract_entities(text);

        assert!(entities.laws.iter().any(|l| l.contains("14-ФЗ")));
        assert!(entities.laws.iter().any(|l| l == "ГК РФ"));
        assert!(entities.articles.iter().any(|a| a.contains("статье 10")));
        assert_eq!(
            entities.dates,
            vec!["08.02.1998".to_string()],
            "dates must be deduplicated"
        );
    }

    #[test]
    fn test_candidate_terms_present() {
        let entities = analyzer().extract_entities("Настоящий Договор заключает Поставщик.");
        assert!(entities.terms.contains(&"Договор".to_string()));
        assert!(entities.terms.contains(&"Поставщик".to_string()));
    }

    #[test]
    fn test_candidate_terms_degrade_on_backend_failure() {
        let analyzer =
            TextAnalyzer::with_backends(cfg(), None, Some(Box::new(FailingPipeline))).unwrap();
        let entities = analyzer.extract_entities("Настоящий Договор действует.");
        assert!(entities.terms.is_empty());
    }

    #[test]
    fn test_reference_phrases() {
        let text = "В соответствии со статьей 10 настоящего закона, согласно пункту 2 правил.";
        let references = analyzer().extract_references(text);

        let kinds: Vec<&str> = references.iter().map(|r| r.kind.as_str()).collect();
        assert!(kinds.contains(&"соответствие"));
        assert!(kinds.contains(&"согласно"));

        let first = references
            .iter()
            .find(|r| r.kind == "соответствие")
            .unwrap();
        // The connective lives in `kind`; the text is the object span only.
        assert_eq!(first.text, "статьей 10 настоящего закона");
        assert_eq!(first.position, 0);
    }

    #[test]
    fn test_reference_position_counts_characters() {
        let text = "Право. В соответствии со статьёй 5 закона.";
        let references = analyzer().extract_references(text);
        assert_eq!(references.len(), 1);
        // "Право. " is 7 characters but 12 bytes; the offset is in characters.
        assert_eq!(references[0].position, 7);
        assert_eq!(references[0].text, "статьёй 5 закона");
    }

    #[test]
    fn test_empty_input_yields_empty_sequences() {
        let analyzer = analyzer();
        assert!(analyzer.tokenize("").is_empty());
        assert!(analyzer.lemmatize("").is_empty());
        assert!(analyzer.key_terms("", 10).is_empty());
    }

    #[test]
    fn test_tokenization_idempotent_on_own_output() {
        let analyzer = TextAnalyzer::with_backends(cfg(), None, None).unwrap();
        let tokens = analyzer.tokenize("статья 5 закона о тишине 2020");
        let retokenized = analyzer.tokenize(&tokens.join(" "));
        assert_eq!(tokens, retokenized);
    }

    #[test]
    fn test_key_terms_ranking_and_filtering() {
        let text = "Закон закона законы договор договора и на по для это";
        let terms = analyzer().key_terms(text, 10);

        assert_eq!(terms[0].term, "закон");
        assert_eq!(terms[0].frequency, 3);
        assert_eq!(terms[1].term, "договор");
        assert_eq!(terms[1].frequency, 2);
        assert!(terms.iter().all(|t| t.term.chars().count() > 3));
        assert!(terms
            .windows(2)
            .all(|pair| pair[0].frequency >= pair[1].frequency));
    }

    #[test]
    fn test_key_terms_ties_keep_first_seen_order() {
        let text = "договор контракт договор контракт";
        let terms = analyzer().key_terms(text, 10);
        assert_eq!(terms.len(), 2);
        assert_eq!(terms[0].term, "договор");
        assert_eq!(terms[1].term, "контракт");
    }

    #[test]
    fn test_key_terms_respects_top_n() {
        let text = "закон договор порядок гражданин организация";
        let terms = analyzer().key_terms(text, 2);
        assert_eq!(terms.len(), 2);
    }
}

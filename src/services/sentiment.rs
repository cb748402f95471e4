/// Keyword-based review scoring
///
/// Sentiment, aspect and emotion scores are derived from fixed keyword lists.
/// Which scorers exist is decided once from the feature flags when the
/// [`ReviewAnalyzer`] is built; a disabled scorer is simply absent.
use std::collections::BTreeMap;

use crate::{
    config::FeatureFlags,
    models::{
        Aspect, Emotion, ReviewAnalysis, SentimentLabel, SentimentProbabilities, SentimentResult,
    },
};

const POSITIVE_WORDS: [&str; 10] = [
    "좋", "훌륭", "최고", "멋", "재미", "감동", "완벽", "추천", "대박", "굿",
];
const NEGATIVE_WORDS: [&str; 8] = ["나쁘", "별로", "실망", "지루", "최악", "엉망", "아쉽", "후회"];

/// Scores above this are positive, below its negation negative
const LABEL_THRESHOLD: f64 = 0.2;

/// Emotion keyword hits that saturate the score
const EMOTION_SATURATION: f64 = 3.0;

fn aspect_keywords(aspect: Aspect) -> &'static [&'static str] {
    match aspect {
        Aspect::Acting => &["연기", "배우", "연기력", "acting", "performance"],
        Aspect::Plot => &["스토리", "줄거리", "전개", "plot", "story"],
        Aspect::Cinematography => &["영상", "촬영", "화면", "cinematography"],
        Aspect::Soundtrack => &["음악", "ost", "사운드트랙", "soundtrack"],
        Aspect::Direction => &["연출", "감독", "direction", "directing"],
        Aspect::Screenplay => &["각본", "대사", "screenplay", "script"],
    }
}

fn emotion_keywords(emotion: Emotion) -> &'static [&'static str] {
    match emotion {
        Emotion::Joy => &["좋", "행복", "즐거", "재미", "웃", "기쁨"],
        Emotion::Sadness => &["슬프", "우울", "눈물", "아쉽", "안타"],
        Emotion::Anger => &["화", "짜증", "분노", "열받", "억울"],
        Emotion::Surprise => &["놀", "충격", "반전", "예상", "의외"],
        Emotion::Fear => &["무섭", "공포", "두렵", "긴장"],
        Emotion::Disgust => &["역겹", "불쾌", "싫"],
    }
}

/// Polarity scorer counting positive and negative keywords
#[derive(Debug, Clone, Copy, Default)]
pub struct SentimentAnalyzer;

impl SentimentAnalyzer {
    pub fn analyze(&self, text: &str) -> SentimentResult {
        if text.trim().is_empty() {
            return SentimentResult {
                sentiment_score: 0.0,
                sentiment_label: SentimentLabel::Neutral,
                confidence: 0.0,
                probabilities: SentimentProbabilities {
                    negative: 0.33,
                    neutral: 0.34,
                    positive: 0.33,
                },
                uncertainty: 1.0,
            };
        }

        let text = text.to_lowercase();
        let positive = count_present(&text, &POSITIVE_WORDS);
        let negative = count_present(&text, &NEGATIVE_WORDS);
        let total = positive + negative;

        let (score, label, probabilities) = if total == 0 {
            (
                0.0,
                SentimentLabel::Neutral,
                SentimentProbabilities {
                    negative: 0.33,
                    neutral: 0.34,
                    positive: 0.33,
                },
            )
        } else {
            let score = ((positive as f64 - negative as f64) / total as f64).clamp(-1.0, 1.0);
            if score > LABEL_THRESHOLD {
                (
                    score,
                    SentimentLabel::Positive,
                    SentimentProbabilities {
                        negative: 0.15,
                        neutral: 0.15,
                        positive: 0.7,
                    },
                )
            } else if score < -LABEL_THRESHOLD {
                (
                    score,
                    SentimentLabel::Negative,
                    SentimentProbabilities {
                        negative: 0.7,
                        neutral: 0.15,
                        positive: 0.15,
                    },
                )
            } else {
                (
                    score,
                    SentimentLabel::Neutral,
                    SentimentProbabilities {
                        negative: 0.3,
                        neutral: 0.4,
                        positive: 0.3,
                    },
                )
            }
        };

        SentimentResult {
            sentiment_score: score,
            sentiment_label: label,
            confidence: probabilities.max(),
            probabilities,
            uncertainty: 0.1,
        }
    }
}

/// Per-aspect sentiment over the sentences that mention each aspect
#[derive(Debug, Clone, Copy, Default)]
pub struct AspectAnalyzer {
    base: SentimentAnalyzer,
}

impl AspectAnalyzer {
    pub fn analyze(&self, text: &str) -> BTreeMap<Aspect, f64> {
        Aspect::ALL
            .iter()
            .map(|&aspect| {
                let sentences = matching_sentences(text, aspect_keywords(aspect));
                let score = if sentences.is_empty() {
                    0.0
                } else {
                    self.base.analyze(&sentences.join(" ")).sentiment_score
                };
                (aspect, score)
            })
            .collect()
    }
}

/// Emotion intensities from keyword hits, saturating at three hits
#[derive(Debug, Clone, Copy, Default)]
pub struct EmotionClassifier;

impl EmotionClassifier {
    pub fn analyze(&self, text: &str) -> BTreeMap<Emotion, f64> {
        Emotion::ALL
            .iter()
            .map(|&emotion| {
                let hits = count_present(text, emotion_keywords(emotion)) as f64;
                (emotion, (hits / EMOTION_SATURATION).min(1.0))
            })
            .collect()
    }
}

/// The review scorers enabled for this process
#[derive(Debug, Clone, Default)]
pub struct ReviewAnalyzer {
    sentiment: SentimentAnalyzer,
    aspects: Option<AspectAnalyzer>,
    emotions: Option<EmotionClassifier>,
}

impl ReviewAnalyzer {
    pub fn from_flags(flags: &FeatureFlags) -> Self {
        Self {
            sentiment: SentimentAnalyzer,
            aspects: flags.enable_absa.then(AspectAnalyzer::default),
            emotions: flags
                .enable_emotion_classification
                .then_some(EmotionClassifier),
        }
    }

    pub fn aspects_enabled(&self) -> bool {
        self.aspects.is_some()
    }

    pub fn emotions_enabled(&self) -> bool {
        self.emotions.is_some()
    }

    pub fn analyze(&self, text: &str) -> ReviewAnalysis {
        ReviewAnalysis {
            sentiment: self.sentiment.analyze(text),
            aspects: self.aspects.as_ref().map(|analyzer| analyzer.analyze(text)),
            emotions: self.emotions.as_ref().map(|classifier| classifier.analyze(text)),
        }
    }
}

fn count_present(text: &str, keywords: &[&str]) -> usize {
    keywords.iter().filter(|word| text.contains(*word)).count()
}

fn matching_sentences<'a>(text: &'a str, keywords: &[&str]) -> Vec<&'a str> {
    text.split('.')
        .filter(|sentence| {
            let lowered = sentence.to_lowercase();
            keywords.iter().any(|keyword| lowered.contains(keyword))
        })
        .map(str::trim)
        .collect()
}

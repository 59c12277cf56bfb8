//! Domain types exchanged with the service

use crate::{wire_enum, wire_object};

wire_enum! {
    /// Analysis requested from `checkContent`
    pub enum Check {
        Spam => "spam",
        Quality => "quality",
        Profanity => "profanity",
        Language => "language",
        Sentiment => "sentiment",
    }
}

wire_enum! {
    /// How aggressively content is classified
    pub enum Strictness {
        Strict => "strict",
        Normal => "normal",
        Relaxed => "relaxed",
    }
}

wire_enum! {
    /// Moderator verdict reported through `sendFeedback`
    pub enum Feedback {
        Ham => "ham",
        Spam => "spam",
        Profanity => "profanity",
        LowQuality => "low-quality",
        Unwanted => "unwanted",
    }
}

wire_enum! {
    pub enum SpamClassification {
        Ham => "ham",
        Spam => "spam",
        Unsure => "unsure",
    }
}

wire_enum! {
    pub enum BlacklistReason {
        Spam => "spam",
        Profanity => "profanity",
        LowQuality => "low-quality",
        Unwanted => "unwanted",
    }
}

wire_enum! {
    /// Part of the submitted content a list entry applies to
    pub enum BlacklistContext {
        AllFields => "allFields",
        Everything => "everything",
        Links => "links",
        Author => "author",
        AuthorName => "authorName",
        AuthorMail => "authorMail",
        AuthorId => "authorId",
        AuthorIp => "authorIp",
        PostTitle => "postTitle",
    }
}

wire_enum! {
    pub enum MatchPrecision {
        Exact => "exact",
        Contains => "contains",
    }
}

wire_enum! {
    pub enum SiteType {
        Personal => "personal",
        Company => "company",
        NonProfit => "non-profit",
        Customer => "customer",
    }
}

wire_enum! {
    /// Counter requested from `getStatistics`
    pub enum StatisticsType {
        TotalDays => "total_days",
        TotalAccepted => "total_accepted",
        TotalRejected => "total_rejected",
        TodayAccepted => "today_accepted",
        TodayRejected => "today_rejected",
        YesterdayAccepted => "yesterday_accepted",
        YesterdayRejected => "yesterday_rejected",
    }
}

wire_enum! {
    /// Standing of an author with the service
    pub enum Reputation {
        Good => "good",
        Average => "average",
        Poor => "poor",
        Unknown => "unknown",
    }
}

wire_object! {
    /// Detected language with its confidence
    pub struct Language {
        pub language_code: String => ["language", "languageCode", "language_code"],
        pub confidence: f64 => ["confidence", "languageScore", "language_score"],
    }
}

wire_object! {
    /// Result of `checkContent`
    pub struct CheckContentResponse {
        /// Session to quote in follow-up calls (captcha, feedback)
        pub session_id: String => ["session_id", "id"],
        /// Legacy numeric verdict: 1 ham, 2 spam, 3 unsure
        pub spam: i32 => ["spam"],
        pub spam_classification: Option<SpamClassification> => ["spamClassification", "spam_classification"],
        pub spam_score: f64 => ["spamScore", "spam_score"],
        pub quality: f64 => ["quality", "qualityScore", "quality_score"],
        pub profanity: f64 => ["profanity", "profanityScore", "profanity_score"],
        pub sentiment: f64 => ["sentiment", "sentimentScore", "sentiment_score"],
        pub reason: String => ["reason"],
        pub languages: Vec<Language> => ["languages", "language"],
    }
}

impl CheckContentResponse {
    /// Verdict, taken from the classification string when present and from
    /// the numeric code otherwise.
    pub fn classification(&self) -> Option<SpamClassification> {
        self.spam_classification.or(match self.spam {
            1 => Some(SpamClassification::Ham),
            2 => Some(SpamClassification::Spam),
            3 => Some(SpamClassification::Unsure),
            _ => None,
        })
    }

    pub fn is_spam(&self) -> bool {
        self.classification() == Some(SpamClassification::Spam)
    }

    pub fn is_ham(&self) -> bool {
        self.classification() == Some(SpamClassification::Ham)
    }

    /// Result reported when the service cannot be reached and the failure
    /// policy picks a verdict instead of an error.
    pub(crate) fn synthetic(classification: SpamClassification) -> Self {
        let (spam, score) = match classification {
            SpamClassification::Ham => (1, 0.0),
            SpamClassification::Spam => (2, 1.0),
            SpamClassification::Unsure => (3, 0.5),
        };

        Self {
            spam,
            spam_classification: Some(classification),
            spam_score: score,
            reason: "service unreachable".to_string(),
            ..Self::default()
        }
    }
}

wire_object! {
    /// A CAPTCHA to show the author
    pub struct CaptchaResponse {
        pub session_id: String => ["session_id", "id"],
        pub url: String => ["url"],
    }
}

wire_object! {
    pub struct BlacklistEntry {
        pub id: String => ["id"],
        pub text: String => ["text", "value"],
        pub context: Option<BlacklistContext> => ["context"],
        pub match_precision: Option<MatchPrecision> => ["match"],
        pub reason: Option<BlacklistReason> => ["reason"],
        pub created: String => ["created"],
        pub status: i32 => ["status"],
        pub note: String => ["note"],
    }
}

wire_object! {
    pub struct WhitelistEntry {
        pub id: String => ["id"],
        pub text: String => ["text", "value"],
        pub context: Option<BlacklistContext> => ["context"],
        pub created: String => ["created"],
        pub status: i32 => ["status"],
        pub note: String => ["note"],
    }
}

wire_object! {
    /// Reputation of an author. The score runs from 0 (spammer) to 1
    /// (trusted); an author without history scores 0.5.
    pub struct ReputationResponse {
        pub reputation: Option<Reputation> => ["reputation"],
        pub score: f64 => ["score"],
        pub confidence: f64 => ["confidence"],
    }
}

wire_object! {
    pub struct UrlBlacklistEntry {
        pub url: String => ["url"],
        pub created: String => ["created"],
    }
}

wire_object! {
    /// A site registered under a reseller account
    pub struct SiteInfo {
        pub public_key: String => ["publicKey", "public_key"],
        pub private_key: String => ["privateKey", "private_key"],
        pub url: String => ["url"],
        pub mail: String => ["mail", "email"],
        pub status: i32 => ["status"],
        pub testing: bool => ["testing"],
        pub site_type: String => ["type", "site_type"],
        pub language: String => ["language"],
    }
}

impl SiteInfo {
    /// Parsed site type, if it is a known one
    pub fn kind(&self) -> Option<SiteType> {
        use crate::mapper::WireEnum;
        SiteType::from_wire_str(&self.site_type)
    }
}

/// Submission for `checkContent`.
///
/// Only the spam check runs unless `checks` says otherwise.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentRequest {
    pub session_id: Option<String>,
    pub honeypot: Option<String>,
    pub checks: Vec<Check>,
    pub reputation: Option<String>,
    pub classifiers: Vec<String>,
    pub strictness: Option<Strictness>,
    pub post_title: Option<String>,
    pub post_body: Option<String>,
    pub author_name: Option<String>,
    pub author_url: Option<String>,
    pub author_mail: Option<String>,
    pub author_openid: Option<String>,
    pub author_ip: Option<String>,
    pub author_id: Option<String>,
}

impl Default for ContentRequest {
    fn default() -> Self {
        Self {
            session_id: None,
            honeypot: None,
            checks: vec![Check::Spam],
            reputation: None,
            classifiers: Vec::new(),
            strictness: None,
            post_title: None,
            post_body: None,
            author_name: None,
            author_url: None,
            author_mail: None,
            author_openid: None,
            author_ip: None,
            author_id: None,
        }
    }
}

impl ContentRequest {
    /// A request checking a post body for spam
    pub fn with_body(body: impl Into<String>) -> Self {
        Self {
            post_body: Some(body.into()),
            ..Self::default()
        }
    }
}

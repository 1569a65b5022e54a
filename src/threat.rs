//! Pattern-based injection and anomaly detection over JSON arguments.
//!
//! Detection is driven by a [`RuleSet`]: an ordered, versioned list of
//! [`ThreatRule`]s. Each rule names what it detects ([`ThreatKind`]), whether a
//! match blocks the request ([`Severity`]) and how it matches ([`Matcher`]).
//! The scanner walks every value and every object key, collecting every match
//! so audit records are complete.

use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;

use crate::path;

/// Version label of the built-in rule set.
pub const DEFAULT_RULESET_VERSION: &str = "2024.1";
/// Strings longer than this (in characters) raise a warning.
pub const MAX_STRING_CHARS: usize = 100_000;
/// Arrays with more items than this raise a warning.
pub const MAX_ARRAY_ITEMS: usize = 1_000;
/// Objects with more keys than this raise a warning.
pub const MAX_OBJECT_KEYS: usize = 100;

/// Category of a threat rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreatKind {
    /// Script injection (cross-site scripting, script protocols, DOM access).
    Xss,
    /// SQL injection.
    SqlInjection,
    /// Control or binary characters.
    Binary,
    /// Structurally oversized values.
    Oversize,
}

impl fmt::Display for ThreatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Xss => write!(f, "XSS"),
            Self::SqlInjection => write!(f, "SQL injection"),
            Self::Binary => write!(f, "binary content"),
            Self::Oversize => write!(f, "oversize"),
        }
    }
}

/// Whether a rule match blocks the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// The whole request is rejected.
    Block,
    /// Reported as a warning; processing continues.
    Warn,
}

/// How a rule inspects a value.
#[derive(Debug, Clone)]
pub enum Matcher {
    /// Regex searched in every string leaf and object key.
    Pattern(Regex),
    /// Strings longer than this many characters.
    MaxStringLength(usize),
    /// Arrays with more items than this.
    MaxArrayItems(usize),
    /// Objects with more keys than this.
    MaxObjectKeys(usize),
}

/// One detection rule.
#[derive(Debug, Clone)]
pub struct ThreatRule {
    id: String,
    kind: ThreatKind,
    severity: Severity,
    matcher: Matcher,
    description: String,
}

impl ThreatRule {
    /// Creates a regex rule.
    ///
    /// # Errors
    ///
    /// Returns the regex compile error if `pattern` is invalid.
    pub fn pattern(
        id: impl Into<String>,
        kind: ThreatKind,
        severity: Severity,
        pattern: &str,
        description: impl Into<String>,
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            id: id.into(),
            kind,
            severity,
            matcher: Matcher::Pattern(Regex::new(pattern)?),
            description: description.into(),
        })
    }

    /// Creates a structural rule. Structural rules warn unless overridden.
    pub fn structural(id: impl Into<String>, matcher: Matcher, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: ThreatKind::Oversize,
            severity: Severity::Warn,
            matcher,
            description: description.into(),
        }
    }

    /// Overrides the severity.
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// Overrides the kind.
    pub fn with_kind(mut self, kind: ThreatKind) -> Self {
        self.kind = kind;
        self
    }

    /// Returns the stable rule identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the rule category.
    pub fn kind(&self) -> ThreatKind {
        self.kind
    }

    /// Returns the rule severity.
    pub fn severity(&self) -> Severity {
        self.severity
    }

    /// Returns the matcher.
    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    /// Returns the human-readable description.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns true if `text` triggers this rule.
    ///
    /// Structural matchers other than string length never match text.
    pub fn matches_text(&self, text: &str) -> bool {
        match &self.matcher {
            Matcher::Pattern(re) => re.is_match(text),
            Matcher::MaxStringLength(limit) => {
                // Byte length bounds the char count from above.
                text.len() > *limit && text.chars().count() > *limit
            }
            Matcher::MaxArrayItems(_) | Matcher::MaxObjectKeys(_) => false,
        }
    }

    fn message(&self, at: &str, observed: Option<usize>) -> String {
        let at = path::display(at);
        match (self.severity, self.kind) {
            (Severity::Block, kind) => {
                format!("Potential {kind} detected in field '{at}': {}", self.description)
            }
            (Severity::Warn, _) => match observed {
                Some(n) => format!("Field '{at}' {} ({n})", self.description),
                None => format!("Field '{at}' {}", self.description),
            },
        }
    }
}

/// An ordered, versioned collection of threat rules.
#[derive(Debug, Clone)]
pub struct RuleSet {
    version: String,
    rules: Vec<ThreatRule>,
}

impl RuleSet {
    /// Creates an empty rule set.
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            rules: Vec::new(),
        }
    }

    /// Returns the built-in rules.
    pub fn default_rules() -> Self {
        DEFAULT_RULES.clone()
    }

    /// Appends a rule.
    pub fn with_rule(mut self, rule: ThreatRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Returns the version label.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Returns the rules in evaluation order.
    pub fn rules(&self) -> &[ThreatRule] {
        &self.rules
    }

    /// Looks up a rule by id.
    pub fn rule(&self, id: &str) -> Option<&ThreatRule> {
        self.rules.iter().find(|r| r.id == id)
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::default_rules()
    }
}

static DEFAULT_RULES: Lazy<RuleSet> = Lazy::new(build_default_rules);

type PatternSpec = (&'static str, ThreatKind, Severity, &'static str, &'static str);

const BUILTIN_PATTERNS: [PatternSpec; 20] = {
    use Severity::{Block, Warn};
    use ThreatKind::{Binary, SqlInjection, Xss};
    [
        ("xss.script_protocol", Xss, Block, r"(?i)\bscript:", "script protocol"),
        ("xss.javascript_protocol", Xss, Block, r"(?i)javascript\s*:", "javascript protocol"),
        ("xss.vbscript_protocol", Xss, Block, r"(?i)vbscript\s*:", "vbscript protocol"),
        ("xss.data_uri", Xss, Block, r"(?i)\bdata:[a-z]+/[a-z0-9.+-]+[;,]", "data URI"),
        ("xss.script_tag", Xss, Block, r"(?i)<\s*script", "script tag"),
        ("xss.embed_tag", Xss, Block, r"(?i)<\s*(iframe|object|embed)\b", "embedded content tag"),
        ("xss.eval", Xss, Block, r"(?i)\beval\s*\(", "eval call"),
        ("xss.dom_global", Xss, Block, r"(?i)\b(document|window|location)\.[a-z_$]", "DOM global access"),
        ("xss.html_sink", Xss, Block, r"(?i)\.(inner|outer)html\b", "HTML sink assignment"),
        ("xss.function_constructor", Xss, Block, r"\bnew\s+Function\b|\bFunction\s*\(", "function constructor"),
        ("xss.timer", Xss, Block, r"\bset(Timeout|Interval)\s*\(", "timer with code string"),
        ("sqli.quote_tautology", SqlInjection, Block, r"(?i)'\s*(or|and)\s+'?\w+'?\s*=\s*'?\w+", "quote tautology"),
        ("sqli.numeric_tautology", SqlInjection, Block, r"(?i)\bor\s+1\s*=\s*1\b", "numeric tautology"),
        ("sqli.union_select", SqlInjection, Block, r"(?i)\bunion\s+(all\s+)?select\b", "UNION SELECT"),
        ("sqli.drop", SqlInjection, Block, r"(?i)\b(drop|truncate)\s+(table|database|schema)\b", "DROP/TRUNCATE statement"),
        ("sqli.delete", SqlInjection, Block, r"(?i)\bdelete\s+from\b", "DELETE statement"),
        ("sqli.insert", SqlInjection, Block, r"(?i)\binsert\s+into\b", "INSERT statement"),
        ("sqli.update", SqlInjection, Block, r"(?i)\bupdate\s+\w+\s+set\s+\w+\s*=", "UPDATE statement"),
        ("sqli.comment", SqlInjection, Block, r"(?s)('|;)\s*--|/\*.*?\*/", "inline SQL comment"),
        (
            "binary.control_chars",
            Binary,
            Warn,
            r"[\x00-\x08\x0B\x0C\x0E-\x1F\x7F]",
            "contains control or binary characters",
        ),
    ]
};

fn build_default_rules() -> RuleSet {
    let mut set = RuleSet::new(DEFAULT_RULESET_VERSION);
    for (id, kind, severity, pattern, description) in BUILTIN_PATTERNS {
        // Literals only; `builtin_patterns_compile` compiles each one.
        let rule = ThreatRule::pattern(id, kind, severity, pattern, description)
            .expect("built-in threat patterns are valid");
        set = set.with_rule(rule);
    }

    set.with_rule(ThreatRule::structural(
        "oversize.string",
        Matcher::MaxStringLength(MAX_STRING_CHARS),
        format!("exceeds maximum string length of {MAX_STRING_CHARS} characters"),
    ))
    .with_rule(ThreatRule::structural(
        "oversize.array",
        Matcher::MaxArrayItems(MAX_ARRAY_ITEMS),
        format!("has more than {MAX_ARRAY_ITEMS} items"),
    ))
    .with_rule(ThreatRule::structural(
        "oversize.object",
        Matcher::MaxObjectKeys(MAX_OBJECT_KEYS),
        format!("has more than {MAX_OBJECT_KEYS} keys"),
    ))
}

/// A single rule hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThreatMatch {
    /// Rule identifier.
    pub rule_id: String,
    /// Rule category.
    pub kind: ThreatKind,
    /// Rule severity.
    pub severity: Severity,
    /// Path of the offending value.
    pub path: String,
}

/// Result of scanning one payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanReport {
    /// True if any blocking rule matched.
    pub blocked: bool,
    /// Messages for blocking matches.
    pub errors: Vec<String>,
    /// Messages for non-blocking matches.
    pub warnings: Vec<String>,
    /// Every match, in walk order.
    pub matches: Vec<ThreatMatch>,
}

impl ScanReport {
    fn record(&mut self, rule: &ThreatRule, at: &str, observed: Option<usize>) {
        let message = rule.message(at, observed);
        match rule.severity {
            Severity::Block => {
                self.blocked = true;
                self.errors.push(message);
            }
            Severity::Warn => self.warnings.push(message),
        }
        self.matches.push(ThreatMatch {
            rule_id: rule.id.clone(),
            kind: rule.kind,
            severity: rule.severity,
            path: path::display(at).to_string(),
        });
    }
}

/// Walks JSON arguments and applies a [`RuleSet`].
///
/// # Examples
///
/// ```
/// use ingress_guard::ThreatScanner;
/// use serde_json::json;
///
/// let report = ThreatScanner::new().scan(&json!({
///     "filter": {"name": "x' OR '1'='1"}
/// }));
///
/// assert!(report.blocked);
/// assert!(report.errors[0].contains("filter.name"));
/// ```
#[derive(Debug, Clone)]
pub struct ThreatScanner {
    rules: Arc<RuleSet>,
}

impl ThreatScanner {
    /// Creates a scanner with the built-in rules.
    pub fn new() -> Self {
        Self::with_rules(RuleSet::default_rules())
    }

    /// Creates a scanner with a custom rule set.
    pub fn with_rules(rules: RuleSet) -> Self {
        Self {
            rules: Arc::new(rules),
        }
    }

    /// Returns the active rule set.
    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Scans every value in `input`, never stopping at the first hit.
    pub fn scan(&self, input: &Value) -> ScanReport {
        let mut report = ScanReport::default();
        self.walk(input, "", &mut report);
        report
    }

    fn walk(&self, value: &Value, at: &str, report: &mut ScanReport) {
        match value {
            Value::String(s) => self.check_text(s, at, report),
            Value::Array(items) => {
                self.check_size(items.len(), at, report, |m| match m {
                    Matcher::MaxArrayItems(limit) => Some(*limit),
                    _ => None,
                });
                for (i, item) in items.iter().enumerate() {
                    self.walk(item, &path::child_index(at, i), report);
                }
            }
            Value::Object(map) => {
                self.check_size(map.len(), at, report, |m| match m {
                    Matcher::MaxObjectKeys(limit) => Some(*limit),
                    _ => None,
                });
                for (key, item) in map {
                    let child = path::child_key(at, key);
                    self.check_text(key, &child, report);
                    self.walk(item, &child, report);
                }
            }
            Value::Null | Value::Bool(_) | Value::Number(_) => {}
        }
    }

    fn check_text(&self, text: &str, at: &str, report: &mut ScanReport) {
        for rule in self.rules.rules() {
            if rule.matches_text(text) {
                report.record(rule, at, None);
            }
        }
    }

    fn check_size(
        &self,
        len: usize,
        at: &str,
        report: &mut ScanReport,
        limit_of: impl Fn(&Matcher) -> Option<usize>,
    ) {
        for rule in self.rules.rules() {
            if let Some(limit) = limit_of(&rule.matcher) {
                if len > limit {
                    report.record(rule, at, Some(len));
                }
            }
        }
    }
}

impl Default for ThreatScanner {
    fn default() -> Self {
        Self::new()
    }
}

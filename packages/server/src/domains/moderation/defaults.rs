//! Starter rule set installed by `import_rules --seed`.

use super::models::{MatchStrategy, RuleCategory, RuleInput, Severity};

fn seed(
    word: &str,
    category: RuleCategory,
    severity: Severity,
    match_type: MatchStrategy,
    pattern: Option<&str>,
) -> RuleInput {
    RuleInput {
        word: word.to_string(),
        pattern: pattern.map(str::to_string),
        category,
        severity,
        match_type,
        is_active: true,
    }
}

pub fn default_rules() -> Vec<RuleInput> {
    use MatchStrategy::*;
    use RuleCategory::*;

    vec![
        seed("测试政治词", Political, Severity::SEVERE, Contains, None),
        seed("测试成人词", Adult, Severity::SEVERE, Contains, None),
        seed("暴力", Violence, Severity::REJECT, Contains, None),
        seed("血腥", Violence, Severity::REJECT, Contains, None),
        seed("微信号广告", Advertisement, Severity::REJECT, Regex, Some(r".*微信.*\d{5,}.*")),
        seed("QQ号广告", Advertisement, Severity::REJECT, Regex, Some(r".*QQ.*\d{5,}.*")),
        seed("加群", Advertisement, Severity::REJECT, Contains, None),
        seed("笨蛋", Abuse, Severity::WARN, Contains, None),
        seed("傻瓜", Abuse, Severity::WARN, Contains, None),
        // exact so that "垃圾分类" stays allowed
        seed("垃圾", Abuse, Severity::REJECT, Exact, None),
        seed("刷单", Other, Severity::REJECT, Contains, None),
        seed("代写", Other, Severity::REJECT, Contains, None),
        seed("代考", Other, Severity::SEVERE, Contains, None),
        seed("广告", Advertisement, Severity::REJECT, Fuzzy, None),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_rules_are_valid() {
        for rule in default_rules() {
            rule.validate().unwrap_or_else(|e| panic!("{}: {}", rule.word, e));
        }
    }
}

use crate::config::toml_config::DEFAULT_BANNED_KEYWORDS;
use crate::config::RelayConfig;
use crate::domain::model::Script;

/// Rejects scripts that are patched, too short, or mention a failure keyword.
#[derive(Debug, Clone)]
pub struct ScriptFilter {
    min_length: usize,
    banned_keywords: Vec<String>,
}

impl ScriptFilter {
    pub fn new(min_length: usize, banned_keywords: Vec<String>) -> Self {
        Self {
            min_length,
            banned_keywords: banned_keywords
                .into_iter()
                .map(|k| k.to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
        }
    }

    pub fn from_config(config: &RelayConfig) -> Self {
        Self::new(config.min_script_length(), config.banned_keywords())
    }

    pub fn is_broken(&self, script: &Script) -> bool {
        if script.is_patched {
            return true;
        }

        let code = script.code();
        if code.chars().count() < self.min_length {
            return true;
        }

        let lowered = code.to_lowercase();
        self.banned_keywords
            .iter()
            .any(|keyword| lowered.contains(keyword.as_str()))
    }
}

impl Default for ScriptFilter {
    fn default() -> Self {
        Self::new(
            5,
            DEFAULT_BANNED_KEYWORDS.iter().map(|k| k.to_string()).collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn script(code: &str) -> Script {
        Script {
            id: Some("id".to_string()),
            script: Some(code.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_accepts_ordinary_script() {
        let filter = ScriptFilter::default();
        assert!(!filter.is_broken(&script(
            "loadstring(game:HttpGet('https://example.com/hub.lua'))()"
        )));
    }

    #[test]
    fn test_rejects_patched() {
        let filter = ScriptFilter::default();
        let mut s = script("print('hello world')");
        s.is_patched = true;
        assert!(filter.is_broken(&s));
    }

    #[test]
    fn test_rejects_short_and_missing_code() {
        let filter = ScriptFilter::default();
        assert!(filter.is_broken(&script("abcd")));
        assert!(!filter.is_broken(&script("abcde")));

        let mut missing = script("");
        missing.script = None;
        assert!(filter.is_broken(&missing));
    }

    #[test]
    fn test_banned_keywords_are_case_insensitive_substrings() {
        let filter = ScriptFilter::default();
        assert!(filter.is_broken(&script("warn('Script FAILED to load')")));
        assert!(filter.is_broken(&script("local x = NIL_VALUE")));
        // "nil" inside another word still counts
        assert!(filter.is_broken(&script("local vanilla = true")));
    }

    #[test]
    fn test_custom_keywords() {
        let filter = ScriptFilter::new(1, vec!["Key System".to_string(), String::new()]);
        assert!(filter.is_broken(&script("-- needs key system")));
        assert!(!filter.is_broken(&script("print(1)")));
    }
}
